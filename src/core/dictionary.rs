use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fmt::Display;
use std::path::Path;

const FALLBACK_LANG: &str = "en";

/// Localised message templates: `key -> lang -> template`.
///
/// Templates use `{}` placeholders filled positionally by [`Dictionary::render`].
#[derive(Debug, Clone, Default)]
pub struct Dictionary {
    entries: HashMap<String, HashMap<String, String>>,
}

impl Dictionary {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read dictionary: {:?}", path.as_ref()))?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let entries: HashMap<String, HashMap<String, String>> =
            serde_json::from_str(raw).context("Failed to parse dictionary JSON")?;
        Ok(Self { entries })
    }

    /// Template for `key` in `lang`.
    ///
    /// Falls back to the English template when `lang` has none, and to an
    /// empty string when the key is unknown. Both misses are logged.
    pub fn get(&self, key: &str, lang: &str) -> &str {
        let Some(langs) = self.entries.get(key) else {
            tracing::warn!("Dictionary key {} is missing", key);
            return "";
        };
        if let Some(template) = langs.get(lang) {
            return template.as_str();
        }
        match langs.get(FALLBACK_LANG).map(String::as_str) {
            Some(template) => {
                tracing::warn!(
                    "Dictionary key {} has no {} template, using {}",
                    key,
                    lang,
                    FALLBACK_LANG
                );
                template
            }
            None => {
                tracing::warn!("Dictionary key {} has no {} template", key, lang);
                ""
            }
        }
    }

    pub fn render(&self, key: &str, lang: &str, args: &[&dyn Display]) -> String {
        fill(self.get(key, lang), args)
    }
}

fn fill(template: &str, args: &[&dyn Display]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut args = args.iter();
    let mut rest = template;
    while let Some(pos) = rest.find("{}") {
        out.push_str(&rest[..pos]);
        match args.next() {
            Some(arg) => out.push_str(&arg.to_string()),
            None => out.push_str("{}"),
        }
        rest = &rest[pos + 2..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "t.transaction": {"en": "Tx {} from {} value {}", "cn": "交易 {}"},
        "b.link": {"en": "Explorer"}
    }"#;

    #[test]
    fn render_fills_placeholders_in_order() {
        let dict = Dictionary::from_json(SAMPLE).unwrap();
        let text = dict.render("t.transaction", "en", &[&"abc", &"n1A", &5]);
        assert_eq!(text, "Tx abc from n1A value 5");
    }

    #[test]
    fn missing_lang_falls_back_to_english() {
        let dict = Dictionary::from_json(SAMPLE).unwrap();
        assert_eq!(dict.get("b.link", "cn"), "Explorer");
        assert_eq!(dict.get("t.transaction", "cn"), "交易 {}");
        assert_eq!(
            dict.render("t.transaction", "de", &[&"abc", &"n1A", &5]),
            "Tx abc from n1A value 5"
        );
    }

    #[test]
    fn missing_key_is_empty() {
        let dict = Dictionary::from_json(SAMPLE).unwrap();
        assert_eq!(dict.get("nope", "en"), "");
        assert_eq!(dict.get("nope", "cn"), "");
    }

    #[test]
    fn key_without_english_template_is_empty_for_other_langs() {
        let dict = Dictionary::from_json(r#"{"t.only_cn": {"cn": "仅"}}"#).unwrap();
        assert_eq!(dict.get("t.only_cn", "cn"), "仅");
        assert_eq!(dict.get("t.only_cn", "en"), "");
    }

    #[test]
    fn surplus_placeholders_are_kept() {
        assert_eq!(fill("{} and {}", &[&1]), "1 and {}");
    }

    #[test]
    fn invalid_json_is_an_error() {
        assert!(Dictionary::from_json("[1,2]").is_err());
    }
}
