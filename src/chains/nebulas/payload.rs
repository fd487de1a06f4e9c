use crate::core::types::CallContract;
use anyhow::{Context, Result, bail};
use base64::{Engine, engine::general_purpose::STANDARD};
use serde_json::Value;

/// A staking contract call the watcher reacts to. Amounts are raw strings in
/// token base units; parsing them is the caller's concern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StakingCall {
    Vote { node_id: String, amount: String },
    CancelVote { node_id: String, amount: String },
    Transfer { recipient: String, amount: String },
}

/// Decode a base64 contract-call payload.
///
/// Returns `Ok(None)` for functions the watcher ignores and for calls with
/// fewer than two arguments.
pub fn decode_staking_payload(data: &str) -> Result<Option<StakingCall>> {
    let raw = STANDARD
        .decode(data.trim())
        .context("Staking payload is not valid base64")?;
    let call: CallContract =
        serde_json::from_slice(&raw).context("Staking payload is not a contract call")?;

    let function = call.function.as_str();
    if !matches!(function, "vote" | "cancelVote" | "transfer") {
        return Ok(None);
    }

    let mut args = decode_args(&call.args)?.into_iter();
    let (Some(first), Some(second)) = (args.next(), args.next()) else {
        return Ok(None);
    };

    let call = match function {
        "vote" => StakingCall::Vote {
            node_id: first,
            amount: second,
        },
        "cancelVote" => StakingCall::CancelVote {
            node_id: first,
            amount: second,
        },
        _ => StakingCall::Transfer {
            recipient: first,
            amount: second,
        },
    };
    Ok(Some(call))
}

/// Arguments are a JSON array encoded as a string. Numbers are accepted
/// alongside strings.
fn decode_args(args: &str) -> Result<Vec<String>> {
    if args.trim().is_empty() {
        return Ok(Vec::new());
    }
    let values: Vec<Value> =
        serde_json::from_str(args).with_context(|| format!("Invalid call args: {}", args))?;
    values
        .into_iter()
        .map(|value| match value {
            Value::String(s) => Ok(s),
            Value::Number(n) => Ok(n.to_string()),
            other => bail!("Unsupported call argument: {}", other),
        })
        .collect()
}
