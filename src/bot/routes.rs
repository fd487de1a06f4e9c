use crate::core::table::SubscriptionRole;
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;

/// Conversation step, persisted in `User::step`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Start,
    ChooseLang,
    Settings,
    TypeAddress,
    PasteAddress,
    AddressAlias,
    ChangeThreshold,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Start => "start",
            Step::ChooseLang => "choose_lang",
            Step::Settings => "settings",
            Step::TypeAddress => "type_address",
            Step::PasteAddress => "paste_address",
            Step::AddressAlias => "address_alias",
            Step::ChangeThreshold => "change_treshold",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Step {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "start" => Step::Start,
            "choose_lang" => Step::ChooseLang,
            "settings" => Step::Settings,
            "type_address" => Step::TypeAddress,
            "paste_address" => Step::PasteAddress,
            "address_alias" => Step::AddressAlias,
            "change_treshold" => Step::ChangeThreshold,
            other => anyhow::bail!("Unknown step: {:?}", other),
        })
    }
}

/// Scratch state of an in-progress "add subscription" flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingFlow {
    Role(SubscriptionRole),
    RoleAndAddress(SubscriptionRole, String),
}

pub const ADDRESS_LEN: usize = 35;

/// Nebulas addresses are 35 base58 characters starting with `n`
pub fn is_valid_address(address: &str) -> bool {
    address.len() == ADDRESS_LEN && address.starts_with('n')
}

/// Parse `"<min> <max>"`. `min` may not exceed `max` and neither may be negative.
pub fn parse_thresholds(input: &str) -> Option<(Decimal, Decimal)> {
    let mut parts = input.split_whitespace();
    let (Some(min), Some(max), None) = (parts.next(), parts.next(), parts.next()) else {
        return None;
    };
    let min = Decimal::from_str(min).ok()?;
    let max = Decimal::from_str(max).ok()?;
    if min.is_sign_negative() || max.is_sign_negative() || min > max {
        return None;
    }
    Some((min, max))
}

pub const DELETE_PREFIX: &str = "delete_";

pub fn delete_action(address: &str) -> String {
    format!("{}{}", DELETE_PREFIX, address)
}
