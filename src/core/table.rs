use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a subscribed address is tracked
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionRole {
    /// A plain account: transfers, delegations and staking-token movements
    Account,
    /// One of a validator's role accounts: additionally node health and governance
    Validator,
}

impl SubscriptionRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionRole::Account => "account",
            SubscriptionRole::Validator => "validator",
        }
    }
}

impl fmt::Display for SubscriptionRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriptionRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "account" => Ok(SubscriptionRole::Account),
            "validator" => Ok(SubscriptionRole::Validator),
            other => Err(anyhow::anyhow!("Unknown subscription role: {}", other)),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct User {
    pub id: u64,
    pub chat_id: i64,
    pub lang: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub mute: bool,
    /// Conversation step, owned by the bot
    #[serde(default)]
    pub step: String,
    pub min_threshold: Decimal,
    pub max_threshold: Decimal,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub const DEFAULT_LANG: &'static str = "en";

    pub fn default_max_threshold() -> Decimal {
        Decimal::from(99_999_999_999u64)
    }

    /// `min < value <= max`
    pub fn accepts_value(&self, value: Decimal) -> bool {
        value > self.min_threshold && value <= self.max_threshold
    }
}

/// Fields known at first contact
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub chat_id: i64,
    pub username: String,
    pub name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AddressRecord {
    pub address: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Subscription {
    pub user_id: u64,
    pub address: String,
    pub alias: String,
    pub role: SubscriptionRole,
    /// Monotonic creation order across all subscriptions
    pub seq: u64,
    pub created_at: DateTime<Utc>,
}
