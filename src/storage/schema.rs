// Key naming conventions and prefix constants
pub mod keys {
    pub const USER_PREFIX: &str = "user";
    pub const USER_CHAT_PREFIX: &str = "user_chat";
    pub const ADDRESS_PREFIX: &str = "address";
    pub const SUBSCRIPTION_PREFIX: &str = "subscription";
    pub const SEQ_PREFIX: &str = "seq";

    /// Last fully processed block height
    pub const CURRENT_HEIGHT: &str = "state:current_height";

    pub const USERS_SEQ: &str = "users";
    pub const SUBSCRIPTIONS_SEQ: &str = "subscriptions";

    // example: user:42
    pub fn user_key(id: u64) -> String {
        format!("{}:{}", USER_PREFIX, id)
    }

    // example: user_chat:123456789 -> "42"
    pub fn user_chat_key(chat_id: i64) -> String {
        format!("{}:{}", USER_CHAT_PREFIX, chat_id)
    }

    // example: address:n1Jkdiq1H1HSXYJXtvDDkYm84Tmapo4hhMv
    pub fn address_key(address: &str) -> String {
        format!("{}:{}", ADDRESS_PREFIX, address)
    }

    // example: subscription:42:n1Jkdiq1H1HSXYJXtvDDkYm84Tmapo4hhMv
    pub fn subscription_key(user_id: u64, address: &str) -> String {
        format!("{}:{}:{}", SUBSCRIPTION_PREFIX, user_id, address)
    }

    /// Prefix of one user's subscriptions. The trailing separator keeps user 4
    /// from matching user 42.
    pub fn user_subscriptions_prefix(user_id: u64) -> String {
        format!("{}:{}:", SUBSCRIPTION_PREFIX, user_id)
    }

    pub fn all_subscriptions_prefix() -> String {
        format!("{}:", SUBSCRIPTION_PREFIX)
    }

    pub fn all_users_prefix() -> String {
        format!("{}:", USER_PREFIX)
    }

    // example: seq:users
    pub fn seq_key(name: &str) -> String {
        format!("{}:{}", SEQ_PREFIX, name)
    }
}
