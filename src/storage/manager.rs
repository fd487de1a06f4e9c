use crate::core::storage::KVStorage;
use crate::core::table::{AddressRecord, NewUser, Subscription, SubscriptionRole, User};
use crate::storage::schema::keys;
use anyhow::{Context, Result};
use chrono::Utc;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::sync::Arc;

use super::rocksdb::RocksDBStorage;

/// Aliases longer than this are truncated on insert
pub const MAX_ALIAS_CHARS: usize = 100;

/// Serializes every read-modify-write sequence against the store, so that
/// check-and-insert operations are atomic with respect to each other.
type WriteLock = Arc<Mutex<()>>;

fn next_seq(storage: &RocksDBStorage, name: &str) -> Result<u64> {
    let current = match storage.read(&keys::seq_key(name))? {
        Some(raw) => raw
            .parse::<u64>()
            .with_context(|| format!("Corrupt sequence counter: {}", name))?,
        None => 0,
    };
    Ok(current + 1)
}

pub struct UserStorage {
    pub storage: Arc<RocksDBStorage>,
    lock: WriteLock,
}

impl UserStorage {
    pub fn get(&self, id: u64) -> Result<Option<User>> {
        self.storage.read_json(&keys::user_key(id))
    }

    pub fn get_by_chat(&self, chat_id: i64) -> Result<Option<User>> {
        let Some(raw_id) = self.storage.read(&keys::user_chat_key(chat_id))? else {
            return Ok(None);
        };
        let id = raw_id
            .parse::<u64>()
            .with_context(|| format!("Corrupt chat index for chat: {}", chat_id))?;
        self.get(id)
    }

    /// Return the user behind `new.chat_id`, creating it with default settings
    /// on first contact. The boolean is true when the user was created.
    pub fn find_or_create(&self, new: NewUser) -> Result<(User, bool)> {
        let _guard = self.lock.lock();

        if let Some(user) = self.get_by_chat(new.chat_id)? {
            return Ok((user, false));
        }

        let id = next_seq(&self.storage, keys::USERS_SEQ)?;
        let user = User {
            id,
            chat_id: new.chat_id,
            lang: User::DEFAULT_LANG.to_string(),
            username: new.username,
            name: new.name,
            mute: false,
            step: String::new(),
            min_threshold: Decimal::ZERO,
            max_threshold: User::default_max_threshold(),
            created_at: Utc::now(),
        };

        self.storage.batch_write(vec![
            (keys::user_key(id), serde_json::to_string(&user)?),
            (keys::user_chat_key(user.chat_id), id.to_string()),
            (keys::seq_key(keys::USERS_SEQ), id.to_string()),
        ])?;

        Ok((user, true))
    }

    pub fn save(&self, user: &User) -> Result<()> {
        let _guard = self.lock.lock();
        self.storage.write_json(&keys::user_key(user.id), user)
    }

    pub fn list(&self) -> Result<Vec<User>> {
        self.storage
            .scan_prefix(&keys::all_users_prefix(), None)?
            .into_iter()
            .map(|(key, value)| {
                serde_json::from_str::<User>(&value)
                    .with_context(|| format!("Failed to deserialize user row: {}", key))
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubscribeOutcome {
    Created(Subscription),
    AlreadySubscribed,
}

pub struct SubscriptionStorage {
    pub storage: Arc<RocksDBStorage>,
    lock: WriteLock,
}

impl SubscriptionStorage {
    pub fn get(&self, user_id: u64, address: &str) -> Result<Option<Subscription>> {
        self.storage
            .read_json(&keys::subscription_key(user_id, address))
    }

    pub fn exists(&self, user_id: u64, address: &str) -> Result<bool> {
        self.storage
            .exists(&keys::subscription_key(user_id, address))
    }

    /// Atomically create the address row if absent and the (user, address)
    /// subscription. A second call for the same pair creates nothing.
    pub fn subscribe(
        &self,
        user_id: u64,
        address: &str,
        alias: &str,
        role: SubscriptionRole,
    ) -> Result<SubscribeOutcome> {
        let _guard = self.lock.lock();

        let sub_key = keys::subscription_key(user_id, address);
        if self.storage.exists(&sub_key)? {
            return Ok(SubscribeOutcome::AlreadySubscribed);
        }

        let now = Utc::now();
        let mut writes = Vec::with_capacity(3);

        let address_key = keys::address_key(address);
        if !self.storage.exists(&address_key)? {
            let record = AddressRecord {
                address: address.to_string(),
                created_at: now,
            };
            writes.push((address_key, serde_json::to_string(&record)?));
        }

        let seq = next_seq(&self.storage, keys::SUBSCRIPTIONS_SEQ)?;
        let subscription = Subscription {
            user_id,
            address: address.to_string(),
            alias: alias.chars().take(MAX_ALIAS_CHARS).collect(),
            role,
            seq,
            created_at: now,
        };
        writes.push((sub_key, serde_json::to_string(&subscription)?));
        writes.push((keys::seq_key(keys::SUBSCRIPTIONS_SEQ), seq.to_string()));

        self.storage.batch_write(writes)?;
        Ok(SubscribeOutcome::Created(subscription))
    }

    /// Remove the (user, address) row, returning it if it existed. The address
    /// row is kept: addresses are never deleted.
    pub fn unsubscribe(&self, user_id: u64, address: &str) -> Result<Option<Subscription>> {
        let _guard = self.lock.lock();

        let key = keys::subscription_key(user_id, address);
        let existing: Option<Subscription> = self.storage.read_json(&key)?;
        if existing.is_some() {
            self.storage.delete(&key)?;
        }
        Ok(existing)
    }

    /// A user's subscriptions, newest first
    pub fn list_for_user(&self, user_id: u64) -> Result<Vec<Subscription>> {
        let mut subs = self.decode(&keys::user_subscriptions_prefix(user_id))?;
        subs.sort_by(|a, b| b.seq.cmp(&a.seq));
        Ok(subs)
    }

    /// The `limit` most recent subscriptions of a user, newest first
    pub fn recent_for_user(&self, user_id: u64, limit: usize) -> Result<Vec<Subscription>> {
        let mut subs = self.list_for_user(user_id)?;
        subs.truncate(limit);
        Ok(subs)
    }

    pub fn list_all(&self) -> Result<Vec<Subscription>> {
        self.decode(&keys::all_subscriptions_prefix())
    }

    fn decode(&self, prefix: &str) -> Result<Vec<Subscription>> {
        self.storage
            .scan_prefix(prefix, None)?
            .into_iter()
            .map(|(key, value)| {
                serde_json::from_str::<Subscription>(&value)
                    .with_context(|| format!("Failed to deserialize subscription row: {}", key))
            })
            .collect()
    }
}

pub struct CursorStorage {
    pub storage: Arc<RocksDBStorage>,
    lock: WriteLock,
}

impl CursorStorage {
    pub fn get(&self) -> Result<Option<u64>> {
        match self.storage.read(keys::CURRENT_HEIGHT)? {
            Some(raw) => Ok(Some(
                raw.parse::<u64>()
                    .context("Corrupt scan cursor value")?,
            )),
            None => Ok(None),
        }
    }

    /// Write `height` only when no cursor exists yet. Returns the effective cursor.
    pub fn seed(&self, height: u64) -> Result<u64> {
        let _guard = self.lock.lock();
        if let Some(current) = self.get()? {
            return Ok(current);
        }
        self.storage.write(keys::CURRENT_HEIGHT, &height.to_string())?;
        Ok(height)
    }

    /// Move the cursor to `height`. Moving it backwards is refused.
    pub fn advance(&self, height: u64) -> Result<()> {
        let _guard = self.lock.lock();
        if let Some(current) = self.get()?
            && height < current
        {
            anyhow::bail!(
                "Refusing to move scan cursor backwards from {} to {}",
                current,
                height
            );
        }
        self.storage.write(keys::CURRENT_HEIGHT, &height.to_string())
    }
}

pub struct WatcherStorageManager {
    pub storage: Arc<RocksDBStorage>,
    pub users: Arc<UserStorage>,
    pub subscriptions: Arc<SubscriptionStorage>,
    pub cursor: Arc<CursorStorage>,
}

impl WatcherStorageManager {
    pub fn new(storage: Arc<RocksDBStorage>) -> Self {
        let lock: WriteLock = Arc::new(Mutex::new(()));
        Self {
            users: Arc::new(UserStorage {
                storage: storage.clone(),
                lock: lock.clone(),
            }),
            subscriptions: Arc::new(SubscriptionStorage {
                storage: storage.clone(),
                lock: lock.clone(),
            }),
            cursor: Arc::new(CursorStorage {
                storage: storage.clone(),
                lock,
            }),
            storage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    fn open_temp() -> (WatcherStorageManager, TempDir) {
        let dir = TempDir::new().unwrap();
        let storage = RocksDBStorage::new(dir.path().to_str().unwrap()).unwrap();
        (WatcherStorageManager::new(Arc::new(storage)), dir)
    }

    fn new_user(chat_id: i64) -> NewUser {
        NewUser {
            chat_id,
            username: "alice".to_string(),
            name: "Alice".to_string(),
        }
    }

    #[test]
    fn find_or_create_assigns_ids_once_per_chat() {
        let (manager, _dir) = open_temp();

        let (first, created) = manager.users.find_or_create(new_user(100)).unwrap();
        assert!(created);
        assert_eq!(first.id, 1);
        assert_eq!(first.lang, "en");
        assert_eq!(first.min_threshold, dec!(0));
        assert_eq!(first.max_threshold, dec!(99999999999));

        let (again, created) = manager.users.find_or_create(new_user(100)).unwrap();
        assert!(!created);
        assert_eq!(again.id, 1);

        let (second, _) = manager.users.find_or_create(new_user(200)).unwrap();
        assert_eq!(second.id, 2);
        assert_eq!(manager.users.list().unwrap().len(), 2);
    }

    #[test]
    fn save_persists_settings() {
        let (manager, _dir) = open_temp();
        let (mut user, _) = manager.users.find_or_create(new_user(1)).unwrap();

        user.mute = true;
        user.lang = "cn".to_string();
        manager.users.save(&user).unwrap();

        let stored = manager.users.get_by_chat(1).unwrap().unwrap();
        assert!(stored.mute);
        assert_eq!(stored.lang, "cn");
    }

    #[test]
    fn duplicate_subscription_creates_no_second_row() {
        let (manager, _dir) = open_temp();

        let first = manager
            .subscriptions
            .subscribe(1, "n1A", "main", SubscriptionRole::Account)
            .unwrap();
        assert!(matches!(first, SubscribeOutcome::Created(ref s) if s.seq == 1));

        let second = manager
            .subscriptions
            .subscribe(1, "n1A", "again", SubscriptionRole::Validator)
            .unwrap();
        assert_eq!(second, SubscribeOutcome::AlreadySubscribed);

        let subs = manager.subscriptions.list_all().unwrap();
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].alias, "main");
        assert_eq!(subs[0].role, SubscriptionRole::Account);
    }

    #[test]
    fn address_row_is_shared_and_survives_unsubscribe() {
        let (manager, _dir) = open_temp();

        manager
            .subscriptions
            .subscribe(1, "n1A", "", SubscriptionRole::Account)
            .unwrap();
        manager
            .subscriptions
            .subscribe(2, "n1A", "", SubscriptionRole::Validator)
            .unwrap();

        let removed = manager.subscriptions.unsubscribe(1, "n1A").unwrap();
        assert!(removed.is_some());
        assert!(manager.subscriptions.unsubscribe(1, "n1A").unwrap().is_none());

        assert!(manager.storage.exists(&keys::address_key("n1A")).unwrap());
        assert!(manager.subscriptions.exists(2, "n1A").unwrap());
    }

    #[test]
    fn alias_is_truncated() {
        let (manager, _dir) = open_temp();
        let long = "x".repeat(150);

        manager
            .subscriptions
            .subscribe(1, "n1A", &long, SubscriptionRole::Account)
            .unwrap();

        let sub = manager.subscriptions.get(1, "n1A").unwrap().unwrap();
        assert_eq!(sub.alias.chars().count(), MAX_ALIAS_CHARS);
    }

    #[test]
    fn recent_for_user_is_newest_first_and_limited() {
        let (manager, _dir) = open_temp();
        for i in 0..5 {
            let address = format!("n1addr{}", i);
            manager
                .subscriptions
                .subscribe(7, &address, "", SubscriptionRole::Account)
                .unwrap();
        }
        manager
            .subscriptions
            .subscribe(8, "n1other", "", SubscriptionRole::Account)
            .unwrap();

        let recent = manager.subscriptions.recent_for_user(7, 3).unwrap();
        let addresses: Vec<&str> = recent.iter().map(|s| s.address.as_str()).collect();
        assert_eq!(addresses, vec!["n1addr4", "n1addr3", "n1addr2"]);
    }

    #[test]
    fn cursor_seeds_once_and_never_decreases() {
        let (manager, _dir) = open_temp();

        assert_eq!(manager.cursor.get().unwrap(), None);
        assert_eq!(manager.cursor.seed(50).unwrap(), 50);
        assert_eq!(manager.cursor.seed(10).unwrap(), 50);

        manager.cursor.advance(51).unwrap();
        manager.cursor.advance(51).unwrap();
        assert!(manager.cursor.advance(49).is_err());
        assert_eq!(manager.cursor.get().unwrap(), Some(51));
    }
}
