use crate::core::table::{Subscription, SubscriptionRole, User};
use crate::core::types::ValidatorNode;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Reverse index from address to subscribing user IDs.
///
/// `holders` covers every subscription regardless of role; `validators` only
/// the validator-role ones. Empty entries are removed so a lookup miss and an
/// empty set are the same thing.
#[derive(Debug, Default)]
pub struct SubscriptionIndex {
    holders: HashMap<String, HashSet<u64>>,
    validators: HashMap<String, HashSet<u64>>,
}

impl SubscriptionIndex {
    pub fn add(&mut self, address: &str, user_id: u64, role: SubscriptionRole) {
        self.holders
            .entry(address.to_string())
            .or_default()
            .insert(user_id);
        if role == SubscriptionRole::Validator {
            self.validators
                .entry(address.to_string())
                .or_default()
                .insert(user_id);
        }
    }

    /// Retract `user_id` from both indexes for `address`
    pub fn remove(&mut self, address: &str, user_id: u64) {
        for index in [&mut self.holders, &mut self.validators] {
            if let Some(users) = index.get_mut(address) {
                users.remove(&user_id);
                if users.is_empty() {
                    index.remove(address);
                }
            }
        }
    }

    pub fn holders(&self, address: &str) -> impl Iterator<Item = u64> + '_ {
        self.holders.get(address).into_iter().flatten().copied()
    }

    pub fn validators(&self, address: &str) -> impl Iterator<Item = u64> + '_ {
        self.validators.get(address).into_iter().flatten().copied()
    }

    pub fn is_held(&self, address: &str) -> bool {
        self.holders.contains_key(address)
    }

    /// Every `(address, user_id, role)` triple the index encodes
    pub fn entries(&self) -> BTreeSet<(String, u64, SubscriptionRole)> {
        let mut out = BTreeSet::new();
        for (address, users) in &self.holders {
            for user_id in users {
                let role = if self
                    .validators
                    .get(address)
                    .is_some_and(|v| v.contains(user_id))
                {
                    SubscriptionRole::Validator
                } else {
                    SubscriptionRole::Account
                };
                out.insert((address.clone(), *user_id, role));
            }
        }
        out
    }
}

/// A node whose stability dropped since the previous refresh
#[derive(Debug, Clone)]
pub struct StabilityDrop {
    pub node: ValidatorNode,
    pub previous: f64,
    pub recipients: Vec<User>,
}

/// A governance-eligible node and the validator subscribers of its accounts
#[derive(Debug, Clone)]
pub struct GovernanceCandidate {
    pub node: ValidatorNode,
    pub recipients: Vec<User>,
}

#[derive(Debug, Default)]
struct Registry {
    index: SubscriptionIndex,
    users: HashMap<u64, User>,
    nodes: HashMap<String, ValidatorNode>,
    last_stability: HashMap<String, f64>,
}

impl Registry {
    fn collect_users(&self, ids: impl IntoIterator<Item = u64>) -> Vec<User> {
        // BTreeMap dedups and gives a stable order
        let picked: BTreeMap<u64, &User> = ids
            .into_iter()
            .filter_map(|id| self.users.get(&id).map(|user| (id, user)))
            .collect();
        picked.into_values().cloned().collect()
    }

    fn node_validator_ids(&self, node: &ValidatorNode) -> Vec<u64> {
        node.accounts
            .unique()
            .into_iter()
            .flat_map(|address| self.index.validators(address).collect::<Vec<_>>())
            .collect()
    }
}

/// Everything the scanner, the bot and the aggregator share, behind one lock.
///
/// Readers copy what they need out; nothing here performs I/O, so the lock is
/// never held across an await point.
#[derive(Default)]
pub struct WatchState {
    inner: RwLock<Registry>,
}

impl WatchState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace users and index with the persisted rows
    pub fn rebuild(&self, users: Vec<User>, subscriptions: &[Subscription]) {
        let mut index = SubscriptionIndex::default();
        for sub in subscriptions {
            index.add(&sub.address, sub.user_id, sub.role);
        }
        let users = users.into_iter().map(|user| (user.id, user)).collect();

        let mut registry = self.inner.write();
        registry.index = index;
        registry.users = users;
    }

    pub fn upsert_user(&self, user: User) {
        self.inner.write().users.insert(user.id, user);
    }

    pub fn user(&self, id: u64) -> Option<User> {
        self.inner.read().users.get(&id).cloned()
    }

    pub fn add_subscription(&self, sub: &Subscription) {
        self.inner
            .write()
            .index
            .add(&sub.address, sub.user_id, sub.role);
    }

    pub fn remove_subscription(&self, user_id: u64, address: &str) {
        self.inner.write().index.remove(address, user_id);
    }

    pub fn is_held(&self, address: &str) -> bool {
        self.inner.read().index.is_held(address)
    }

    pub fn index_entries(&self) -> BTreeSet<(String, u64, SubscriptionRole)> {
        self.inner.read().index.entries()
    }

    /// Users holding any of `addresses`, each once
    pub fn holders_of(&self, addresses: &[&str]) -> Vec<User> {
        let registry = self.inner.read();
        let ids: Vec<u64> = addresses
            .iter()
            .flat_map(|address| registry.index.holders(address).collect::<Vec<_>>())
            .collect();
        registry.collect_users(ids)
    }

    /// Validator-role subscribers of `node_id`'s accounts plus holders of
    /// `sender`, each once. `None` when the node is not cached.
    pub fn delegation_recipients(&self, node_id: &str, sender: &str) -> Option<Vec<User>> {
        let registry = self.inner.read();
        let node = registry.nodes.get(node_id)?;
        let mut ids = registry.node_validator_ids(node);
        ids.extend(registry.index.holders(sender));
        Some(registry.collect_users(ids))
    }

    /// Merge a fresh node list into the cache, replacing by ID
    pub fn merge_nodes(&self, nodes: Vec<ValidatorNode>) {
        let mut registry = self.inner.write();
        for node in nodes {
            registry.nodes.insert(node.id.clone(), node);
        }
    }

    /// The cached node one of whose role accounts is `address`
    pub fn node_owning(&self, address: &str) -> Option<ValidatorNode> {
        let registry = self.inner.read();
        let mut owners: Vec<&ValidatorNode> = registry
            .nodes
            .values()
            .filter(|node| node.accounts.contains(address))
            .collect();
        owners.sort_by(|a, b| a.id.cmp(&b.id));
        owners.first().map(|node| (*node).clone())
    }

    /// Nodes whose index is below nominal and lower than at the previous
    /// snapshot. Nodes without a previous value are skipped.
    pub fn stability_drops(&self) -> Vec<StabilityDrop> {
        let registry = self.inner.read();
        let mut drops: Vec<StabilityDrop> = registry
            .nodes
            .values()
            .filter(|node| node.stability_index != ValidatorNode::NOMINAL_STABILITY)
            .filter_map(|node| {
                let previous = *registry.last_stability.get(&node.id)?;
                if node.stability_index >= previous {
                    return None;
                }
                Some(StabilityDrop {
                    node: node.clone(),
                    previous,
                    recipients: registry.collect_users(registry.node_validator_ids(node)),
                })
            })
            .collect();
        drops.sort_by(|a, b| a.node.id.cmp(&b.node.id));
        drops
    }

    /// Remember every node's current index for the next comparison
    pub fn commit_stability_snapshot(&self) {
        let mut registry = self.inner.write();
        let snapshot: HashMap<String, f64> = registry
            .nodes
            .values()
            .map(|node| (node.id.clone(), node.stability_index))
            .collect();
        registry.last_stability = snapshot;
    }

    pub fn governance_candidates(&self) -> Vec<GovernanceCandidate> {
        let registry = self.inner.read();
        let mut out: Vec<GovernanceCandidate> = registry
            .nodes
            .values()
            .filter(|node| node.node_type.is_governance_eligible())
            .map(|node| GovernanceCandidate {
                node: node.clone(),
                recipients: registry.collect_users(registry.node_validator_ids(node)),
            })
            .collect();
        out.sort_by(|a, b| a.node.id.cmp(&b.node.id));
        out
    }
}
