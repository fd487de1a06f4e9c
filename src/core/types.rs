use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

/// Every Nebulas RPC response wraps its payload in `{"result": ...}`.
#[derive(Deserialize, Debug, Clone)]
pub struct RpcEnvelope<T> {
    pub result: T,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Block {
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub parent_hash: String,
    #[serde(deserialize_with = "u64_from_str_or_number")]
    pub height: u64,
    #[serde(default)]
    pub is_finality: bool,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Transaction {
    pub hash: String,
    pub from: String,
    pub to: String,
    /// Raw value in base units
    #[serde(default)]
    pub value: Decimal,
    #[serde(default, rename = "type")]
    pub tx_type: String,
    /// Base64 payload for contract calls
    #[serde(default)]
    pub data: String,
    /// 1 = success, 0 = failed, 2 = pending
    #[serde(default)]
    pub status: i32,
    #[serde(default, deserialize_with = "u64_from_str_or_number")]
    pub block_height: u64,
}

impl Transaction {
    pub fn is_success(&self) -> bool {
        self.status == 1
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct AccountState {
    /// Raw balance in base units
    pub balance: Decimal,
    #[serde(default)]
    pub nonce: String,
    #[serde(default, rename = "type")]
    pub account_type: i32,
}

/// Request body for `v1/user/call`
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CallRequest {
    pub from: String,
    pub to: String,
    pub value: String,
    pub gas_price: String,
    pub gas_limit: String,
    pub contract: CallContract,
}

/// Function name plus JSON-encoded argument list. Also the decoded shape of a
/// contract-call transaction payload.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CallContract {
    pub function: String,
    #[serde(default)]
    pub args: String,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ContractCallResult {
    #[serde(default)]
    pub result: String,
    #[serde(default)]
    pub execute_err: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(from = "i32", into = "i32")]
pub enum NodeType {
    Consensus,
    Candidate,
    Other(i32),
}

impl NodeType {
    /// Consensus and candidate nodes take part in the next governance period.
    pub fn is_governance_eligible(&self) -> bool {
        matches!(self, NodeType::Consensus | NodeType::Candidate)
    }
}

impl From<i32> for NodeType {
    fn from(value: i32) -> Self {
        match value {
            2 => NodeType::Consensus,
            3 => NodeType::Candidate,
            other => NodeType::Other(other),
        }
    }
}

impl From<NodeType> for i32 {
    fn from(value: NodeType) -> Self {
        match value {
            NodeType::Consensus => 2,
            NodeType::Candidate => 3,
            NodeType::Other(other) => other,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NodeAccounts {
    #[serde(default)]
    pub registrant: String,
    #[serde(default)]
    pub consensus_manager: String,
    #[serde(default)]
    pub gov_manager: String,
    #[serde(default)]
    pub staking_account: String,
}

impl NodeAccounts {
    /// The role addresses with duplicates and blanks removed, in a stable order.
    pub fn unique(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::with_capacity(4);
        for address in [
            self.consensus_manager.as_str(),
            self.gov_manager.as_str(),
            self.registrant.as_str(),
            self.staking_account.as_str(),
        ] {
            if !address.is_empty() && !out.contains(&address) {
                out.push(address);
            }
        }
        out
    }

    pub fn contains(&self, address: &str) -> bool {
        self.unique().contains(&address)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ValidatorNode {
    pub id: String,
    #[serde(default)]
    pub accounts: NodeAccounts,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(default = "ValidatorNode::nominal_stability")]
    pub stability_index: f64,
}

impl ValidatorNode {
    pub const NOMINAL_STABILITY: f64 = 1.0;

    fn nominal_stability() -> f64 {
        Self::NOMINAL_STABILITY
    }
}

/// One entry of a node's vote list; `value` in token base units.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Vote {
    #[serde(default)]
    pub address: String,
    pub value: Decimal,
}

/// Nebulas encodes most integers as JSON strings.
pub fn u64_from_str_or_number<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Num(u64),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Num(n) => Ok(n),
        Raw::Str(s) if s.is_empty() => Ok(0),
        Raw::Str(s) => s.parse::<u64>().map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_parses_string_encoded_heights() {
        let json = r#"{
            "result": {
                "hash": "abc",
                "parent_hash": "def",
                "height": "100",
                "is_finality": true,
                "transactions": [{
                    "hash": "tx1",
                    "from": "n1A",
                    "to": "n1B",
                    "value": "5000000000",
                    "type": "binary",
                    "data": "",
                    "status": 1,
                    "block_height": "100"
                }]
            }
        }"#;
        let block: RpcEnvelope<Block> = serde_json::from_str(json).unwrap();
        assert_eq!(block.result.height, 100);
        let tx = &block.result.transactions[0];
        assert_eq!(tx.block_height, 100);
        assert_eq!(tx.value, Decimal::from(5_000_000_000u64));
        assert!(tx.is_success());
    }

    #[test]
    fn node_type_maps_known_codes() {
        assert_eq!(NodeType::from(2), NodeType::Consensus);
        assert_eq!(NodeType::from(3), NodeType::Candidate);
        assert_eq!(NodeType::from(7), NodeType::Other(7));
        assert!(NodeType::Candidate.is_governance_eligible());
        assert!(!NodeType::Other(1).is_governance_eligible());
    }

    #[test]
    fn node_accounts_unique_drops_duplicates_and_blanks() {
        let accounts = NodeAccounts {
            registrant: "n1R".to_string(),
            consensus_manager: "n1R".to_string(),
            gov_manager: "n1G".to_string(),
            staking_account: String::new(),
        };
        assert_eq!(accounts.unique(), vec!["n1R", "n1G"]);
        assert!(accounts.contains("n1G"));
        assert!(!accounts.contains(""));
    }

    #[test]
    fn validator_node_parses_camel_case() {
        let json = r#"{
            "id": "V1",
            "accounts": {
                "registrant": "n1R",
                "consensusManager": "n1C",
                "govManager": "n1G",
                "stakingAccount": "n1S"
            },
            "type": 3,
            "stabilityIndex": 0.8
        }"#;
        let node: ValidatorNode = serde_json::from_str(json).unwrap();
        assert_eq!(node.id, "V1");
        assert_eq!(node.accounts.gov_manager, "n1G");
        assert_eq!(node.node_type, NodeType::Candidate);
        assert_eq!(node.stability_index, 0.8);
    }
}
