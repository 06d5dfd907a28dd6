use serde::{Deserialize, Serialize};

use crate::address::Address;

/// A raw log record in the JSON-RPC shape returned by `eth_getLogs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Log {
    pub address: Address,
    #[serde(with = "hex_list")]
    pub topics: Vec<Vec<u8>>,
    #[serde(with = "hex_bytes")]
    pub data: Vec<u8>,
    #[serde(default, with = "quantity", skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<String>,
    #[serde(default, with = "quantity", skip_serializing_if = "Option::is_none")]
    pub log_index: Option<u64>,
    /// Set by nodes when the log was reverted by a reorg.
    #[serde(default)]
    pub removed: bool,
}

/// A log matched to an event of a bound contract, with every parameter decoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedEvent {
    pub contract: String,
    pub address: Address,
    pub event: String,
    pub signature: String,
    pub block_number: Option<u64>,
    pub transaction_hash: Option<String>,
    pub log_index: Option<u64>,
    /// Milliseconds since the epoch when the indexer decoded the log.
    #[serde(default)]
    pub indexed_at_ms: u64,
    pub params: Vec<DecodedParam>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedParam {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub indexed: bool,
    pub value: serde_json::Value,
}

impl DecodedEvent {
    pub fn param(&self, name: &str) -> Option<&serde_json::Value> {
        self.params.iter().find(|p| p.name == name).map(|p| &p.value)
    }
}

pub(crate) mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::hash::{from_hex, to_hex};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&to_hex(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        from_hex(&s).map_err(serde::de::Error::custom)
    }
}

mod hex_list {
    use serde::ser::SerializeSeq;
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::hash::{from_hex, to_hex};

    pub fn serialize<S: Serializer>(items: &[Vec<u8>], s: S) -> Result<S::Ok, S::Error> {
        let mut seq = s.serialize_seq(Some(items.len()))?;
        for item in items {
            seq.serialize_element(&to_hex(item))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Vec<u8>>, D::Error> {
        let items = Vec::<String>::deserialize(d)?;
        items
            .iter()
            .map(|s| from_hex(s).map_err(serde::de::Error::custom))
            .collect()
    }
}

/// `0x`-prefixed hex quantities, as JSON-RPC encodes block numbers.
pub(crate) mod quantity {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<u64>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => s.serialize_str(&format!("{v:#x}")),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
        let Some(s) = Option::<String>::deserialize(d)? else {
            return Ok(None);
        };
        parse(&s).map(Some).map_err(serde::de::Error::custom)
    }

    pub fn parse(s: &str) -> Result<u64, String> {
        let digits = s
            .strip_prefix("0x")
            .ok_or_else(|| format!("quantity `{s}` is missing the 0x prefix"))?;
        u64::from_str_radix(digits, 16).map_err(|e| format!("quantity `{s}`: {e}"))
    }
}

pub use quantity::parse as parse_quantity;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rpc_log() {
        let json = r#"{
            "address": "0x1111111111111111111111111111111111111111",
            "topics": ["0x64d230a825286b8d5ee19900ef8e76841c6a5ca2b07ea63d479a9a865a8557e3"],
            "data": "0x00000000000000000000000000000000000000000000000000000000000003e8",
            "blockNumber": "0x1b4",
            "transactionHash": "0xabc",
            "logIndex": "0x0",
            "blockHash": "0xdef"
        }"#;
        let log: Log = serde_json::from_str(json).unwrap();
        assert_eq!(log.address, Address([0x11; 20]));
        assert_eq!(log.topics.len(), 1);
        assert_eq!(log.topics[0].len(), 32);
        assert_eq!(log.data.len(), 32);
        assert_eq!(log.block_number, Some(436));
        assert_eq!(log.log_index, Some(0));
        assert!(!log.removed);

        let back = serde_json::to_value(&log).unwrap();
        assert_eq!(back["blockNumber"], "0x1b4");
        assert_eq!(back["data"], "0x00000000000000000000000000000000000000000000000000000000000003e8");
    }

    #[test]
    fn pending_log_has_no_block() {
        let json = r#"{"address":"0x1111111111111111111111111111111111111111","topics":[],"data":"0x","blockNumber":null,"logIndex":null}"#;
        let log: Log = serde_json::from_str(json).unwrap();
        assert_eq!(log.block_number, None);
        assert!(log.data.is_empty());
    }

    #[test]
    fn quantity_requires_prefix() {
        assert_eq!(parse_quantity("0x10"), Ok(16));
        assert!(parse_quantity("10").is_err());
    }
}
