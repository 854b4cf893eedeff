//! Fixture types for the JSON VM-test format

use fugue_primitives::{Address, H256, U256};
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;

/// Hex-encoded byte string
#[derive(Debug, Clone, Default)]
pub struct HexBytes(pub Vec<u8>);

impl<'de> Deserialize<'de> for HexBytes {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: String = Deserialize::deserialize(deserializer)?;
        let s = s.strip_prefix("0x").unwrap_or(&s);
        if s.is_empty() {
            return Ok(HexBytes(Vec::new()));
        }
        hex::decode(s).map(HexBytes).map_err(serde::de::Error::custom)
    }
}

/// Hex-encoded 256-bit word, accepting short and odd-length strings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HexU256(pub U256);

/// Parse a possibly short, possibly odd-length hex quantity
pub fn parse_u256(s: &str) -> Result<U256, String> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    if s.is_empty() {
        return Ok(U256::zero());
    }
    let padded = if s.len() % 2 == 1 {
        format!("0{s}")
    } else {
        s.to_string()
    };
    let bytes = hex::decode(&padded).map_err(|e| e.to_string())?;
    if bytes.len() > 32 {
        return Err(format!("quantity longer than 32 bytes: {s}"));
    }
    Ok(U256::from_big_endian(&bytes))
}

impl<'de> Deserialize<'de> for HexU256 {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: String = Deserialize::deserialize(deserializer)?;
        parse_u256(&s).map(HexU256).map_err(serde::de::Error::custom)
    }
}

/// Hex-encoded u64
#[derive(Debug, Clone, Copy, Default)]
pub struct HexU64(pub u64);

impl<'de> Deserialize<'de> for HexU64 {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: String = Deserialize::deserialize(deserializer)?;
        let s = s.strip_prefix("0x").unwrap_or(&s);
        if s.is_empty() {
            return Ok(HexU64(0));
        }
        u64::from_str_radix(s, 16)
            .map(HexU64)
            .map_err(serde::de::Error::custom)
    }
}

/// Hex-encoded 20-byte address
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct HexAddress(pub Address);

impl<'de> Deserialize<'de> for HexAddress {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: String = Deserialize::deserialize(deserializer)?;
        Address::from_hex(&s)
            .map(HexAddress)
            .map_err(serde::de::Error::custom)
    }
}

/// Hex-encoded 32-byte hash, right-aligned when short
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HexH256(pub H256);

impl<'de> Deserialize<'de> for HexH256 {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: String = Deserialize::deserialize(deserializer)?;
        parse_u256(&s)
            .map(|word| HexH256(H256::from_word(&word)))
            .map_err(serde::de::Error::custom)
    }
}

/// Test file: map of test name to case
pub type VmTestFile = HashMap<String, VmTestCase>;

/// One VM test case
#[derive(Debug, Deserialize)]
pub struct VmTestCase {
    /// Block environment
    pub env: VmEnv,
    /// Execution parameters
    pub exec: VmExec,
    /// Pre-execution accounts
    pub pre: HashMap<String, AccountState>,
    /// Expected gas remaining; absent when the case must fail
    pub gas: Option<HexU64>,
    /// Expected output
    pub out: Option<HexBytes>,
    /// Expected post-execution accounts; absent when the case must fail
    pub post: Option<HashMap<String, AccountState>>,
}

/// Block environment of a case
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VmEnv {
    /// Block beneficiary
    pub current_coinbase: HexAddress,
    /// Block difficulty
    pub current_difficulty: HexU256,
    /// Block gas limit
    pub current_gas_limit: HexU64,
    /// Block height
    pub current_number: HexU64,
    /// Block timestamp
    pub current_timestamp: HexU64,
}

/// Execution parameters of a case
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VmExec {
    /// Account whose context the code runs in
    pub address: HexAddress,
    /// Calling account
    pub caller: HexAddress,
    /// Code to execute
    pub code: HexBytes,
    /// Call input
    pub data: HexBytes,
    /// Gas provided
    pub gas: HexU64,
    /// Gas price
    pub gas_price: HexU64,
    /// Transaction origin
    pub origin: HexAddress,
    /// Value transferred
    pub value: HexU256,
}

/// Account fixture: balance, code, nonce and storage
#[derive(Debug, Deserialize, Default)]
pub struct AccountState {
    /// Balance
    pub balance: HexU256,
    /// Code
    pub code: HexBytes,
    /// Nonce
    pub nonce: HexU64,
    /// Storage slots, keyed by hex quantity
    pub storage: HashMap<String, HexU256>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_bytes_deserialize() {
        let bytes: HexBytes = serde_json::from_str(r#""0x1234""#).unwrap();
        assert_eq!(bytes.0, vec![0x12, 0x34]);
        let empty: HexBytes = serde_json::from_str(r#""0x""#).unwrap();
        assert!(empty.0.is_empty());
    }

    #[test]
    fn test_hex_u256_short_and_odd() {
        let value: HexU256 = serde_json::from_str(r#""0x1""#).unwrap();
        assert_eq!(value.0, U256::one());
        let value: HexU256 = serde_json::from_str(r#""0x100""#).unwrap();
        assert_eq!(value.0, U256::from(256u64));
    }

    #[test]
    fn test_hex_u64_deserialize() {
        let value: HexU64 = serde_json::from_str(r#""0xf4240""#).unwrap();
        assert_eq!(value.0, 1_000_000);
    }

    #[test]
    fn test_hex_address_deserialize() {
        let addr: HexAddress =
            serde_json::from_str(r#""0x0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a""#).unwrap();
        assert_eq!(addr.0, Address::from_bytes([0x0A; 20]));
    }

    #[test]
    fn test_parse_u256_rejects_oversized() {
        assert!(parse_u256(&format!("0x{}", "ff".repeat(33))).is_err());
    }
}
