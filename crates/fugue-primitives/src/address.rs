//! 20-byte account address

use crate::hash::H256;
use std::fmt;
use thiserror::Error;

/// Address parsing error
#[derive(Debug, Error)]
pub enum AddressError {
    /// Invalid hex string
    #[error("invalid hex string: {0}")]
    InvalidHex(String),
    /// Invalid length
    #[error("invalid address length: expected 20 bytes, got {0}")]
    InvalidLength(usize),
}

/// 20-byte account address
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address([u8; 20]);

impl Address {
    /// Size of an address in bytes
    pub const LEN: usize = 20;

    /// Zero address (0x0000...0000)
    pub const ZERO: Address = Address([0u8; 20]);

    /// Create an address from raw bytes
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Address(bytes)
    }

    /// Create an address from a slice
    pub fn from_slice(slice: &[u8]) -> Result<Self, AddressError> {
        if slice.len() != Self::LEN {
            return Err(AddressError::InvalidLength(slice.len()));
        }
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(slice);
        Ok(Address(bytes))
    }

    /// Derive an address from the low 20 bytes of a 32-byte hash
    pub fn from_hash(hash: &H256) -> Self {
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&hash.as_bytes()[12..]);
        Address(bytes)
    }

    /// Parse an address from a hex string (with or without 0x prefix)
    pub fn from_hex(s: &str) -> Result<Self, AddressError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s).map_err(|e| AddressError::InvalidHex(e.to_string()))?;
        Self::from_slice(&bytes)
    }

    /// Get the underlying bytes
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Check whether this is the zero address
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    /// Convert to a hex string with 0x prefix
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl From<[u8; 20]> for Address {
    fn from(bytes: [u8; 20]) -> Self {
        Address(bytes)
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

// RLP implementation (behind feature flag)
#[cfg(feature = "rlp")]
mod rlp_impl {
    use super::*;
    use rlp::{Decodable, DecoderError, Encodable, Rlp, RlpStream};

    impl Encodable for Address {
        fn rlp_append(&self, s: &mut RlpStream) {
            s.encoder().encode_value(&self.0);
        }
    }

    impl Decodable for Address {
        fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
            let bytes: Vec<u8> = rlp.as_val()?;
            Address::from_slice(&bytes).map_err(|_| DecoderError::RlpInvalidLength)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_from_hex() {
        let addr = Address::from_hex("0x742d35Cc6634C0532925a3b844Bc9e7595f0aB3d").unwrap();
        assert!(!addr.is_zero());

        let bare = Address::from_hex("742d35Cc6634C0532925a3b844Bc9e7595f0aB3d").unwrap();
        assert_eq!(addr, bare);
    }

    #[test]
    fn test_zero_address() {
        let zero = Address::ZERO;
        assert!(zero.is_zero());
        assert_eq!(zero.to_hex(), "0x0000000000000000000000000000000000000000");
        assert_eq!(Address::default(), zero);
    }

    #[test]
    fn test_address_from_hex_invalid() {
        assert!(Address::from_hex("0xzz").is_err());
        assert!(matches!(
            Address::from_hex("0x1234"),
            Err(AddressError::InvalidLength(2))
        ));
        assert!(matches!(
            Address::from_hex(""),
            Err(AddressError::InvalidLength(0))
        ));
    }

    #[test]
    fn test_address_from_slice_length() {
        assert!(Address::from_slice(&[0u8; 19]).is_err());
        assert!(Address::from_slice(&[0u8; 21]).is_err());
        let addr = Address::from_slice(&[0xab; 20]).unwrap();
        assert_eq!(addr.as_bytes(), &[0xab; 20]);
    }

    #[test]
    fn test_address_from_hash() {
        let mut bytes = [0u8; 32];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = i as u8;
        }
        let hash = H256::from_bytes(bytes);
        let addr = Address::from_hash(&hash);
        assert_eq!(addr.as_bytes(), &bytes[12..]);
    }

    #[test]
    fn test_address_hex_roundtrip() {
        let original = "0x742d35cc6634c0532925a3b844bc9e7595f0ab3d";
        let addr = Address::from_hex(original).unwrap();
        assert_eq!(addr.to_hex(), original);
    }

    #[test]
    fn test_address_display_and_debug() {
        let addr = Address::from_hex("0x742d35Cc6634C0532925a3b844Bc9e7595f0aB3d").unwrap();
        assert_eq!(
            format!("{}", addr),
            "0x742d35cc6634c0532925a3b844bc9e7595f0ab3d"
        );
        assert!(format!("{:?}", addr).starts_with("Address(0x"));
    }

    #[test]
    fn test_address_hash_consistency() {
        use std::collections::HashSet;

        let addr1 = Address::from_bytes([0x11; 20]);
        let addr2 = Address::from_bytes([0x11; 20]);

        let mut set = HashSet::new();
        set.insert(addr1);
        assert!(set.contains(&addr2));
    }
}
