//! Contract address derivation

use crate::hash::keccak256;
use fugue_primitives::Address;
use rlp::RlpStream;

/// Derive the address of a contract created by `sender` at `nonce`:
/// the low 20 bytes of `keccak256(rlp([sender, nonce]))`.
pub fn create_address(sender: &Address, nonce: u64) -> Address {
    let mut stream = RlpStream::new_list(2);
    stream.append(sender);
    stream.append(&nonce);
    let hash = keccak256(&stream.out());
    Address::from_hash(&hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_address_known_vector() {
        // Deployment address of the first contract created by
        // 0x970e8128ab834e8eac17ab8e3812f010678cf791 at nonce 0.
        let sender = Address::from_hex("0x970e8128ab834e8eac17ab8e3812f010678cf791").unwrap();
        let addr = create_address(&sender, 0);
        assert_eq!(
            addr.to_hex(),
            "0x333c3310824b7c685133f2bedb2ca4b8b4df633d"
        );
    }

    #[test]
    fn test_create_address_nonce_changes_result() {
        let sender = Address::from_bytes([0x11; 20]);
        let a0 = create_address(&sender, 0);
        let a1 = create_address(&sender, 1);
        let a128 = create_address(&sender, 128);
        assert_ne!(a0, a1);
        assert_ne!(a1, a128);
    }

    #[test]
    fn test_create_address_sender_changes_result() {
        let a = create_address(&Address::from_bytes([0x11; 20]), 7);
        let b = create_address(&Address::from_bytes([0x22; 20]), 7);
        assert_ne!(a, b);
    }
}
