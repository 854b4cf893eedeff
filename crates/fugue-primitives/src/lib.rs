//! # fugue-primitives
//!
//! Primitive types for the Fugue virtual machine.
//!
//! This crate provides the fundamental data types shared by the VM and its
//! hosts: the 20-byte [`Address`], the 32-byte [`H256`] digest, and the
//! 256-bit machine word [`U256`].

#![warn(missing_docs)]
#![warn(clippy::all)]

mod address;
mod hash;

pub use address::{Address, AddressError};
pub use hash::{Hash, HashError, H256};

// Re-export primitive-types for the 256-bit machine word.
pub use primitive_types::{U256, U512};

/// Block height type
pub type BlockHeight = u64;

/// Account nonce type
pub type Nonce = u64;

/// Gas type
pub type Gas = u64;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_u256_basic() {
        let a = U256::from(100u64);
        let b = U256::from(200u64);
        assert_eq!(a + b, U256::from(300u64));
    }

    #[test]
    fn test_u256_wrapping() {
        let (sum, overflow) = U256::MAX.overflowing_add(U256::one());
        assert!(overflow);
        assert!(sum.is_zero());
    }
}
