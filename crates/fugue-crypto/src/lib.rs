//! # fugue-crypto
//!
//! Hashing and contract-address derivation for the Fugue virtual machine.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod contract;
mod hash;

pub use contract::create_address;
pub use hash::{empty_code_hash, keccak256};
