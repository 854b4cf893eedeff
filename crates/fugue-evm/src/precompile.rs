//! Precompiled contract dispatch

use crate::contract::Contract;
use crate::error::{EvmError, EvmResult};
use crate::rules::Rules;
use fugue_primitives::Address;
use std::collections::HashMap;

/// A native contract registered at a reserved address. Calls to such an
/// address short-circuit bytecode execution entirely.
pub trait Precompile {
    /// Gas the contract charges for `input`, deducted before running
    fn required_gas(&self, input: &[u8]) -> u64;
    /// Execute the contract
    fn run(&self, input: &[u8]) -> EvmResult<Vec<u8>>;
}

/// The identity contract at address 0x04: returns its input unchanged.
pub struct Identity;

impl Precompile for Identity {
    fn required_gas(&self, input: &[u8]) -> u64 {
        15 + 3 * ((input.len() as u64 + 31) / 32)
    }

    fn run(&self, input: &[u8]) -> EvmResult<Vec<u8>> {
        Ok(input.to_vec())
    }
}

/// Native contracts keyed by address. The VM builds the set matching the
/// active rules; hosts register additional contracts through
/// [`PrecompileRegistry::register`].
#[derive(Default)]
pub struct PrecompileRegistry {
    contracts: HashMap<Address, Box<dyn Precompile>>,
}

/// Reserved address `n` (0x0000...00nn)
pub fn precompile_address(n: u8) -> Address {
    let mut bytes = [0u8; 20];
    bytes[19] = n;
    Address::from_bytes(bytes)
}

impl PrecompileRegistry {
    /// Registry with no contracts
    pub fn empty() -> Self {
        Self::default()
    }

    /// The set active from Frontier through Homestead and EIP-150/158
    pub fn homestead() -> Self {
        let mut registry = Self::empty();
        registry.register(precompile_address(4), Box::new(Identity));
        registry
    }

    /// The set active from Byzantium. Addresses 0x05-0x08 are reserved
    /// for host-registered contracts.
    pub fn byzantium() -> Self {
        Self::homestead()
    }

    /// Pick the set for a rule set
    pub fn for_rules(rules: &Rules) -> Self {
        if rules.is_byzantium {
            Self::byzantium()
        } else {
            Self::homestead()
        }
    }

    /// Register a contract at an address, replacing any existing one
    pub fn register(&mut self, address: Address, contract: Box<dyn Precompile>) {
        self.contracts.insert(address, contract);
    }

    /// Look up the contract at an address
    pub fn get(&self, address: &Address) -> Option<&dyn Precompile> {
        self.contracts.get(address).map(|c| c.as_ref())
    }

    /// Whether a contract is registered at the address
    pub fn contains(&self, address: &Address) -> bool {
        self.contracts.contains_key(address)
    }
}

/// Charge the contract's gas against the frame, then run it. Failing the
/// gas charge consumes nothing beyond what the frame already paid.
pub fn run_precompile(
    precompile: &dyn Precompile,
    input: &[u8],
    contract: &mut Contract,
) -> EvmResult<Vec<u8>> {
    let gas = precompile.required_gas(input);
    if !contract.use_gas(gas) {
        return Err(EvmError::OutOfGas);
    }
    precompile.run(input)
}
