//! Call frames

use fugue_primitives::{Address, H256, U256};

/// One invocation of bytecode: its identities, code, input, value and gas.
///
/// `address` is the target of storage writes; `code_address` is where the
/// code came from, which differs for CALLCODE and DELEGATECALL frames and
/// routes precompile dispatch.
#[derive(Debug, Clone)]
pub struct Contract {
    /// Address the CALLER opcode reports
    pub caller_address: Address,
    /// Account executing; target of SLOAD/SSTORE/LOG/SELFDESTRUCT
    pub address: Address,
    /// Account the code was loaded from
    pub code_address: Option<Address>,
    /// Code being executed
    pub code: Vec<u8>,
    /// Keccak-256 of `code`; zero for code not yet committed to state
    pub code_hash: H256,
    /// Call input data
    pub input: Vec<u8>,
    /// Value transferred with the call
    pub value: U256,
    /// Gas remaining in the frame
    pub gas: u64,
}

impl Contract {
    /// Create a frame with no code attached yet
    pub fn new(caller: Address, address: Address, value: U256, gas: u64) -> Self {
        Self {
            caller_address: caller,
            address,
            code_address: None,
            code: Vec::new(),
            code_hash: H256::ZERO,
            input: Vec::new(),
            value,
            gas,
        }
    }

    /// Turn this frame into a delegate frame: caller identity and value
    /// are inherited from the parent frame.
    pub fn as_delegate(mut self, parent: &Contract) -> Self {
        self.caller_address = parent.caller_address;
        self.value = parent.value;
        self
    }

    /// Attach the code to execute and remember where it came from
    pub fn set_call_code(&mut self, address: Address, hash: H256, code: Vec<u8>) {
        self.code_address = Some(address);
        self.code_hash = hash;
        self.code = code;
    }

    /// Opcode byte at `n`; STOP past the end of code
    pub fn get_op(&self, n: u64) -> u8 {
        self.code.get(n as usize).copied().unwrap_or(0)
    }

    /// Deduct gas from the frame. Returns false (deducting nothing) when
    /// not enough remains.
    pub fn use_gas(&mut self, gas: u64) -> bool {
        if self.gas < gas {
            return false;
        }
        self.gas -= gas;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_op_implicit_stop() {
        let mut contract = Contract::new(Address::ZERO, Address::ZERO, U256::zero(), 0);
        contract.code = vec![0x60, 0x01];
        assert_eq!(contract.get_op(0), 0x60);
        assert_eq!(contract.get_op(1), 0x01);
        assert_eq!(contract.get_op(2), 0x00);
        assert_eq!(contract.get_op(u64::MAX), 0x00);
    }

    #[test]
    fn test_use_gas() {
        let mut contract = Contract::new(Address::ZERO, Address::ZERO, U256::zero(), 100);
        assert!(contract.use_gas(40));
        assert_eq!(contract.gas, 60);
        assert!(!contract.use_gas(61));
        assert_eq!(contract.gas, 60);
        assert!(contract.use_gas(60));
        assert_eq!(contract.gas, 0);
    }

    #[test]
    fn test_as_delegate_inherits_caller_and_value() {
        let grandparent = Address::from_bytes([0x01; 20]);
        let parent_self = Address::from_bytes([0x02; 20]);
        let mut parent = Contract::new(grandparent, parent_self, U256::from(77u64), 1000);
        parent.caller_address = grandparent;

        let frame = Contract::new(parent_self, parent_self, U256::zero(), 500).as_delegate(&parent);
        assert_eq!(frame.caller_address, grandparent);
        assert_eq!(frame.value, U256::from(77u64));
        assert_eq!(frame.address, parent_self);
    }
}
