//! Gas cost constants, fork gas tables, and dynamic cost functions

use crate::contract::Contract;
use crate::error::{EvmError, EvmResult};
use crate::evm::Evm;
use crate::instructions::{word_to_address, word_to_h256};
use crate::memory::Memory;
use crate::rules::Rules;
use crate::stack::Stack;
use crate::state::StateStore;
use fugue_primitives::U256;

/// Gas cost constants (Yellow Paper Appendix G, through Byzantium)
pub mod cost {
    /// Zero gas
    pub const ZERO: u64 = 0;
    /// Base gas
    pub const BASE: u64 = 2;
    /// Very low gas
    pub const VERYLOW: u64 = 3;
    /// Low gas
    pub const LOW: u64 = 5;
    /// Mid gas
    pub const MID: u64 = 8;
    /// High gas
    pub const HIGH: u64 = 10;

    /// JUMPDEST gas
    pub const JUMPDEST: u64 = 1;
    /// EXP base gas
    pub const EXP: u64 = 10;
    /// SHA3 base gas
    pub const SHA3: u64 = 30;
    /// SHA3 gas per 32-byte word of input
    pub const SHA3_WORD: u64 = 6;
    /// BLOCKHASH gas
    pub const BLOCKHASH: u64 = 20;

    /// SSTORE gas for a zero to non-zero transition
    pub const SSTORE_SET: u64 = 20000;
    /// SSTORE gas for every other transition
    pub const SSTORE_RESET: u64 = 5000;
    /// Refund for a non-zero to zero transition
    pub const SSTORE_REFUND: u64 = 15000;

    /// LOG base gas
    pub const LOG: u64 = 375;
    /// LOG gas per topic
    pub const LOG_TOPIC: u64 = 375;
    /// LOG gas per byte of data
    pub const LOG_DATA: u64 = 8;

    /// CREATE gas
    pub const CREATE: u64 = 32000;
    /// Gas per byte of deployed contract code
    pub const CREATE_DATA: u64 = 200;

    /// Extra gas when a call transfers value
    pub const CALL_VALUE: u64 = 9000;
    /// Stipend added to the callee's gas when value is transferred
    pub const CALL_STIPEND: u64 = 2300;
    /// Extra gas when a call forces a new account into existence
    pub const CALL_NEW_ACCOUNT: u64 = 25000;

    /// Refund for the first SELFDESTRUCT of an account
    pub const SUICIDE_REFUND: u64 = 24000;

    /// Memory gas per 32-byte word
    pub const MEMORY: u64 = 3;
    /// Divisor of the quadratic memory cost term
    pub const QUAD_COEFF_DIV: u64 = 512;
    /// Copy gas per 32-byte word
    pub const COPY: u64 = 3;

    /// Max call depth
    pub const MAX_CALL_DEPTH: usize = 1024;
    /// Max deployed code size (EIP-170)
    pub const MAX_CODE_SIZE: usize = 24576;
}

/// Per-fork gas schedule for the opcodes whose price changed across rule
/// sets. Selected once per VM from the active [`Rules`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasTable {
    /// EXTCODESIZE gas
    pub ext_code_size: u64,
    /// EXTCODECOPY base gas
    pub ext_code_copy: u64,
    /// BALANCE gas
    pub balance: u64,
    /// SLOAD gas
    pub sload: u64,
    /// Base gas of the CALL family
    pub calls: u64,
    /// SELFDESTRUCT gas
    pub suicide: u64,
    /// EXP gas per byte of exponent
    pub exp_byte: u64,
    /// Gas for creating the beneficiary account on SELFDESTRUCT.
    /// `Some` also marks the EIP-150 63/64 forwarding rule as active.
    pub create_by_suicide: Option<u64>,
}

impl GasTable {
    /// Schedule in effect from Frontier through Homestead
    pub fn homestead() -> Self {
        Self {
            ext_code_size: 20,
            ext_code_copy: 20,
            balance: 20,
            sload: 50,
            calls: 40,
            suicide: 0,
            exp_byte: 10,
            create_by_suicide: None,
        }
    }

    /// Schedule raised by EIP-150
    pub fn eip150() -> Self {
        Self {
            ext_code_size: 700,
            ext_code_copy: 700,
            balance: 400,
            sload: 200,
            calls: 700,
            suicide: 5000,
            exp_byte: 10,
            create_by_suicide: Some(cost::CALL_NEW_ACCOUNT),
        }
    }

    /// EIP-150 schedule with the EIP-160 exponent repricing
    pub fn eip158() -> Self {
        Self {
            exp_byte: 50,
            ..Self::eip150()
        }
    }

    /// Pick the schedule for a rule set
    pub fn for_rules(rules: &Rules) -> Self {
        if rules.is_eip158 {
            Self::eip158()
        } else if rules.is_eip150 {
            Self::eip150()
        } else {
            Self::homestead()
        }
    }
}

/// Round a byte size up to 32-byte words, saturating near u64::MAX
pub fn to_word_size(size: u64) -> u64 {
    if size > u64::MAX - 31 {
        return u64::MAX / 32 + 1;
    }
    (size + 31) / 32
}

/// Expansion fee for growing memory to `new_size` bytes:
/// `c(a) = 3a + a^2/512` over word counts, charged as a delta.
pub fn memory_gas_cost(mem: &Memory, new_size: u64) -> EvmResult<u64> {
    if new_size == 0 {
        return Ok(0);
    }
    // Past this size the square of the word count no longer fits in u64.
    if new_size > 0xffffffffe0 {
        return Err(EvmError::GasUintOverflow);
    }
    let new_words = to_word_size(new_size);
    if new_words * 32 <= mem.len() as u64 {
        return Ok(0);
    }
    let old_words = to_word_size(mem.len() as u64);
    let new_cost = cost::MEMORY * new_words + new_words * new_words / cost::QUAD_COEFF_DIV;
    let old_cost = cost::MEMORY * old_words + old_words * old_words / cost::QUAD_COEFF_DIV;
    Ok(new_cost - old_cost)
}

/// Gas forwarded to a sub-call: post-EIP-150 the caller keeps at least
/// 1/64 of what remains after the call's own cost, pre-EIP-150 exactly
/// the requested amount is forwarded.
pub fn call_gas(
    table: &GasTable,
    available_gas: u64,
    base: u64,
    requested: &U256,
) -> EvmResult<u64> {
    if table.create_by_suicide.is_some() {
        let available = available_gas.saturating_sub(base);
        let gas = available - available / 64;
        if requested.bits() > 64 || U256::from(gas) < *requested {
            return Ok(gas);
        }
    }
    if requested.bits() > 64 {
        return Err(EvmError::GasUintOverflow);
    }
    Ok(requested.low_u64())
}

fn safe_add(a: u64, b: u64) -> EvmResult<u64> {
    a.checked_add(b).ok_or(EvmError::GasUintOverflow)
}

fn safe_mul(a: u64, b: u64) -> EvmResult<u64> {
    a.checked_mul(b).ok_or(EvmError::GasUintOverflow)
}

// Dynamic cost functions wired into the jump table. Each runs after the
// entry's constant gas has been deducted and receives the word-aligned
// memory requirement computed from the entry's memory-size function.

pub(crate) fn gas_memory<S: StateStore>(
    _evm: &mut Evm<'_, S>,
    _contract: &Contract,
    _stack: &Stack,
    mem: &Memory,
    memory_size: u64,
) -> EvmResult<u64> {
    memory_gas_cost(mem, memory_size)
}

pub(crate) fn gas_sha3<S: StateStore>(
    _evm: &mut Evm<'_, S>,
    _contract: &Contract,
    stack: &Stack,
    mem: &Memory,
    memory_size: u64,
) -> EvmResult<u64> {
    let gas = memory_gas_cost(mem, memory_size)?;
    let words = to_word_size(stack.peek_at(1)?.low_u64());
    safe_add(gas, safe_mul(words, cost::SHA3_WORD)?)
}

pub(crate) fn gas_copy<S: StateStore>(
    _evm: &mut Evm<'_, S>,
    _contract: &Contract,
    stack: &Stack,
    mem: &Memory,
    memory_size: u64,
) -> EvmResult<u64> {
    let gas = memory_gas_cost(mem, memory_size)?;
    let words = to_word_size(stack.peek_at(2)?.low_u64());
    safe_add(gas, safe_mul(words, cost::COPY)?)
}

pub(crate) fn gas_ext_code_copy<S: StateStore>(
    _evm: &mut Evm<'_, S>,
    _contract: &Contract,
    stack: &Stack,
    mem: &Memory,
    memory_size: u64,
) -> EvmResult<u64> {
    let gas = memory_gas_cost(mem, memory_size)?;
    let words = to_word_size(stack.peek_at(3)?.low_u64());
    safe_add(gas, safe_mul(words, cost::COPY)?)
}

pub(crate) fn gas_exp<S: StateStore>(
    evm: &mut Evm<'_, S>,
    _contract: &Contract,
    stack: &Stack,
    _mem: &Memory,
    _memory_size: u64,
) -> EvmResult<u64> {
    let byte_size = (stack.peek_at(1)?.bits() as u64 + 7) / 8;
    safe_mul(byte_size, evm.gas_table.exp_byte)
}

pub(crate) fn gas_log<S: StateStore>(
    _evm: &mut Evm<'_, S>,
    _contract: &Contract,
    stack: &Stack,
    mem: &Memory,
    memory_size: u64,
) -> EvmResult<u64> {
    let gas = memory_gas_cost(mem, memory_size)?;
    let size = stack.peek_at(1)?;
    if size.bits() > 64 {
        return Err(EvmError::GasUintOverflow);
    }
    safe_add(gas, safe_mul(size.low_u64(), cost::LOG_DATA)?)
}

pub(crate) fn gas_sstore<S: StateStore>(
    evm: &mut Evm<'_, S>,
    contract: &Contract,
    stack: &Stack,
    _mem: &Memory,
    _memory_size: u64,
) -> EvmResult<u64> {
    let key = word_to_h256(stack.peek_at(0)?);
    let new_value = stack.peek_at(1)?;
    let current = evm.state.storage(contract.address, key);
    if current.is_zero() && !new_value.is_zero() {
        Ok(cost::SSTORE_SET)
    } else if !current.is_zero() && new_value.is_zero() {
        evm.state.add_refund(cost::SSTORE_REFUND);
        Ok(cost::SSTORE_RESET)
    } else {
        Ok(cost::SSTORE_RESET)
    }
}

pub(crate) fn gas_call<S: StateStore>(
    evm: &mut Evm<'_, S>,
    contract: &Contract,
    stack: &Stack,
    mem: &Memory,
    memory_size: u64,
) -> EvmResult<u64> {
    let mut gas = 0u64;
    let address = word_to_address(stack.peek_at(1)?);
    let transfers_value = !stack.peek_at(2)?.is_zero();
    if evm.rules.is_eip158 {
        if transfers_value && evm.state.is_empty(address) {
            gas += cost::CALL_NEW_ACCOUNT;
        }
    } else if !evm.state.exists(address) {
        gas += cost::CALL_NEW_ACCOUNT;
    }
    if transfers_value {
        gas += cost::CALL_VALUE;
    }
    gas = safe_add(gas, memory_gas_cost(mem, memory_size)?)?;
    evm.call_gas_temp = call_gas(&evm.gas_table, contract.gas, gas, stack.peek_at(0)?)?;
    safe_add(gas, evm.call_gas_temp)
}

pub(crate) fn gas_call_code<S: StateStore>(
    evm: &mut Evm<'_, S>,
    contract: &Contract,
    stack: &Stack,
    mem: &Memory,
    memory_size: u64,
) -> EvmResult<u64> {
    let mut gas = 0u64;
    if !stack.peek_at(2)?.is_zero() {
        gas += cost::CALL_VALUE;
    }
    gas = safe_add(gas, memory_gas_cost(mem, memory_size)?)?;
    evm.call_gas_temp = call_gas(&evm.gas_table, contract.gas, gas, stack.peek_at(0)?)?;
    safe_add(gas, evm.call_gas_temp)
}

pub(crate) fn gas_delegate_or_static_call<S: StateStore>(
    evm: &mut Evm<'_, S>,
    contract: &Contract,
    stack: &Stack,
    mem: &Memory,
    memory_size: u64,
) -> EvmResult<u64> {
    let gas = memory_gas_cost(mem, memory_size)?;
    evm.call_gas_temp = call_gas(&evm.gas_table, contract.gas, gas, stack.peek_at(0)?)?;
    safe_add(gas, evm.call_gas_temp)
}

pub(crate) fn gas_suicide<S: StateStore>(
    evm: &mut Evm<'_, S>,
    contract: &Contract,
    stack: &Stack,
    _mem: &Memory,
    _memory_size: u64,
) -> EvmResult<u64> {
    let mut gas = 0u64;
    if evm.rules.is_eip150 {
        gas = evm.gas_table.suicide;
        let beneficiary = word_to_address(stack.peek_at(0)?);
        let new_account = if evm.rules.is_eip158 {
            evm.state.is_empty(beneficiary) && !evm.state.balance(contract.address).is_zero()
        } else {
            !evm.state.exists(beneficiary)
        };
        if new_account {
            if let Some(extra) = evm.gas_table.create_by_suicide {
                gas += extra;
            }
        }
    }
    if !evm.state.has_suicided(contract.address) {
        evm.state.add_refund(cost::SUICIDE_REFUND);
    }
    Ok(gas)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_word_size() {
        assert_eq!(to_word_size(0), 0);
        assert_eq!(to_word_size(1), 1);
        assert_eq!(to_word_size(32), 1);
        assert_eq!(to_word_size(33), 2);
        assert_eq!(to_word_size(u64::MAX), u64::MAX / 32 + 1);
    }

    #[test]
    fn test_memory_gas_cost_quadratic() {
        let mut mem = Memory::new();
        // 1 word: 3*1 + 1/512 = 3
        assert_eq!(memory_gas_cost(&mem, 32).unwrap(), 3);
        // 2 words: 3*2 + 4/512 = 6
        assert_eq!(memory_gas_cost(&mem, 64).unwrap(), 6);
        // 32 words: 3*32 + 1024/512 = 98
        assert_eq!(memory_gas_cost(&mem, 1024).unwrap(), 98);
        // 512 words: 3*512 + 512 = 2048
        assert_eq!(memory_gas_cost(&mem, 16384).unwrap(), 2048);

        // Only the delta is charged once memory has grown.
        mem.resize(32);
        assert_eq!(memory_gas_cost(&mem, 32).unwrap(), 0);
        assert_eq!(memory_gas_cost(&mem, 64).unwrap(), 3);
    }

    #[test]
    fn test_memory_gas_cost_overflow() {
        let mem = Memory::new();
        assert_eq!(
            memory_gas_cost(&mem, u64::MAX),
            Err(EvmError::GasUintOverflow)
        );
    }

    #[test]
    fn test_call_gas_pre_eip150_forwards_requested() {
        let table = GasTable::homestead();
        let forwarded = call_gas(&table, 1000, 100, &U256::from(5000u64)).unwrap();
        assert_eq!(forwarded, 5000);
    }

    #[test]
    fn test_call_gas_eip150_caps_at_63_64ths() {
        let table = GasTable::eip150();
        // available after base: 6400; cap = 6400 - 100 = 6300
        let forwarded = call_gas(&table, 6500, 100, &U256::MAX).unwrap();
        assert_eq!(forwarded, 6400 - 6400 / 64);
        // a small request below the cap passes through untouched
        let forwarded = call_gas(&table, 6500, 100, &U256::from(1000u64)).unwrap();
        assert_eq!(forwarded, 1000);
    }

    #[test]
    fn test_call_gas_pre_eip150_overflow_is_error() {
        let table = GasTable::homestead();
        assert_eq!(
            call_gas(&table, 1000, 0, &U256::MAX),
            Err(EvmError::GasUintOverflow)
        );
    }

    #[test]
    fn test_gas_table_variants() {
        let homestead = GasTable::homestead();
        assert_eq!(homestead.sload, 50);
        assert_eq!(homestead.calls, 40);
        assert_eq!(homestead.create_by_suicide, None);

        let eip150 = GasTable::eip150();
        assert_eq!(eip150.sload, 200);
        assert_eq!(eip150.calls, 700);
        assert_eq!(eip150.balance, 400);
        assert_eq!(eip150.exp_byte, 10);
        assert_eq!(eip150.create_by_suicide, Some(25000));

        assert_eq!(GasTable::eip158().exp_byte, 50);
    }

    #[test]
    fn test_gas_table_for_rules() {
        let mut rules = Rules::default();
        assert_eq!(GasTable::for_rules(&rules), GasTable::homestead());
        rules.is_eip150 = true;
        assert_eq!(GasTable::for_rules(&rules), GasTable::eip150());
        rules.is_eip158 = true;
        assert_eq!(GasTable::for_rules(&rules), GasTable::eip158());
    }
}
