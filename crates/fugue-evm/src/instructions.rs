//! Opcode handlers
//!
//! Every handler shares one signature: it may advance `pc` itself (jumps
//! and pushes), mutate the frame, stack, memory and state, and return an
//! optional byte payload (RETURN and the call family). Stack depth has
//! already been validated against the jump table entry and gas has been
//! charged before a handler runs.

use crate::contract::Contract;
use crate::error::{EvmError, EvmResult, Log};
use crate::evm::Evm;
use crate::gas::cost;
use crate::memory::Memory;
use crate::opcode::Opcode;
use crate::stack::Stack;
use crate::state::StateStore;
use fugue_crypto::keccak256;
use fugue_primitives::{Address, H256, U256, U512};

// ---------------------------------------------------------------------------
// Word helpers

pub(crate) fn address_to_word(address: &Address) -> U256 {
    let mut bytes = [0u8; 32];
    bytes[12..].copy_from_slice(address.as_bytes());
    U256::from_big_endian(&bytes)
}

pub(crate) fn word_to_address(word: &U256) -> Address {
    let mut bytes = [0u8; 32];
    word.to_big_endian(&mut bytes);
    let mut addr = [0u8; 20];
    addr.copy_from_slice(&bytes[12..]);
    Address::from_bytes(addr)
}

pub(crate) fn word_to_h256(word: &U256) -> H256 {
    H256::from_word(word)
}

pub(crate) fn is_negative(x: &U256) -> bool {
    x.bit(255)
}

pub(crate) fn twos_complement(x: U256) -> U256 {
    (!x).overflowing_add(U256::one()).0
}

fn u512_low(value: U512) -> U256 {
    let mut bytes = [0u8; 64];
    value.to_big_endian(&mut bytes);
    U256::from_big_endian(&bytes[32..])
}

/// Truncated signed division: sign of the quotient follows the signs of
/// the operands, division by zero yields zero.
pub(crate) fn sdiv(a: U256, b: U256) -> U256 {
    if b.is_zero() {
        return U256::zero();
    }
    let a_neg = is_negative(&a);
    let b_neg = is_negative(&b);
    let a_abs = if a_neg { twos_complement(a) } else { a };
    let b_abs = if b_neg { twos_complement(b) } else { b };
    let quotient = a_abs / b_abs;
    if a_neg != b_neg && !quotient.is_zero() {
        twos_complement(quotient)
    } else {
        quotient
    }
}

/// Signed remainder: sign follows the numerator, modulo zero yields zero.
pub(crate) fn smod(a: U256, b: U256) -> U256 {
    if b.is_zero() {
        return U256::zero();
    }
    let a_neg = is_negative(&a);
    let a_abs = if a_neg { twos_complement(a) } else { a };
    let b_abs = if is_negative(&b) { twos_complement(b) } else { b };
    let rem = a_abs % b_abs;
    if a_neg && !rem.is_zero() {
        twos_complement(rem)
    } else {
        rem
    }
}

/// Signed less-than over the two's-complement interpretation
pub(crate) fn slt(a: &U256, b: &U256) -> bool {
    match (is_negative(a), is_negative(b)) {
        (true, false) => true,
        (false, true) => false,
        _ => a < b,
    }
}

/// Copy `size` bytes out of `data` starting at `offset`, zero-padding
/// past the end. Callers have bounded `size` through gas charging.
pub(crate) fn get_data(data: &[u8], offset: &U256, size: &U256) -> Vec<u8> {
    let size = size.low_u64() as usize;
    if size == 0 {
        return Vec::new();
    }
    let start = if *offset > U256::from(data.len()) {
        data.len()
    } else {
        offset.low_u64() as usize
    };
    let end = (start + size).min(data.len());
    let mut out = vec![0u8; size];
    out[..end - start].copy_from_slice(&data[start..end]);
    out
}

// ---------------------------------------------------------------------------
// Arithmetic

pub(crate) fn op_add<S: StateStore>(
    _pc: &mut u64,
    _evm: &mut Evm<'_, S>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
) -> EvmResult<Option<Vec<u8>>> {
    let x = stack.pop()?;
    let y = stack.pop()?;
    stack.push(x.overflowing_add(y).0)?;
    Ok(None)
}

pub(crate) fn op_sub<S: StateStore>(
    _pc: &mut u64,
    _evm: &mut Evm<'_, S>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
) -> EvmResult<Option<Vec<u8>>> {
    let x = stack.pop()?;
    let y = stack.pop()?;
    stack.push(x.overflowing_sub(y).0)?;
    Ok(None)
}

pub(crate) fn op_mul<S: StateStore>(
    _pc: &mut u64,
    _evm: &mut Evm<'_, S>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
) -> EvmResult<Option<Vec<u8>>> {
    let x = stack.pop()?;
    let y = stack.pop()?;
    stack.push(x.overflowing_mul(y).0)?;
    Ok(None)
}

pub(crate) fn op_div<S: StateStore>(
    _pc: &mut u64,
    _evm: &mut Evm<'_, S>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
) -> EvmResult<Option<Vec<u8>>> {
    let x = stack.pop()?;
    let y = stack.pop()?;
    let quotient = if y.is_zero() { U256::zero() } else { x / y };
    stack.push(quotient)?;
    Ok(None)
}

pub(crate) fn op_sdiv<S: StateStore>(
    _pc: &mut u64,
    _evm: &mut Evm<'_, S>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
) -> EvmResult<Option<Vec<u8>>> {
    let x = stack.pop()?;
    let y = stack.pop()?;
    stack.push(sdiv(x, y))?;
    Ok(None)
}

pub(crate) fn op_mod<S: StateStore>(
    _pc: &mut u64,
    _evm: &mut Evm<'_, S>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
) -> EvmResult<Option<Vec<u8>>> {
    let x = stack.pop()?;
    let y = stack.pop()?;
    let rem = if y.is_zero() { U256::zero() } else { x % y };
    stack.push(rem)?;
    Ok(None)
}

pub(crate) fn op_smod<S: StateStore>(
    _pc: &mut u64,
    _evm: &mut Evm<'_, S>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
) -> EvmResult<Option<Vec<u8>>> {
    let x = stack.pop()?;
    let y = stack.pop()?;
    stack.push(smod(x, y))?;
    Ok(None)
}

pub(crate) fn op_addmod<S: StateStore>(
    _pc: &mut u64,
    _evm: &mut Evm<'_, S>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
) -> EvmResult<Option<Vec<u8>>> {
    let x = stack.pop()?;
    let y = stack.pop()?;
    let z = stack.pop()?;
    let result = if z.is_zero() {
        U256::zero()
    } else {
        u512_low((U512::from(x) + U512::from(y)) % U512::from(z))
    };
    stack.push(result)?;
    Ok(None)
}

pub(crate) fn op_mulmod<S: StateStore>(
    _pc: &mut u64,
    _evm: &mut Evm<'_, S>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
) -> EvmResult<Option<Vec<u8>>> {
    let x = stack.pop()?;
    let y = stack.pop()?;
    let z = stack.pop()?;
    let result = if z.is_zero() {
        U256::zero()
    } else {
        u512_low(x.full_mul(y) % U512::from(z))
    };
    stack.push(result)?;
    Ok(None)
}

pub(crate) fn op_exp<S: StateStore>(
    _pc: &mut u64,
    _evm: &mut Evm<'_, S>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
) -> EvmResult<Option<Vec<u8>>> {
    let base = stack.pop()?;
    let exponent = stack.pop()?;
    stack.push(base.overflowing_pow(exponent).0)?;
    Ok(None)
}

pub(crate) fn op_signextend<S: StateStore>(
    _pc: &mut u64,
    _evm: &mut Evm<'_, S>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
) -> EvmResult<Option<Vec<u8>>> {
    let back = stack.pop()?;
    if back < U256::from(31u64) {
        let bit = back.low_u64() as usize * 8 + 7;
        let num = stack.pop()?;
        let mask = (U256::one() << bit) - U256::one();
        let extended = if num.bit(bit) { num | !mask } else { num & mask };
        stack.push(extended)?;
    }
    Ok(None)
}

// ---------------------------------------------------------------------------
// Comparison and bitwise logic

pub(crate) fn op_lt<S: StateStore>(
    _pc: &mut u64,
    _evm: &mut Evm<'_, S>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
) -> EvmResult<Option<Vec<u8>>> {
    let x = stack.pop()?;
    let y = stack.pop()?;
    stack.push(if x < y { U256::one() } else { U256::zero() })?;
    Ok(None)
}

pub(crate) fn op_gt<S: StateStore>(
    _pc: &mut u64,
    _evm: &mut Evm<'_, S>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
) -> EvmResult<Option<Vec<u8>>> {
    let x = stack.pop()?;
    let y = stack.pop()?;
    stack.push(if x > y { U256::one() } else { U256::zero() })?;
    Ok(None)
}

pub(crate) fn op_slt<S: StateStore>(
    _pc: &mut u64,
    _evm: &mut Evm<'_, S>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
) -> EvmResult<Option<Vec<u8>>> {
    let x = stack.pop()?;
    let y = stack.pop()?;
    stack.push(if slt(&x, &y) { U256::one() } else { U256::zero() })?;
    Ok(None)
}

pub(crate) fn op_sgt<S: StateStore>(
    _pc: &mut u64,
    _evm: &mut Evm<'_, S>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
) -> EvmResult<Option<Vec<u8>>> {
    let x = stack.pop()?;
    let y = stack.pop()?;
    stack.push(if slt(&y, &x) { U256::one() } else { U256::zero() })?;
    Ok(None)
}

pub(crate) fn op_eq<S: StateStore>(
    _pc: &mut u64,
    _evm: &mut Evm<'_, S>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
) -> EvmResult<Option<Vec<u8>>> {
    let x = stack.pop()?;
    let y = stack.pop()?;
    stack.push(if x == y { U256::one() } else { U256::zero() })?;
    Ok(None)
}

pub(crate) fn op_iszero<S: StateStore>(
    _pc: &mut u64,
    _evm: &mut Evm<'_, S>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
) -> EvmResult<Option<Vec<u8>>> {
    let x = stack.pop()?;
    stack.push(if x.is_zero() { U256::one() } else { U256::zero() })?;
    Ok(None)
}

pub(crate) fn op_and<S: StateStore>(
    _pc: &mut u64,
    _evm: &mut Evm<'_, S>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
) -> EvmResult<Option<Vec<u8>>> {
    let x = stack.pop()?;
    let y = stack.pop()?;
    stack.push(x & y)?;
    Ok(None)
}

pub(crate) fn op_or<S: StateStore>(
    _pc: &mut u64,
    _evm: &mut Evm<'_, S>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
) -> EvmResult<Option<Vec<u8>>> {
    let x = stack.pop()?;
    let y = stack.pop()?;
    stack.push(x | y)?;
    Ok(None)
}

pub(crate) fn op_xor<S: StateStore>(
    _pc: &mut u64,
    _evm: &mut Evm<'_, S>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
) -> EvmResult<Option<Vec<u8>>> {
    let x = stack.pop()?;
    let y = stack.pop()?;
    stack.push(x ^ y)?;
    Ok(None)
}

pub(crate) fn op_not<S: StateStore>(
    _pc: &mut u64,
    _evm: &mut Evm<'_, S>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
) -> EvmResult<Option<Vec<u8>>> {
    let x = stack.pop()?;
    stack.push(!x)?;
    Ok(None)
}

pub(crate) fn op_byte<S: StateStore>(
    _pc: &mut u64,
    _evm: &mut Evm<'_, S>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
) -> EvmResult<Option<Vec<u8>>> {
    let th = stack.pop()?;
    let val = stack.pop()?;
    let byte = if th < U256::from(32u64) {
        // big-endian byte i is little-endian byte 31-i
        U256::from(val.byte(31 - th.low_u64() as usize))
    } else {
        U256::zero()
    };
    stack.push(byte)?;
    Ok(None)
}

// ---------------------------------------------------------------------------
// Hashing

pub(crate) fn op_sha3<S: StateStore>(
    _pc: &mut u64,
    evm: &mut Evm<'_, S>,
    _contract: &mut Contract,
    memory: &mut Memory,
    stack: &mut Stack,
) -> EvmResult<Option<Vec<u8>>> {
    let offset = stack.pop()?;
    let size = stack.pop()?;
    let data = memory.get_ptr(offset.low_u64(), size.low_u64());
    let hash = keccak256(data);
    if evm.config.enable_preimage_recording {
        let preimage = data.to_vec();
        evm.state.add_preimage(hash, preimage);
    }
    stack.push(hash.to_word())?;
    Ok(None)
}

// ---------------------------------------------------------------------------
// Environment

pub(crate) fn op_address<S: StateStore>(
    _pc: &mut u64,
    _evm: &mut Evm<'_, S>,
    contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
) -> EvmResult<Option<Vec<u8>>> {
    stack.push(address_to_word(&contract.address))?;
    Ok(None)
}

pub(crate) fn op_balance<S: StateStore>(
    _pc: &mut u64,
    evm: &mut Evm<'_, S>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
) -> EvmResult<Option<Vec<u8>>> {
    let address = word_to_address(&stack.pop()?);
    stack.push(evm.state.balance(address))?;
    Ok(None)
}

pub(crate) fn op_origin<S: StateStore>(
    _pc: &mut u64,
    evm: &mut Evm<'_, S>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
) -> EvmResult<Option<Vec<u8>>> {
    let origin = evm.context.origin;
    stack.push(address_to_word(&origin))?;
    Ok(None)
}

pub(crate) fn op_caller<S: StateStore>(
    _pc: &mut u64,
    _evm: &mut Evm<'_, S>,
    contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
) -> EvmResult<Option<Vec<u8>>> {
    stack.push(address_to_word(&contract.caller_address))?;
    Ok(None)
}

pub(crate) fn op_callvalue<S: StateStore>(
    _pc: &mut u64,
    _evm: &mut Evm<'_, S>,
    contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
) -> EvmResult<Option<Vec<u8>>> {
    stack.push(contract.value)?;
    Ok(None)
}

pub(crate) fn op_calldataload<S: StateStore>(
    _pc: &mut u64,
    _evm: &mut Evm<'_, S>,
    contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
) -> EvmResult<Option<Vec<u8>>> {
    let offset = stack.pop()?;
    let word = get_data(&contract.input, &offset, &U256::from(32u64));
    stack.push(U256::from_big_endian(&word))?;
    Ok(None)
}

pub(crate) fn op_calldatasize<S: StateStore>(
    _pc: &mut u64,
    _evm: &mut Evm<'_, S>,
    contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
) -> EvmResult<Option<Vec<u8>>> {
    stack.push(U256::from(contract.input.len()))?;
    Ok(None)
}

pub(crate) fn op_calldatacopy<S: StateStore>(
    _pc: &mut u64,
    _evm: &mut Evm<'_, S>,
    contract: &mut Contract,
    memory: &mut Memory,
    stack: &mut Stack,
) -> EvmResult<Option<Vec<u8>>> {
    let mem_offset = stack.pop()?;
    let data_offset = stack.pop()?;
    let length = stack.pop()?;
    let data = get_data(&contract.input, &data_offset, &length);
    memory.set(mem_offset.low_u64(), length.low_u64(), &data);
    Ok(None)
}

pub(crate) fn op_codesize<S: StateStore>(
    _pc: &mut u64,
    _evm: &mut Evm<'_, S>,
    contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
) -> EvmResult<Option<Vec<u8>>> {
    stack.push(U256::from(contract.code.len()))?;
    Ok(None)
}

pub(crate) fn op_codecopy<S: StateStore>(
    _pc: &mut u64,
    _evm: &mut Evm<'_, S>,
    contract: &mut Contract,
    memory: &mut Memory,
    stack: &mut Stack,
) -> EvmResult<Option<Vec<u8>>> {
    let mem_offset = stack.pop()?;
    let code_offset = stack.pop()?;
    let length = stack.pop()?;
    let data = get_data(&contract.code, &code_offset, &length);
    memory.set(mem_offset.low_u64(), length.low_u64(), &data);
    Ok(None)
}

pub(crate) fn op_gasprice<S: StateStore>(
    _pc: &mut u64,
    evm: &mut Evm<'_, S>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
) -> EvmResult<Option<Vec<u8>>> {
    let gas_price = evm.context.gas_price;
    stack.push(gas_price)?;
    Ok(None)
}

pub(crate) fn op_extcodesize<S: StateStore>(
    _pc: &mut u64,
    evm: &mut Evm<'_, S>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
) -> EvmResult<Option<Vec<u8>>> {
    let address = word_to_address(&stack.pop()?);
    stack.push(U256::from(evm.state.code_size(address)))?;
    Ok(None)
}

pub(crate) fn op_extcodecopy<S: StateStore>(
    _pc: &mut u64,
    evm: &mut Evm<'_, S>,
    _contract: &mut Contract,
    memory: &mut Memory,
    stack: &mut Stack,
) -> EvmResult<Option<Vec<u8>>> {
    let address = word_to_address(&stack.pop()?);
    let mem_offset = stack.pop()?;
    let code_offset = stack.pop()?;
    let length = stack.pop()?;
    let code = evm.state.code(address);
    let data = get_data(&code, &code_offset, &length);
    memory.set(mem_offset.low_u64(), length.low_u64(), &data);
    Ok(None)
}

pub(crate) fn op_returndatasize<S: StateStore>(
    _pc: &mut u64,
    evm: &mut Evm<'_, S>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
) -> EvmResult<Option<Vec<u8>>> {
    let size = evm.interpreter.return_data.len();
    stack.push(U256::from(size))?;
    Ok(None)
}

pub(crate) fn op_returndatacopy<S: StateStore>(
    _pc: &mut u64,
    evm: &mut Evm<'_, S>,
    _contract: &mut Contract,
    memory: &mut Memory,
    stack: &mut Stack,
) -> EvmResult<Option<Vec<u8>>> {
    let mem_offset = stack.pop()?;
    let data_offset = stack.pop()?;
    let length = stack.pop()?;

    let (end, overflow) = data_offset.overflowing_add(length);
    if overflow || end > U256::from(evm.interpreter.return_data.len()) {
        return Err(EvmError::ReturnDataOutOfBounds);
    }
    let data = evm.interpreter.return_data
        [data_offset.low_u64() as usize..end.low_u64() as usize]
        .to_vec();
    memory.set(mem_offset.low_u64(), length.low_u64(), &data);
    Ok(None)
}

// ---------------------------------------------------------------------------
// Block information

pub(crate) fn op_blockhash<S: StateStore>(
    _pc: &mut u64,
    evm: &mut Evm<'_, S>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
) -> EvmResult<Option<Vec<u8>>> {
    let num = stack.pop()?;
    let current = U256::from(evm.context.block_number);
    let hash = if num < current && current - num <= U256::from(256u64) {
        (evm.context.get_hash)(num.low_u64())
    } else {
        H256::ZERO
    };
    stack.push(hash.to_word())?;
    Ok(None)
}

pub(crate) fn op_coinbase<S: StateStore>(
    _pc: &mut u64,
    evm: &mut Evm<'_, S>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
) -> EvmResult<Option<Vec<u8>>> {
    let coinbase = evm.context.coinbase;
    stack.push(address_to_word(&coinbase))?;
    Ok(None)
}

pub(crate) fn op_timestamp<S: StateStore>(
    _pc: &mut u64,
    evm: &mut Evm<'_, S>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
) -> EvmResult<Option<Vec<u8>>> {
    let time = evm.context.time;
    stack.push(U256::from(time))?;
    Ok(None)
}

pub(crate) fn op_number<S: StateStore>(
    _pc: &mut u64,
    evm: &mut Evm<'_, S>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
) -> EvmResult<Option<Vec<u8>>> {
    let number = evm.context.block_number;
    stack.push(U256::from(number))?;
    Ok(None)
}

pub(crate) fn op_difficulty<S: StateStore>(
    _pc: &mut u64,
    evm: &mut Evm<'_, S>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
) -> EvmResult<Option<Vec<u8>>> {
    let difficulty = evm.context.difficulty;
    stack.push(difficulty)?;
    Ok(None)
}

pub(crate) fn op_gaslimit<S: StateStore>(
    _pc: &mut u64,
    evm: &mut Evm<'_, S>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
) -> EvmResult<Option<Vec<u8>>> {
    let gas_limit = evm.context.gas_limit;
    stack.push(U256::from(gas_limit))?;
    Ok(None)
}

// ---------------------------------------------------------------------------
// Stack, memory, storage and flow

pub(crate) fn op_pop<S: StateStore>(
    _pc: &mut u64,
    _evm: &mut Evm<'_, S>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
) -> EvmResult<Option<Vec<u8>>> {
    stack.pop()?;
    Ok(None)
}

pub(crate) fn op_mload<S: StateStore>(
    _pc: &mut u64,
    _evm: &mut Evm<'_, S>,
    _contract: &mut Contract,
    memory: &mut Memory,
    stack: &mut Stack,
) -> EvmResult<Option<Vec<u8>>> {
    let offset = stack.pop()?;
    let word = memory.get(offset.low_u64(), 32);
    stack.push(U256::from_big_endian(&word))?;
    Ok(None)
}

pub(crate) fn op_mstore<S: StateStore>(
    _pc: &mut u64,
    _evm: &mut Evm<'_, S>,
    _contract: &mut Contract,
    memory: &mut Memory,
    stack: &mut Stack,
) -> EvmResult<Option<Vec<u8>>> {
    let offset = stack.pop()?;
    let value = stack.pop()?;
    let mut bytes = [0u8; 32];
    value.to_big_endian(&mut bytes);
    memory.set(offset.low_u64(), 32, &bytes);
    Ok(None)
}

pub(crate) fn op_mstore8<S: StateStore>(
    _pc: &mut u64,
    _evm: &mut Evm<'_, S>,
    _contract: &mut Contract,
    memory: &mut Memory,
    stack: &mut Stack,
) -> EvmResult<Option<Vec<u8>>> {
    let offset = stack.pop()?;
    let value = stack.pop()?;
    memory.set(offset.low_u64(), 1, &[value.byte(0)]);
    Ok(None)
}

pub(crate) fn op_sload<S: StateStore>(
    _pc: &mut u64,
    evm: &mut Evm<'_, S>,
    contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
) -> EvmResult<Option<Vec<u8>>> {
    let key = word_to_h256(&stack.pop()?);
    let value = evm.state.storage(contract.address, key);
    stack.push(value.to_word())?;
    Ok(None)
}

pub(crate) fn op_sstore<S: StateStore>(
    _pc: &mut u64,
    evm: &mut Evm<'_, S>,
    contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
) -> EvmResult<Option<Vec<u8>>> {
    let key = word_to_h256(&stack.pop()?);
    let value = stack.pop()?;
    evm.state
        .set_storage(contract.address, key, word_to_h256(&value));
    Ok(None)
}

pub(crate) fn op_jump<S: StateStore>(
    pc: &mut u64,
    evm: &mut Evm<'_, S>,
    contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
) -> EvmResult<Option<Vec<u8>>> {
    let pos = stack.pop()?;
    if !evm.valid_jumpdest(contract, &pos) {
        return Err(EvmError::InvalidJump(pos.low_u64()));
    }
    *pc = pos.low_u64();
    Ok(None)
}

pub(crate) fn op_jumpi<S: StateStore>(
    pc: &mut u64,
    evm: &mut Evm<'_, S>,
    contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
) -> EvmResult<Option<Vec<u8>>> {
    let pos = stack.pop()?;
    let cond = stack.pop()?;
    if !cond.is_zero() {
        if !evm.valid_jumpdest(contract, &pos) {
            return Err(EvmError::InvalidJump(pos.low_u64()));
        }
        *pc = pos.low_u64();
    } else {
        *pc += 1;
    }
    Ok(None)
}

pub(crate) fn op_jumpdest<S: StateStore>(
    _pc: &mut u64,
    _evm: &mut Evm<'_, S>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    _stack: &mut Stack,
) -> EvmResult<Option<Vec<u8>>> {
    Ok(None)
}

pub(crate) fn op_pc<S: StateStore>(
    pc: &mut u64,
    _evm: &mut Evm<'_, S>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
) -> EvmResult<Option<Vec<u8>>> {
    stack.push(U256::from(*pc))?;
    Ok(None)
}

pub(crate) fn op_msize<S: StateStore>(
    _pc: &mut u64,
    _evm: &mut Evm<'_, S>,
    _contract: &mut Contract,
    memory: &mut Memory,
    stack: &mut Stack,
) -> EvmResult<Option<Vec<u8>>> {
    stack.push(U256::from(memory.len()))?;
    Ok(None)
}

pub(crate) fn op_gas<S: StateStore>(
    _pc: &mut u64,
    _evm: &mut Evm<'_, S>,
    contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
) -> EvmResult<Option<Vec<u8>>> {
    stack.push(U256::from(contract.gas))?;
    Ok(None)
}

// ---------------------------------------------------------------------------
// Push, dup, swap, log
//
// One handler per family; the width is read back from the opcode byte at
// the current pc instead of baking one function per variant.

pub(crate) fn op_push<S: StateStore>(
    pc: &mut u64,
    _evm: &mut Evm<'_, S>,
    contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
) -> EvmResult<Option<Vec<u8>>> {
    let n = (contract.get_op(*pc) - Opcode::PUSH1 as u8 + 1) as usize;
    let code_len = contract.code.len();
    let start = (*pc as usize + 1).min(code_len);
    let end = (start + n).min(code_len);

    // A truncated immediate reads as if the code were zero-extended.
    let mut buf = [0u8; 32];
    buf[32 - n..32 - n + (end - start)].copy_from_slice(&contract.code[start..end]);
    stack.push(U256::from_big_endian(&buf))?;

    *pc += n as u64;
    Ok(None)
}

pub(crate) fn op_dup<S: StateStore>(
    pc: &mut u64,
    _evm: &mut Evm<'_, S>,
    contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
) -> EvmResult<Option<Vec<u8>>> {
    let n = (contract.get_op(*pc) - Opcode::DUP1 as u8 + 1) as usize;
    stack.dup(n)?;
    Ok(None)
}

pub(crate) fn op_swap<S: StateStore>(
    pc: &mut u64,
    _evm: &mut Evm<'_, S>,
    contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
) -> EvmResult<Option<Vec<u8>>> {
    let n = (contract.get_op(*pc) - Opcode::SWAP1 as u8 + 1) as usize;
    stack.swap(n)?;
    Ok(None)
}

pub(crate) fn op_log<S: StateStore>(
    pc: &mut u64,
    evm: &mut Evm<'_, S>,
    contract: &mut Contract,
    memory: &mut Memory,
    stack: &mut Stack,
) -> EvmResult<Option<Vec<u8>>> {
    let topic_count = (contract.get_op(*pc) - Opcode::LOG0 as u8) as usize;
    let offset = stack.pop()?;
    let size = stack.pop()?;
    let mut topics = Vec::with_capacity(topic_count);
    for _ in 0..topic_count {
        topics.push(word_to_h256(&stack.pop()?));
    }
    let data = memory.get(offset.low_u64(), size.low_u64());
    evm.state.append_log(Log {
        address: contract.address,
        topics,
        data,
        block_number: evm.context.block_number,
    });
    Ok(None)
}

// ---------------------------------------------------------------------------
// System operations

pub(crate) fn op_create<S: StateStore>(
    _pc: &mut u64,
    evm: &mut Evm<'_, S>,
    contract: &mut Contract,
    memory: &mut Memory,
    stack: &mut Stack,
) -> EvmResult<Option<Vec<u8>>> {
    let value = stack.pop()?;
    let offset = stack.pop()?;
    let size = stack.pop()?;
    let input = memory.get(offset.low_u64(), size.low_u64());

    let mut gas = contract.gas;
    if evm.rules.is_eip150 {
        gas -= gas / 64;
    }
    contract.use_gas(gas);

    let (result, address) = evm.create(contract.address, &input, gas, value);

    // Homestead turned CodeStoreOutOfGas into a failure; Frontier
    // pretends the creation succeeded with empty code.
    match &result.error {
        Some(EvmError::CodeStoreOutOfGas) if evm.rules.is_homestead => {
            stack.push(U256::zero())?;
        }
        Some(EvmError::CodeStoreOutOfGas) | None => {
            stack.push(address_to_word(&address))?;
        }
        Some(_) => {
            stack.push(U256::zero())?;
        }
    }
    contract.gas += result.gas_left;

    if result.is_revert() {
        return Ok(Some(result.output));
    }
    Ok(None)
}

pub(crate) fn op_call<S: StateStore>(
    _pc: &mut u64,
    evm: &mut Evm<'_, S>,
    contract: &mut Contract,
    memory: &mut Memory,
    stack: &mut Stack,
) -> EvmResult<Option<Vec<u8>>> {
    // The requested gas was consumed by the gas calculator; the amount
    // actually forwarded is what the 63/64 rule produced.
    stack.pop()?;
    let mut gas = evm.call_gas_temp;
    let to = word_to_address(&stack.pop()?);
    let value = stack.pop()?;
    let in_offset = stack.pop()?;
    let in_size = stack.pop()?;
    let ret_offset = stack.pop()?;
    let ret_size = stack.pop()?;

    let args = memory.get(in_offset.low_u64(), in_size.low_u64());
    if !value.is_zero() {
        gas += cost::CALL_STIPEND;
    }

    let result = evm.call(contract.address, to, &args, gas, value);
    stack.push(if result.is_success() {
        U256::one()
    } else {
        U256::zero()
    })?;
    if result.is_success() || result.is_revert() {
        let n = (ret_size.low_u64() as usize).min(result.output.len());
        memory.set(ret_offset.low_u64(), n as u64, &result.output[..n]);
    }
    contract.gas += result.gas_left;
    Ok(Some(result.output))
}

pub(crate) fn op_callcode<S: StateStore>(
    _pc: &mut u64,
    evm: &mut Evm<'_, S>,
    contract: &mut Contract,
    memory: &mut Memory,
    stack: &mut Stack,
) -> EvmResult<Option<Vec<u8>>> {
    stack.pop()?;
    let mut gas = evm.call_gas_temp;
    let to = word_to_address(&stack.pop()?);
    let value = stack.pop()?;
    let in_offset = stack.pop()?;
    let in_size = stack.pop()?;
    let ret_offset = stack.pop()?;
    let ret_size = stack.pop()?;

    let args = memory.get(in_offset.low_u64(), in_size.low_u64());
    if !value.is_zero() {
        gas += cost::CALL_STIPEND;
    }

    let result = evm.call_code(contract.address, to, &args, gas, value);
    stack.push(if result.is_success() {
        U256::one()
    } else {
        U256::zero()
    })?;
    if result.is_success() || result.is_revert() {
        let n = (ret_size.low_u64() as usize).min(result.output.len());
        memory.set(ret_offset.low_u64(), n as u64, &result.output[..n]);
    }
    contract.gas += result.gas_left;
    Ok(Some(result.output))
}

pub(crate) fn op_delegatecall<S: StateStore>(
    _pc: &mut u64,
    evm: &mut Evm<'_, S>,
    contract: &mut Contract,
    memory: &mut Memory,
    stack: &mut Stack,
) -> EvmResult<Option<Vec<u8>>> {
    stack.pop()?;
    let gas = evm.call_gas_temp;
    let to = word_to_address(&stack.pop()?);
    let in_offset = stack.pop()?;
    let in_size = stack.pop()?;
    let ret_offset = stack.pop()?;
    let ret_size = stack.pop()?;

    let args = memory.get(in_offset.low_u64(), in_size.low_u64());
    let result = evm.delegate_call(contract, to, &args, gas);
    stack.push(if result.is_success() {
        U256::one()
    } else {
        U256::zero()
    })?;
    if result.is_success() || result.is_revert() {
        let n = (ret_size.low_u64() as usize).min(result.output.len());
        memory.set(ret_offset.low_u64(), n as u64, &result.output[..n]);
    }
    contract.gas += result.gas_left;
    Ok(Some(result.output))
}

pub(crate) fn op_staticcall<S: StateStore>(
    _pc: &mut u64,
    evm: &mut Evm<'_, S>,
    contract: &mut Contract,
    memory: &mut Memory,
    stack: &mut Stack,
) -> EvmResult<Option<Vec<u8>>> {
    stack.pop()?;
    let gas = evm.call_gas_temp;
    let to = word_to_address(&stack.pop()?);
    let in_offset = stack.pop()?;
    let in_size = stack.pop()?;
    let ret_offset = stack.pop()?;
    let ret_size = stack.pop()?;

    let args = memory.get(in_offset.low_u64(), in_size.low_u64());
    let result = evm.static_call(contract.address, to, &args, gas);
    stack.push(if result.is_success() {
        U256::one()
    } else {
        U256::zero()
    })?;
    if result.is_success() || result.is_revert() {
        let n = (ret_size.low_u64() as usize).min(result.output.len());
        memory.set(ret_offset.low_u64(), n as u64, &result.output[..n]);
    }
    contract.gas += result.gas_left;
    Ok(Some(result.output))
}

pub(crate) fn op_return<S: StateStore>(
    _pc: &mut u64,
    _evm: &mut Evm<'_, S>,
    _contract: &mut Contract,
    memory: &mut Memory,
    stack: &mut Stack,
) -> EvmResult<Option<Vec<u8>>> {
    let offset = stack.pop()?;
    let size = stack.pop()?;
    Ok(Some(memory.get_ptr(offset.low_u64(), size.low_u64()).to_vec()))
}

pub(crate) fn op_revert<S: StateStore>(
    _pc: &mut u64,
    _evm: &mut Evm<'_, S>,
    _contract: &mut Contract,
    memory: &mut Memory,
    stack: &mut Stack,
) -> EvmResult<Option<Vec<u8>>> {
    let offset = stack.pop()?;
    let size = stack.pop()?;
    let payload = memory.get_ptr(offset.low_u64(), size.low_u64()).to_vec();
    Err(EvmError::Revert(payload))
}

pub(crate) fn op_stop<S: StateStore>(
    _pc: &mut u64,
    _evm: &mut Evm<'_, S>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    _stack: &mut Stack,
) -> EvmResult<Option<Vec<u8>>> {
    Ok(None)
}

pub(crate) fn op_suicide<S: StateStore>(
    _pc: &mut u64,
    evm: &mut Evm<'_, S>,
    contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
) -> EvmResult<Option<Vec<u8>>> {
    let beneficiary = word_to_address(&stack.pop()?);
    let balance = evm.state.balance(contract.address);
    evm.state.add_balance(beneficiary, balance);
    evm.state.suicide(contract.address);
    Ok(None)
}

pub(crate) fn op_undefined<S: StateStore>(
    pc: &mut u64,
    _evm: &mut Evm<'_, S>,
    contract: &mut Contract,
    _memory: &mut Memory,
    _stack: &mut Stack,
) -> EvmResult<Option<Vec<u8>>> {
    Err(EvmError::InvalidOpcode(contract.get_op(*pc)))
}
