//! Per-fork opcode dispatch table

use crate::contract::Contract;
use crate::error::{EvmError, EvmResult};
use crate::evm::Evm;
use crate::gas::{
    cost, gas_call, gas_call_code, gas_copy, gas_delegate_or_static_call, gas_exp,
    gas_ext_code_copy, gas_log, gas_memory, gas_sha3, gas_sstore, gas_suicide, GasTable,
};
use crate::instructions::*;
use crate::memory::Memory;
use crate::opcode::Opcode;
use crate::rules::Rules;
use crate::stack::{Stack, STACK_LIMIT};
use crate::state::StateStore;
use fugue_primitives::U256;

pub(crate) type ExecutionFn<S> = fn(
    &mut u64,
    &mut Evm<'_, S>,
    &mut Contract,
    &mut Memory,
    &mut Stack,
) -> EvmResult<Option<Vec<u8>>>;

pub(crate) type GasFn<S> =
    fn(&mut Evm<'_, S>, &Contract, &Stack, &Memory, u64) -> EvmResult<u64>;

pub(crate) type MemorySizeFn = fn(&Stack) -> EvmResult<u64>;

/// One dispatch entry: handler, costs, stack discipline and control flags.
pub(crate) struct Operation<S: StateStore> {
    pub execute: ExecutionFn<S>,
    pub constant_gas: u64,
    pub dynamic_gas: Option<GasFn<S>>,
    /// Minimum stack depth the handler needs
    pub min_stack: usize,
    /// Maximum stack depth that still leaves room for the pushes
    pub max_stack: usize,
    /// Byte region the opcode touches, for expansion charging
    pub memory_size: Option<MemorySizeFn>,
    /// Modifies state; rejected in read-only frames
    pub writes: bool,
    /// Sets pc itself
    pub jumps: bool,
    /// Ends the frame normally
    pub halts: bool,
    /// Return value feeds the frame's return-data buffer
    pub returns: bool,
    /// Defined under the active rule set
    pub valid: bool,
}

impl<S: StateStore> Clone for Operation<S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S: StateStore> Copy for Operation<S> {}

impl<S: StateStore> Operation<S> {
    fn new(execute: ExecutionFn<S>, constant_gas: u64, pops: usize, pushes: usize) -> Self {
        Self {
            execute,
            constant_gas,
            dynamic_gas: None,
            min_stack: pops,
            max_stack: STACK_LIMIT + pops - pushes,
            memory_size: None,
            writes: false,
            jumps: false,
            halts: false,
            returns: false,
            valid: true,
        }
    }

    fn invalid() -> Self {
        Self {
            execute: op_undefined,
            constant_gas: 0,
            dynamic_gas: None,
            min_stack: 0,
            max_stack: STACK_LIMIT,
            memory_size: None,
            writes: false,
            jumps: false,
            halts: false,
            returns: false,
            valid: false,
        }
    }

    fn dynamic(mut self, f: GasFn<S>) -> Self {
        self.dynamic_gas = Some(f);
        self
    }

    fn memory(mut self, f: MemorySizeFn) -> Self {
        self.memory_size = Some(f);
        self
    }

    fn writes(mut self) -> Self {
        self.writes = true;
        self
    }

    fn jumps(mut self) -> Self {
        self.jumps = true;
        self
    }

    fn halts(mut self) -> Self {
        self.halts = true;
        self
    }

    fn returns(mut self) -> Self {
        self.returns = true;
        self
    }
}

/// Flat dispatch table indexed by the opcode byte, built once per rule set
pub(crate) struct JumpTable<S: StateStore>(pub [Operation<S>; 256]);

/// Build the table matching `rules`
pub(crate) fn new_jump_table<S: StateStore>(rules: &Rules, gt: &GasTable) -> JumpTable<S> {
    if rules.is_byzantium {
        byzantium_instruction_set(gt)
    } else if rules.is_homestead {
        homestead_instruction_set(gt)
    } else {
        frontier_instruction_set(gt)
    }
}

fn byzantium_instruction_set<S: StateStore>(gt: &GasTable) -> JumpTable<S> {
    let mut table = homestead_instruction_set(gt);
    let t = &mut table.0;
    t[Opcode::STATICCALL as usize] = Operation::new(op_staticcall, gt.calls, 6, 1)
        .dynamic(gas_delegate_or_static_call)
        .memory(memory_static_call)
        .returns();
    t[Opcode::RETURNDATASIZE as usize] = Operation::new(op_returndatasize, cost::BASE, 0, 1);
    t[Opcode::RETURNDATACOPY as usize] = Operation::new(op_returndatacopy, cost::VERYLOW, 3, 0)
        .dynamic(gas_copy)
        .memory(memory_returndatacopy);
    t[Opcode::REVERT as usize] = Operation::new(op_revert, cost::ZERO, 2, 0)
        .dynamic(gas_memory)
        .memory(memory_revert);
    table
}

fn homestead_instruction_set<S: StateStore>(gt: &GasTable) -> JumpTable<S> {
    let mut table = frontier_instruction_set(gt);
    table.0[Opcode::DELEGATECALL as usize] = Operation::new(op_delegatecall, gt.calls, 6, 1)
        .dynamic(gas_delegate_or_static_call)
        .memory(memory_delegate_call)
        .returns();
    table
}

fn frontier_instruction_set<S: StateStore>(gt: &GasTable) -> JumpTable<S> {
    let mut table = JumpTable([Operation::invalid(); 256]);
    let t = &mut table.0;

    t[Opcode::STOP as usize] = Operation::new(op_stop, cost::ZERO, 0, 0).halts();
    t[Opcode::ADD as usize] = Operation::new(op_add, cost::VERYLOW, 2, 1);
    t[Opcode::MUL as usize] = Operation::new(op_mul, cost::LOW, 2, 1);
    t[Opcode::SUB as usize] = Operation::new(op_sub, cost::VERYLOW, 2, 1);
    t[Opcode::DIV as usize] = Operation::new(op_div, cost::LOW, 2, 1);
    t[Opcode::SDIV as usize] = Operation::new(op_sdiv, cost::LOW, 2, 1);
    t[Opcode::MOD as usize] = Operation::new(op_mod, cost::LOW, 2, 1);
    t[Opcode::SMOD as usize] = Operation::new(op_smod, cost::LOW, 2, 1);
    t[Opcode::ADDMOD as usize] = Operation::new(op_addmod, cost::MID, 3, 1);
    t[Opcode::MULMOD as usize] = Operation::new(op_mulmod, cost::MID, 3, 1);
    t[Opcode::EXP as usize] = Operation::new(op_exp, cost::EXP, 2, 1).dynamic(gas_exp);
    t[Opcode::SIGNEXTEND as usize] = Operation::new(op_signextend, cost::LOW, 2, 1);

    t[Opcode::LT as usize] = Operation::new(op_lt, cost::VERYLOW, 2, 1);
    t[Opcode::GT as usize] = Operation::new(op_gt, cost::VERYLOW, 2, 1);
    t[Opcode::SLT as usize] = Operation::new(op_slt, cost::VERYLOW, 2, 1);
    t[Opcode::SGT as usize] = Operation::new(op_sgt, cost::VERYLOW, 2, 1);
    t[Opcode::EQ as usize] = Operation::new(op_eq, cost::VERYLOW, 2, 1);
    t[Opcode::ISZERO as usize] = Operation::new(op_iszero, cost::VERYLOW, 1, 1);
    t[Opcode::AND as usize] = Operation::new(op_and, cost::VERYLOW, 2, 1);
    t[Opcode::OR as usize] = Operation::new(op_or, cost::VERYLOW, 2, 1);
    t[Opcode::XOR as usize] = Operation::new(op_xor, cost::VERYLOW, 2, 1);
    t[Opcode::NOT as usize] = Operation::new(op_not, cost::VERYLOW, 1, 1);
    t[Opcode::BYTE as usize] = Operation::new(op_byte, cost::VERYLOW, 2, 1);

    t[Opcode::SHA3 as usize] = Operation::new(op_sha3, cost::SHA3, 2, 1)
        .dynamic(gas_sha3)
        .memory(memory_sha3);

    t[Opcode::ADDRESS as usize] = Operation::new(op_address, cost::BASE, 0, 1);
    t[Opcode::BALANCE as usize] = Operation::new(op_balance, gt.balance, 1, 1);
    t[Opcode::ORIGIN as usize] = Operation::new(op_origin, cost::BASE, 0, 1);
    t[Opcode::CALLER as usize] = Operation::new(op_caller, cost::BASE, 0, 1);
    t[Opcode::CALLVALUE as usize] = Operation::new(op_callvalue, cost::BASE, 0, 1);
    t[Opcode::CALLDATALOAD as usize] = Operation::new(op_calldataload, cost::VERYLOW, 1, 1);
    t[Opcode::CALLDATASIZE as usize] = Operation::new(op_calldatasize, cost::BASE, 0, 1);
    t[Opcode::CALLDATACOPY as usize] = Operation::new(op_calldatacopy, cost::VERYLOW, 3, 0)
        .dynamic(gas_copy)
        .memory(memory_calldatacopy);
    t[Opcode::CODESIZE as usize] = Operation::new(op_codesize, cost::BASE, 0, 1);
    t[Opcode::CODECOPY as usize] = Operation::new(op_codecopy, cost::VERYLOW, 3, 0)
        .dynamic(gas_copy)
        .memory(memory_codecopy);
    t[Opcode::GASPRICE as usize] = Operation::new(op_gasprice, cost::BASE, 0, 1);
    t[Opcode::EXTCODESIZE as usize] = Operation::new(op_extcodesize, gt.ext_code_size, 1, 1);
    t[Opcode::EXTCODECOPY as usize] = Operation::new(op_extcodecopy, gt.ext_code_copy, 4, 0)
        .dynamic(gas_ext_code_copy)
        .memory(memory_extcodecopy);

    t[Opcode::BLOCKHASH as usize] = Operation::new(op_blockhash, cost::BLOCKHASH, 1, 1);
    t[Opcode::COINBASE as usize] = Operation::new(op_coinbase, cost::BASE, 0, 1);
    t[Opcode::TIMESTAMP as usize] = Operation::new(op_timestamp, cost::BASE, 0, 1);
    t[Opcode::NUMBER as usize] = Operation::new(op_number, cost::BASE, 0, 1);
    t[Opcode::DIFFICULTY as usize] = Operation::new(op_difficulty, cost::BASE, 0, 1);
    t[Opcode::GASLIMIT as usize] = Operation::new(op_gaslimit, cost::BASE, 0, 1);

    t[Opcode::POP as usize] = Operation::new(op_pop, cost::BASE, 1, 0);
    t[Opcode::MLOAD as usize] = Operation::new(op_mload, cost::VERYLOW, 1, 1)
        .dynamic(gas_memory)
        .memory(memory_mload);
    t[Opcode::MSTORE as usize] = Operation::new(op_mstore, cost::VERYLOW, 2, 0)
        .dynamic(gas_memory)
        .memory(memory_mstore);
    t[Opcode::MSTORE8 as usize] = Operation::new(op_mstore8, cost::VERYLOW, 2, 0)
        .dynamic(gas_memory)
        .memory(memory_mstore8);
    t[Opcode::SLOAD as usize] = Operation::new(op_sload, gt.sload, 1, 1);
    t[Opcode::SSTORE as usize] =
        Operation::new(op_sstore, cost::ZERO, 2, 0).dynamic(gas_sstore).writes();
    t[Opcode::JUMP as usize] = Operation::new(op_jump, cost::MID, 1, 0).jumps();
    t[Opcode::JUMPI as usize] = Operation::new(op_jumpi, cost::HIGH, 2, 0).jumps();
    t[Opcode::PC as usize] = Operation::new(op_pc, cost::BASE, 0, 1);
    t[Opcode::MSIZE as usize] = Operation::new(op_msize, cost::BASE, 0, 1);
    t[Opcode::GAS as usize] = Operation::new(op_gas, cost::BASE, 0, 1);
    t[Opcode::JUMPDEST as usize] = Operation::new(op_jumpdest, cost::JUMPDEST, 0, 0);

    for op in 0x60..=0x7F {
        t[op] = Operation::new(op_push, cost::VERYLOW, 0, 1);
    }
    for n in 1..=16 {
        t[0x80 + n - 1] = Operation::new(op_dup, cost::VERYLOW, n, n + 1);
        t[0x90 + n - 1] = Operation::new(op_swap, cost::VERYLOW, n + 1, n + 1);
    }
    for n in 0..=4usize {
        t[0xA0 + n] = Operation::new(
            op_log,
            cost::LOG + n as u64 * cost::LOG_TOPIC,
            n + 2,
            0,
        )
        .dynamic(gas_log)
        .memory(memory_log)
        .writes();
    }

    t[Opcode::CREATE as usize] = Operation::new(op_create, cost::CREATE, 3, 1)
        .dynamic(gas_memory)
        .memory(memory_create)
        .writes()
        .returns();
    t[Opcode::CALL as usize] = Operation::new(op_call, gt.calls, 7, 1)
        .dynamic(gas_call)
        .memory(memory_call)
        .returns();
    t[Opcode::CALLCODE as usize] = Operation::new(op_callcode, gt.calls, 7, 1)
        .dynamic(gas_call_code)
        .memory(memory_call)
        .returns();
    t[Opcode::RETURN as usize] = Operation::new(op_return, cost::ZERO, 2, 0)
        .dynamic(gas_memory)
        .memory(memory_return)
        .halts();
    t[Opcode::SELFDESTRUCT as usize] = Operation::new(op_suicide, cost::ZERO, 1, 0)
        .dynamic(gas_suicide)
        .halts()
        .writes();

    table
}

// ---------------------------------------------------------------------------
// Memory-size functions: the byte region each opcode touches

fn calc_memory_size(offset: &U256, length: &U256) -> EvmResult<u64> {
    if length.is_zero() {
        return Ok(0);
    }
    if offset.bits() > 64 || length.bits() > 64 {
        return Err(EvmError::GasUintOverflow);
    }
    offset
        .low_u64()
        .checked_add(length.low_u64())
        .ok_or(EvmError::GasUintOverflow)
}

fn memory_sha3(stack: &Stack) -> EvmResult<u64> {
    calc_memory_size(stack.peek_at(0)?, stack.peek_at(1)?)
}

fn memory_calldatacopy(stack: &Stack) -> EvmResult<u64> {
    calc_memory_size(stack.peek_at(0)?, stack.peek_at(2)?)
}

fn memory_codecopy(stack: &Stack) -> EvmResult<u64> {
    calc_memory_size(stack.peek_at(0)?, stack.peek_at(2)?)
}

fn memory_returndatacopy(stack: &Stack) -> EvmResult<u64> {
    calc_memory_size(stack.peek_at(0)?, stack.peek_at(2)?)
}

fn memory_extcodecopy(stack: &Stack) -> EvmResult<u64> {
    calc_memory_size(stack.peek_at(1)?, stack.peek_at(3)?)
}

fn memory_mload(stack: &Stack) -> EvmResult<u64> {
    calc_memory_size(stack.peek_at(0)?, &U256::from(32u64))
}

fn memory_mstore(stack: &Stack) -> EvmResult<u64> {
    calc_memory_size(stack.peek_at(0)?, &U256::from(32u64))
}

fn memory_mstore8(stack: &Stack) -> EvmResult<u64> {
    calc_memory_size(stack.peek_at(0)?, &U256::one())
}

fn memory_log(stack: &Stack) -> EvmResult<u64> {
    calc_memory_size(stack.peek_at(0)?, stack.peek_at(1)?)
}

fn memory_create(stack: &Stack) -> EvmResult<u64> {
    calc_memory_size(stack.peek_at(1)?, stack.peek_at(2)?)
}

fn memory_call(stack: &Stack) -> EvmResult<u64> {
    let out = calc_memory_size(stack.peek_at(5)?, stack.peek_at(6)?)?;
    let args = calc_memory_size(stack.peek_at(3)?, stack.peek_at(4)?)?;
    Ok(out.max(args))
}

fn memory_delegate_call(stack: &Stack) -> EvmResult<u64> {
    let out = calc_memory_size(stack.peek_at(4)?, stack.peek_at(5)?)?;
    let args = calc_memory_size(stack.peek_at(2)?, stack.peek_at(3)?)?;
    Ok(out.max(args))
}

fn memory_static_call(stack: &Stack) -> EvmResult<u64> {
    memory_delegate_call(stack)
}

fn memory_return(stack: &Stack) -> EvmResult<u64> {
    calc_memory_size(stack.peek_at(0)?, stack.peek_at(1)?)
}

fn memory_revert(stack: &Stack) -> EvmResult<u64> {
    calc_memory_size(stack.peek_at(0)?, stack.peek_at(1)?)
}
