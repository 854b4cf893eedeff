//! The fetch-decode-execute loop

use crate::contract::Contract;
use crate::error::{EvmError, EvmResult};
use crate::evm::Evm;
use crate::gas;
use crate::memory::Memory;
use crate::opcode::Opcode;
use crate::stack::Stack;
use crate::state::StateStore;

/// Interpreter state shared by every frame of one VM: the static-call
/// flag and the output of the most recent sub-call.
#[derive(Debug, Default)]
pub(crate) struct Interpreter {
    pub read_only: bool,
    pub return_data: Vec<u8>,
}

/// Run a frame to completion. Depth accounting happens here so that
/// precompile calls, which bypass the interpreter, do not consume depth.
pub(crate) fn run<S: StateStore>(
    evm: &mut Evm<'_, S>,
    contract: &mut Contract,
    input: &[u8],
) -> EvmResult<Vec<u8>> {
    evm.depth += 1;
    let result = run_frame(evm, contract, input);
    evm.depth -= 1;
    result
}

fn run_frame<S: StateStore>(
    evm: &mut Evm<'_, S>,
    contract: &mut Contract,
    input: &[u8],
) -> EvmResult<Vec<u8>> {
    // Each frame starts with an empty return buffer; the parent's view of
    // this frame's output is restored by its CALL opcode on the way out.
    evm.interpreter.return_data.clear();

    if contract.code.is_empty() {
        return Ok(Vec::new());
    }
    contract.input = input.to_vec();

    let mut memory = Memory::new();
    let mut stack = Stack::new();
    let mut pc: u64 = 0;

    loop {
        if evm.aborted() {
            return Err(EvmError::Aborted);
        }

        // Fetching past the end of code yields STOP.
        let op_byte = contract.get_op(pc);
        let operation = evm.table.0[op_byte as usize];
        if !operation.valid {
            return Err(EvmError::InvalidOpcode(op_byte));
        }
        let op = Opcode::from_byte(op_byte).ok_or(EvmError::InvalidOpcode(op_byte))?;

        // Stack bounds are validated before anything is charged.
        if stack.len() < operation.min_stack {
            return Err(EvmError::StackUnderflow);
        }
        if stack.len() > operation.max_stack {
            return Err(EvmError::StackOverflow);
        }

        if !contract.use_gas(operation.constant_gas) {
            return Err(EvmError::OutOfGas);
        }
        let mut step_cost = operation.constant_gas;

        // Word-aligned memory requirement, then the dynamic cost, which
        // includes the expansion delta. Only after both are paid does the
        // memory actually grow.
        let mut memory_size = 0u64;
        if let Some(memory_size_fn) = operation.memory_size {
            let size = memory_size_fn(&stack)?;
            memory_size = gas::to_word_size(size)
                .checked_mul(32)
                .ok_or(EvmError::GasUintOverflow)?;
        }
        if let Some(dynamic_gas_fn) = operation.dynamic_gas {
            let dynamic_cost = dynamic_gas_fn(evm, contract, &stack, &memory, memory_size)
                .map_err(|_| EvmError::OutOfGas)?;
            if !contract.use_gas(dynamic_cost) {
                return Err(EvmError::OutOfGas);
            }
            step_cost = step_cost.saturating_add(dynamic_cost);
        }
        if memory_size > 0 {
            memory.resize(memory_size);
        }

        // Static frames reject state-writing opcodes and value-bearing
        // calls. The flag only exists once STATICCALL does.
        if evm.interpreter.read_only && evm.rules.is_byzantium {
            let transfers_value =
                op_byte == Opcode::CALL as u8 && !stack.peek_at(2)?.is_zero();
            if operation.writes || transfers_value {
                return Err(EvmError::WriteProtection);
            }
        }

        if evm.config.debug {
            let depth = evm.depth;
            let gas = contract.gas;
            if let Some(tracer) = evm.config.tracer.as_mut() {
                tracer.capture_state(pc, op, gas, step_cost, &memory, &stack, contract, depth);
            }
        }

        match (operation.execute)(&mut pc, evm, contract, &mut memory, &mut stack) {
            Ok(ret) => {
                if operation.returns {
                    evm.interpreter.return_data = ret.clone().unwrap_or_default();
                }
                if operation.halts {
                    return Ok(ret.unwrap_or_default());
                }
                if !operation.jumps {
                    pc += 1;
                }
            }
            Err(err) => {
                if evm.config.debug {
                    let depth = evm.depth;
                    let gas = contract.gas;
                    if let Some(tracer) = evm.config.tracer.as_mut() {
                        tracer.capture_fault(pc, op, gas, step_cost, depth, &err);
                    }
                }
                return Err(err);
            }
        }
    }
}
