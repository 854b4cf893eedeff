//! Execution tracing hooks

use crate::contract::Contract;
use crate::error::EvmError;
use crate::memory::Memory;
use crate::opcode::Opcode;
use crate::stack::Stack;
use fugue_primitives::{Address, U256};
use std::time::Duration;

/// Observer of frame and step events. All methods default to no-ops so
/// implementations only override what they need.
pub trait Tracer {
    /// Top-level frame is about to run
    fn capture_start(
        &mut self,
        _from: Address,
        _to: Address,
        _create: bool,
        _input: &[u8],
        _gas: u64,
        _value: U256,
    ) {
    }

    /// An opcode is about to execute, its gas already charged
    #[allow(clippy::too_many_arguments)]
    fn capture_state(
        &mut self,
        _pc: u64,
        _op: Opcode,
        _gas: u64,
        _cost: u64,
        _memory: &Memory,
        _stack: &Stack,
        _contract: &Contract,
        _depth: usize,
    ) {
    }

    /// An opcode handler returned an error
    fn capture_fault(
        &mut self,
        _pc: u64,
        _op: Opcode,
        _gas: u64,
        _cost: u64,
        _depth: usize,
        _err: &EvmError,
    ) {
    }

    /// Top-level frame finished
    fn capture_end(&mut self, _output: &[u8], _gas_used: u64, _t: Duration, _err: Option<&EvmError>) {
    }
}

/// Tracer that ignores everything
pub struct NoopTracer;

impl Tracer for NoopTracer {}

// Shared handle so the host can keep reading a tracer it handed to the VM.
impl<T: Tracer> Tracer for std::rc::Rc<std::cell::RefCell<T>> {
    fn capture_start(
        &mut self,
        from: Address,
        to: Address,
        create: bool,
        input: &[u8],
        gas: u64,
        value: U256,
    ) {
        self.borrow_mut()
            .capture_start(from, to, create, input, gas, value);
    }

    fn capture_state(
        &mut self,
        pc: u64,
        op: Opcode,
        gas: u64,
        cost: u64,
        memory: &Memory,
        stack: &Stack,
        contract: &Contract,
        depth: usize,
    ) {
        self.borrow_mut()
            .capture_state(pc, op, gas, cost, memory, stack, contract, depth);
    }

    fn capture_fault(
        &mut self,
        pc: u64,
        op: Opcode,
        gas: u64,
        cost: u64,
        depth: usize,
        err: &EvmError,
    ) {
        self.borrow_mut().capture_fault(pc, op, gas, cost, depth, err);
    }

    fn capture_end(&mut self, output: &[u8], gas_used: u64, t: Duration, err: Option<&EvmError>) {
        self.borrow_mut().capture_end(output, gas_used, t, err);
    }
}

/// One recorded interpreter step
#[derive(Debug, Clone)]
pub struct StructLog {
    /// Program counter
    pub pc: u64,
    /// Opcode executed
    pub op: Opcode,
    /// Gas remaining before the step
    pub gas: u64,
    /// Gas charged for the step
    pub gas_cost: u64,
    /// Call depth
    pub depth: usize,
    /// Stack contents, bottom first
    pub stack: Vec<U256>,
    /// Error raised by the step, if any
    pub err: Option<EvmError>,
}

/// Tracer that records every step for inspection after the run
#[derive(Default)]
pub struct StructLogger {
    logs: Vec<StructLog>,
}

impl StructLogger {
    /// Create an empty logger
    pub fn new() -> Self {
        Self::default()
    }

    /// Steps recorded so far
    pub fn logs(&self) -> &[StructLog] {
        &self.logs
    }
}

impl Tracer for StructLogger {
    fn capture_state(
        &mut self,
        pc: u64,
        op: Opcode,
        gas: u64,
        cost: u64,
        _memory: &Memory,
        stack: &Stack,
        _contract: &Contract,
        depth: usize,
    ) {
        self.logs.push(StructLog {
            pc,
            op,
            gas,
            gas_cost: cost,
            depth,
            stack: stack.data().to_vec(),
            err: None,
        });
    }

    fn capture_fault(
        &mut self,
        pc: u64,
        op: Opcode,
        gas: u64,
        cost: u64,
        depth: usize,
        err: &EvmError,
    ) {
        self.logs.push(StructLog {
            pc,
            op,
            gas,
            gas_cost: cost,
            depth,
            stack: Vec::new(),
            err: Some(err.clone()),
        });
    }
}
