//! # fugue-evm
//!
//! Gas-metered smart-contract virtual machine for the Fugue chain.
//!
//! The VM deterministically executes bytecode against an abstract
//! [`StateStore`], metering every instruction in gas. One [`Evm`]
//! instance serves one top-level call or contract creation; sub-calls
//! recurse through the same instance with snapshot/revert semantics over
//! the state and a hard depth limit of 1024 frames. Hard-fork behavior
//! is selected once per transaction through [`ChainConfig`].

#![warn(missing_docs)]
#![warn(clippy::all)]

mod contract;
mod error;
mod evm;
mod gas;
mod instructions;
mod interpreter;
mod jumpdest;
mod jumptable;
mod memory;
mod opcode;
mod precompile;
mod rules;
mod stack;
mod state;
mod tracer;

pub use contract::Contract;
pub use error::{EvmError, EvmResult, ExecutionResult, Log};
pub use evm::{
    can_transfer, transfer, CancelToken, CanTransferFn, Config, Context, Evm, GetHashFn,
    TransferFn,
};
pub use gas::{call_gas, cost, memory_gas_cost, to_word_size, GasTable};
pub use jumpdest::{analyze, JumpdestCache};
pub use memory::Memory;
pub use opcode::Opcode;
pub use precompile::{precompile_address, Identity, Precompile, PrecompileRegistry};
pub use rules::{ChainConfig, Rules};
pub use stack::{Stack, STACK_LIMIT};
pub use state::{MemoryStateStore, StateStore};
pub use tracer::{NoopTracer, StructLog, StructLogger, Tracer};
