//! VM error taxonomy and execution results

use fugue_primitives::{Address, H256};
use thiserror::Error;

/// VM execution errors.
///
/// Every variant other than [`EvmError::Revert`] is a consume-all failure:
/// the frame's snapshot is restored and its remaining gas is zeroed by the
/// call epilogue. `Revert` restores the snapshot but hands the remaining gas
/// and the revert payload back to the caller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EvmError {
    /// Out of gas
    #[error("out of gas")]
    OutOfGas,

    /// Contract creation ran out of gas while storing the returned code
    #[error("contract creation code storage out of gas")]
    CodeStoreOutOfGas,

    /// Max call depth exceeded
    #[error("max call depth exceeded")]
    Depth,

    /// Insufficient balance for transfer
    #[error("insufficient balance for transfer")]
    InsufficientBalance,

    /// Contract creation collided with an existing account
    #[error("contract address collision")]
    ContractAddressCollision,

    /// Explicit REVERT; carries the revert payload
    #[error("execution reverted")]
    Revert(Vec<u8>),

    /// Deployed code exceeds the maximum code size
    #[error("max code size exceeded")]
    MaxCodeSizeExceeded,

    /// Jump to a position that is not a valid JUMPDEST
    #[error("invalid jump destination {0}")]
    InvalidJump(u64),

    /// Undefined opcode for the active rule set
    #[error("invalid opcode 0x{0:02x}")]
    InvalidOpcode(u8),

    /// Stack underflow
    #[error("stack underflow")]
    StackUnderflow,

    /// Stack limit reached
    #[error("stack limit reached")]
    StackOverflow,

    /// State modification attempted inside a static call
    #[error("write protection")]
    WriteProtection,

    /// RETURNDATACOPY read past the end of the return buffer
    #[error("return data out of bounds")]
    ReturnDataOutOfBounds,

    /// A gas computation overflowed 64 bits
    #[error("gas uint64 overflow")]
    GasUintOverflow,

    /// Execution cancelled through the abort flag
    #[error("execution aborted")]
    Aborted,
}

/// Result type for VM operations
pub type EvmResult<T> = Result<T, EvmError>;

/// Outcome of one top-level or nested frame: output bytes, gas handed back
/// to the caller, and the error if the frame did not halt normally.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// Return data (or revert payload)
    pub output: Vec<u8>,
    /// Gas remaining in the frame, returned to the caller
    pub gas_left: u64,
    /// Error, if any; `None` means a normal halt
    pub error: Option<EvmError>,
}

impl ExecutionResult {
    /// A frame that halted normally
    pub fn success(output: Vec<u8>, gas_left: u64) -> Self {
        Self {
            output,
            gas_left,
            error: None,
        }
    }

    /// A frame that failed; consume-all failures pass `gas_left = 0`
    pub fn failure(error: EvmError, gas_left: u64) -> Self {
        Self {
            output: Vec::new(),
            gas_left,
            error: Some(error),
        }
    }

    /// A frame that executed REVERT
    pub fn reverted(output: Vec<u8>, gas_left: u64) -> Self {
        Self {
            error: Some(EvmError::Revert(output.clone())),
            output,
            gas_left,
        }
    }

    /// Whether the frame halted normally
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Whether the frame reverted explicitly
    pub fn is_revert(&self) -> bool {
        matches!(self.error, Some(EvmError::Revert(_)))
    }
}

/// Log entry emitted by the LOG opcodes
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Log {
    /// Address of the contract that emitted the log
    pub address: Address,
    /// Indexed topics (0 to 4)
    pub topics: Vec<H256>,
    /// Non-indexed payload
    pub data: Vec<u8>,
    /// Block the log was emitted in (non-consensus convenience field)
    pub block_number: u64,
}
