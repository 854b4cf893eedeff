//! # fugue-evm-tests
//!
//! Consensus test-vector tooling for the Fugue VM.
//!
//! Parses the JSON VM-test fixture format (map of test name to case with
//! `env`/`exec`/`pre` inputs and `gas`/`out`/`post` expectations) and runs
//! each case through the full VM against an in-memory state store.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod types;

pub use error::{TestError, TestResult};
pub use types::*;
pub use vm_test::{VmTestResults, VmTestRunner};
