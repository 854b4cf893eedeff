//! Error types for the test runner

use thiserror::Error;

/// Test runner error
#[derive(Error, Debug)]
pub enum TestError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Fixture field that could not be interpreted
    #[error("parse error: {0}")]
    Parse(String),

    /// Expectation that did not hold
    #[error("assertion failed: {0}")]
    Assertion(String),
}

/// Result type for the test runner
pub type TestResult<T> = Result<T, TestError>;
