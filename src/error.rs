//! Error types for the challenge sandbox
//!
//! `ScriptError` is what the interpreter raises. `SubmissionFault` is the
//! user-facing taxonomy the evaluator reports through `TestResult`s; none of
//! these are fatal to the engine.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Faults raised while parsing or running submitted code
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScriptError {
    /// Source could not be tokenized or parsed
    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },
    /// Fault raised while executing (type errors, bad index, division by zero...)
    #[error("{0}")]
    Runtime(String),
    /// Step budget exhausted, almost always a loop that never terminates
    #[error("execution exceeded {limit} steps")]
    StepLimit { limit: u64 },
    /// Call stack grew past the configured depth
    #[error("maximum recursion depth of {depth} exceeded")]
    RecursionLimit { depth: usize },
    /// A string or list would grow past the configured length
    #[error("MemoryError: value would exceed {limit} elements")]
    SizeLimit { limit: usize },
}

impl ScriptError {
    pub fn syntax(line: usize, message: impl Into<String>) -> Self {
        ScriptError::Syntax {
            line,
            message: message.into(),
        }
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        ScriptError::Runtime(message.into())
    }
}

/// Result type for interpreter operations
pub type ScriptResult<T> = Result<T, ScriptError>;

/// Everything that can go wrong with a submission, as shown to the player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum SubmissionFault {
    #[error("No code provided")]
    Empty,
    #[error("Function definition missing")]
    MissingFunction,
    #[error("Function not implemented")]
    Unimplemented,
    #[error("Syntax Error")]
    Syntax,
    #[error("Runtime Error")]
    Runtime,
    #[error("Wrong answer")]
    LogicFailure,
    #[error("Function not found")]
    FunctionNotFound,
    #[error("Iteration limit exceeded")]
    IterationLimit,
    #[error("Incorrect operation detected")]
    AggravatedLoop,
    #[error("Infinite loop still present")]
    LoopNotFixed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_error_display() {
        let err = ScriptError::syntax(3, "expected ':'");
        assert_eq!(err.to_string(), "line 3: expected ':'");
        assert_eq!(
            ScriptError::StepLimit { limit: 10 }.to_string(),
            "execution exceeded 10 steps"
        );
    }

    #[test]
    fn test_size_limit_display() {
        assert_eq!(
            ScriptError::SizeLimit { limit: 8 }.to_string(),
            "MemoryError: value would exceed 8 elements"
        );
    }
}
