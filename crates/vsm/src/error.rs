//! Evaluation errors and the machine's result type

use skm_reader::error::ReaderError;

/// Runtime failure: the machine halts and surfaces this to its caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalError {
    /// Machine function that detected the problem
    pub src_fn: &'static str,
    pub message: String,
}

impl EvalError {
    pub fn new(src_fn: &'static str, message: impl Into<String>) -> Self {
        EvalError {
            src_fn,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for EvalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "eval error (detected in {}): {}", self.src_fn, self.message)
    }
}

impl std::error::Error for EvalError {}

/// Failure surfaced by `read_eval`: either stage can fail.
#[derive(Debug, Clone, PartialEq)]
pub enum VsmError {
    Read(ReaderError),
    Eval(EvalError),
}

impl std::fmt::Display for VsmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VsmError::Read(e) => e.fmt(f),
            VsmError::Eval(e) => e.fmt(f),
        }
    }
}

impl std::error::Error for VsmError {}

impl From<ReaderError> for VsmError {
    fn from(e: ReaderError) -> Self {
        VsmError::Read(e)
    }
}

impl From<EvalError> for VsmError {
    fn from(e: EvalError) -> Self {
        VsmError::Eval(e)
    }
}
