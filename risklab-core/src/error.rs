//! Engine error taxonomy.
//!
//! Every failure is reported as a distinct variant. Nothing is defaulted to a
//! placeholder value: a zero volatility or a missing asset never silently
//! becomes `0.0`.

use thiserror::Error;

use crate::optimize::SolverError;

/// Errors produced by the risk & optimization engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("insufficient data: {context} requires at least {required}, got {actual}")]
    InsufficientData {
        context: &'static str,
        required: usize,
        actual: usize,
    },

    #[error("degenerate volatility: {context} has zero variance")]
    DegenerateVolatility { context: &'static str },

    #[error("optimization failed: {0}")]
    OptimizationFailed(#[from] SolverError),

    #[error("asset '{symbol}' is not present in the return data")]
    MissingAsset { symbol: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;

impl EngineError {
    pub(crate) fn insufficient(context: &'static str, required: usize, actual: usize) -> Self {
        Self::InsufficientData {
            context,
            required,
            actual,
        }
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}
