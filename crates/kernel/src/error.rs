//! Kernel error type.

use thiserror::Error;

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by simulation models.
///
/// Construction and parameter faults use `InvalidParam`; faults raised while
/// stepping (`NonFinite`, `Fault`) are what the engine turns into its FAILED
/// state.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Invalid constructor or setter argument.
    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    /// A coordinate or velocity became NaN/inf during integration.
    #[error("non-finite state at step {step} (particle {particle})")]
    NonFinite {
        /// Step counter of the update that produced the value.
        step: u64,
        /// Index of the first offending particle.
        particle: usize,
    },

    /// Any other model-specific runtime fault.
    #[error("model fault: {0}")]
    Fault(String),
}
