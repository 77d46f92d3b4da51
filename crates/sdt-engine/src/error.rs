//! Error taxonomy for the compression and interpolation engine.
//!
//! One small enum per failure domain, `#[error("...")]` messages with
//! `#[source]`/`#[from]` chains where a variant wraps another error.

use thiserror::Error;

/// Raised by constructors when a parameter is out of range.
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum ConfigError {
    #[error("dev_margin must be positive, got {0}")]
    NonPositiveDevMargin(OrderedF64),
    #[error("time_step must be a non-zero duration")]
    ZeroTimeStep,
}

/// Raised by [`crate::Compressor::accept`].
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum AcceptError {
    #[error("zero Δt: two points with identical timestamps were accepted")]
    ZeroTimeDelta,
    #[error("timestamp not strictly increasing")]
    NonMonotonicTimestamp,
}

/// Raised by the interpolators.
#[derive(Debug, Error, PartialEq, Clone, Copy)]
pub enum InterpolationError {
    #[error("time_step is not yet known for this table")]
    Unconfigured,
    #[error("only one anchor point is available and no snapshot exists")]
    Unreconstructable,
    #[error("underlying scan yielded rows out of order")]
    ProtocolViolation,
}

/// Thin `f64` wrapper so [`ConfigError`] can derive `Eq`/`PartialEq`
/// (plain `f64` isn't `Eq`, and these errors carry the bad input purely
/// for diagnostics, never for further arithmetic).
#[derive(Debug, Clone, Copy)]
pub struct OrderedF64(pub f64);

impl std::fmt::Display for OrderedF64 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PartialEq for OrderedF64 {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}
impl Eq for OrderedF64 {}
