//! Umbrella error type for [`crate::SqlShim`]'s four session-facing
//! operations, so the SQL-statement classifier (out of scope for this
//! workspace) has one error type to match on regardless of which layer
//! failed.

use sdt_engine::error::{AcceptError, ConfigError, InterpolationError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShimError<E: std::error::Error + 'static> {
    #[error("table {0:?} has no registered compressor and no persisted dev_margin")]
    UnknownTable(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Accept(#[from] AcceptError),
    #[error(transparent)]
    Interpolation(#[from] InterpolationError),
    #[error("row store error")]
    Store(#[source] E),
}

impl<E: std::error::Error + 'static> From<sdt_engine::RangeError<E>> for ShimError<E> {
    fn from(e: sdt_engine::RangeError<E>) -> Self {
        match e {
            sdt_engine::RangeError::Config(e) => ShimError::Config(e),
            sdt_engine::RangeError::Interpolation(e) => ShimError::Interpolation(e),
            sdt_engine::RangeError::Store(e) => ShimError::Store(e),
        }
    }
}
