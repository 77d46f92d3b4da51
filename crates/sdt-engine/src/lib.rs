//! Swinging-door trending compressor and linear-interpolation reader.
//!
//! This crate is the algorithmic core described by the design: a
//! [`Compressor`] that decides, point by point, which inputs must be
//! persisted, a [`Buffer`] holding the at-most-two in-memory points per
//! table, and two interpolation entry points (`interpolate_at`,
//! [`RangeInterpolator`]) that reconstruct values from whatever was
//! actually persisted.

mod buffer;
mod compressor;
pub mod error;
mod interpolate;

pub use buffer::Buffer;
pub use compressor::Compressor;
pub use interpolate::{interpolate_at, RangeError, RangeInterpolator};
