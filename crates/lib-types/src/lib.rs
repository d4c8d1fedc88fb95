//! # lib-types
//!
//! Shared value types for the link tuning workspace:
//! - Physical units with compile-time safety
//! - Waveforms and the impulse/frequency/pulse responses derived from them
//! - Tunable equalizer settings and the cost summary they are scored by
//! - `LinkConfig`, the explicit default configuration of a session

pub mod error;
pub mod link;
pub mod response;
pub mod tuning;
pub mod units;
pub mod waveform;

pub use error::*;
pub use link::*;
pub use response::*;
pub use tuning::*;
pub use units::*;
pub use waveform::*;

/// Re-export num_complex for convenience
pub use num_complex::Complex64;
