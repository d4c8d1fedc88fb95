//! # lib-import
//!
//! Measured channel waveforms for link equalization tuning.
//!
//! Reads two-column `time, amplitude` text files (step or impulse
//! responses exported by a circuit simulator or a scope) and resamples them
//! onto the simulation time step. Parsing uses the `nom` parser combinator
//! library.

pub mod csv;
pub mod error;

pub use csv::{parse_waveform_csv, parse_waveform_csv_file, CsvImporter, WaveformTable};
pub use error::ParseError;
