//! # lib-dsp
//!
//! Signal processing core of link equalization tuning:
//!
//! - **FFT/IFFT** over arbitrary-length simulation grids
//! - **Convolution**: direct or FFT, picked by operand size
//! - **Channel model**: lossy-line or measured impulse responses, trimmed
//!   and normalized to unit DC gain
//! - **Equalizer synthesis**: Tx FFE taps and Rx CTLE responses
//! - **Cost**: the Hula-Hoop residual ISI estimate

pub mod channel;
pub mod compose;
pub mod convolution;
pub mod cost;
pub mod ctle;
pub mod equalizer;
pub mod error;
pub mod ffe;
pub mod fft;
pub mod grid;

pub use channel::{ChannelModel, ChannelResponse, ChannelSource, WaveformImporter};
pub use compose::compose;
pub use cost::{CostEvaluator, NullSink, SeriesSink, SeriesStore};
pub use equalizer::EqualizerSynthesizer;
pub use error::{DspError, DspResult};
pub use fft::FftEngine;
pub use grid::SimulationGrid;
