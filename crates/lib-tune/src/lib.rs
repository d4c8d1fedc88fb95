//! # lib-tune
//!
//! Equalizer tuning on top of `lib-dsp`:
//!
//! - **Configuration**: `LinkConfig` loading from TOML or JSON
//! - **Session**: the channel computed once, live and committed equalizer
//!   settings, and the FFE -> channel -> CTLE -> cost pipeline
//! - **Solvers**: bounded Brent and constrained Nelder–Mead minimizers
//! - **Coordinator**: cancellable background Tx, Rx and joint searches
//!   sharing one optimization slot
//!
//! ```no_run
//! use lib_tune::{OptimizationCoordinator, TaskKind, TuningSession};
//! use lib_types::LinkConfig;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let session = Arc::new(TuningSession::open(LinkConfig::default())?);
//! let coordinator = OptimizationCoordinator::new(session.clone());
//! coordinator.start(TaskKind::TxTaps);
//! if let Some(report) = coordinator.wait(TaskKind::TxTaps, Duration::from_secs(60)) {
//!     println!("{}: cost {:?}", coordinator.status_message(), report.best_cost);
//! }
//! # Ok::<(), lib_tune::TuneError>(())
//! ```

pub mod config;
pub mod coordinator;
pub mod error;
pub mod session;
pub mod solver;
pub mod task;

mod sync;

pub use config::{load_config, validate_config};
pub use coordinator::{OptimizationCoordinator, StartOutcome};
pub use error::{TuneError, TuneResult};
pub use session::TuningSession;
pub use task::{TaskKind, TaskReport, TaskState};
