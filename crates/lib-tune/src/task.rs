//! Optimization task kinds, their states and their objective functions.

use crate::error::{TuneError, TuneResult};
use crate::session::TuningSession;
use crate::solver::{clamp_to_bounds, OptimizationCallback, Problem};
use lib_types::{CtleMode, EqTuning};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// The three searches a coordinator can run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TaskKind {
    /// Enabled Tx FFE tap values.
    TxTaps,
    /// Rx CTLE peak magnitude.
    RxCtle,
    /// Tx taps and CTLE peak magnitude together.
    CoOptimize,
}

impl TaskKind {
    pub const ALL: [TaskKind; 3] = [TaskKind::TxTaps, TaskKind::RxCtle, TaskKind::CoOptimize];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TxTaps => "tx",
            Self::RxCtle => "rx",
            Self::CoOptimize => "coopt",
        }
    }

    /// Status line published when the task starts.
    pub fn start_message(&self) -> &'static str {
        match self {
            Self::TxTaps => "Optimizing Tx...",
            Self::RxCtle => "Optimizing Rx...",
            Self::CoOptimize => "Co-optimizing...",
        }
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            Self::TxTaps => 0,
            Self::RxCtle => 1,
            Self::CoOptimize => 2,
        }
    }

    /// Why this task cannot start from `tuning`, if it cannot.
    pub fn prerequisite(&self, tuning: &EqTuning) -> Option<String> {
        match self {
            Self::TxTaps if tuning.enabled_tap_indices().is_empty() => {
                Some("no Tx taps are enabled".to_string())
            }
            Self::RxCtle if tuning.ctle.mode == CtleMode::Off => Some("CTLE mode is off".to_string()),
            _ => None,
        }
    }

    fn tunes_taps(&self) -> bool {
        matches!(self, Self::TxTaps | Self::CoOptimize)
    }

    fn tunes_ctle(&self) -> bool {
        matches!(self, Self::RxCtle | Self::CoOptimize)
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of one task kind.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum TaskState {
    #[default]
    Idle,
    Running,
    Succeeded,
    Failed(String),
    Cancelled,
}

impl TaskState {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed(_) | Self::Cancelled)
    }

    /// Status line for a terminal state.
    pub fn message(&self) -> Option<String> {
        match self {
            Self::Succeeded => Some("Optimization succeeded.".to_string()),
            Self::Failed(reason) => Some(format!("Optimization failed: {}", reason)),
            Self::Cancelled => Some("Optimization cancelled.".to_string()),
            Self::Idle | Self::Running => None,
        }
    }
}

/// Final outcome of a task run.
#[derive(Clone, Debug, PartialEq)]
pub struct TaskReport {
    pub kind: TaskKind,
    pub state: TaskState,
    /// Minimizer message, or the error that ended the run.
    pub message: String,
    /// Lowest cost evaluated, if any evaluation completed.
    pub best_cost: Option<f64>,
    /// Free variables at `best_cost`: enabled tap values, then the CTLE
    /// peak magnitude when it is searched.
    pub best_params: Vec<f64>,
    pub evaluations: usize,
}

impl TaskReport {
    pub fn success(&self) -> bool {
        self.state == TaskState::Succeeded
    }
}

/// Objective of one task run over a frozen set of free variables.
///
/// Every evaluation writes the candidate into the session's live tuning and
/// scores a snapshot of it, so observers see in-progress values.
pub(crate) struct TuningProblem<'a> {
    session: &'a TuningSession,
    cancel: &'a AtomicBool,
    /// Tuner indices of the tap variables, fixed at task start.
    taps: Vec<usize>,
    tunes_ctle: bool,
    tap_budget: f64,
    initial: Vec<f64>,
    bounds: Vec<(f64, f64)>,
    best: RefCell<Option<(Vec<f64>, f64)>>,
    evaluations: Cell<usize>,
}

impl<'a> TuningProblem<'a> {
    pub(crate) fn new(session: &'a TuningSession, kind: TaskKind, cancel: &'a AtomicBool) -> Self {
        let tuning = session.tuning();
        let optimizer = &session.config().optimizer;

        let taps = if kind.tunes_taps() {
            tuning.enabled_tap_indices()
        } else {
            Vec::new()
        };
        let mut initial: Vec<f64> = taps.iter().map(|&i| tuning.tx_taps[i].value).collect();
        let mut bounds: Vec<(f64, f64)> = taps
            .iter()
            .map(|&i| (tuning.tx_taps[i].min_val, tuning.tx_taps[i].max_val))
            .collect();
        if kind.tunes_ctle() {
            initial.push(tuning.ctle.peak_mag_db);
            bounds.push((0.0, optimizer.max_ctle_peak_db));
        }

        let mut problem = Self {
            session,
            cancel,
            taps,
            tunes_ctle: kind.tunes_ctle(),
            tap_budget: optimizer.tap_budget,
            initial: Vec::new(),
            bounds,
            best: RefCell::new(None),
            evaluations: Cell::new(0),
        };
        // The seed is scored and may be restored, so it must be feasible too.
        clamp_to_bounds(&mut initial, &problem.bounds);
        problem.apply_constraints(&mut initial);
        problem.initial = initial;
        problem
    }

    /// Write `params` into the live tuning and return a snapshot.
    fn apply(&self, params: &[f64]) -> EqTuning {
        self.session.update_tuning(|t| {
            for (&i, &v) in self.taps.iter().zip(params) {
                if let Some(tap) = t.tx_taps.get_mut(i) {
                    tap.value = v;
                }
            }
            if self.tunes_ctle {
                if let Some(&peak) = params.get(self.taps.len()) {
                    t.ctle.peak_mag_db = peak;
                }
            }
            t.clone()
        })
    }

    /// Put the best evaluated point back into the live tuning.
    pub(crate) fn restore_best(&self) -> Option<(Vec<f64>, f64)> {
        let best = self.best.borrow().clone();
        if let Some((params, _)) = &best {
            self.apply(params);
        }
        best
    }

    pub(crate) fn evaluations(&self) -> usize {
        self.evaluations.get()
    }
}

impl Problem for TuningProblem<'_> {
    fn cost(&self, params: &[f64]) -> TuneResult<f64> {
        if self.cancel.load(Ordering::Acquire) {
            return Err(TuneError::Cancelled);
        }

        let tuning = self.apply(params);
        let cost = self.session.evaluate(&tuning)?.cost;
        self.evaluations.set(self.evaluations.get() + 1);

        let mut best = self.best.borrow_mut();
        if best.as_ref().map_or(true, |(_, c)| cost < *c) {
            *best = Some((params.to_vec(), cost));
        }
        Ok(cost)
    }

    fn num_params(&self) -> usize {
        self.initial.len()
    }

    fn initial_params(&self) -> &[f64] {
        &self.initial
    }

    fn bounds(&self) -> &[(f64, f64)] {
        &self.bounds
    }

    /// Scale the tap prefix so the sum of absolute tap values stays within
    /// the tap budget.
    fn apply_constraints(&self, params: &mut [f64]) {
        let n = self.taps.len().min(params.len());
        let total: f64 = params[..n].iter().map(|v| v.abs()).sum();
        if total > self.tap_budget {
            let scale = self.tap_budget / total;
            for v in params[..n].iter_mut() {
                *v *= scale;
            }
        }
    }
}

/// Logs progress and stops the minimizer once cancellation is requested.
pub(crate) struct ProgressCallback<'a> {
    pub(crate) kind: TaskKind,
    pub(crate) cancel: &'a AtomicBool,
}

impl OptimizationCallback for ProgressCallback<'_> {
    fn on_iteration(&mut self, iteration: u32, params: &[f64], cost: f64) -> TuneResult<()> {
        debug!(task = %self.kind, iteration, cost, ?params, "optimizer iteration");
        Ok(())
    }

    fn should_stop(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }
}
