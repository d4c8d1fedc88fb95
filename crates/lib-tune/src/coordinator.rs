//! Background optimization tasks.
//!
//! The coordinator owns a single optimization slot: at most one task of any
//! kind runs at a time, because Tx-tap, Rx-CTLE and joint searches all write
//! the same live tuning. Each task runs on its own thread, checks a
//! cancellation flag before every objective evaluation and delivers a
//! [`TaskReport`] over a channel when it ends.
//!
//! Status strings are last-write-wins and meant to be polled.

use crate::session::TuningSession;
use crate::solver::{BoundedScalar, ConstrainedSimplex, Problem, Solver, SolverResult};
use crate::sync::RecoverMutex;
use crate::task::{ProgressCallback, TaskKind, TaskReport, TaskState, TuningProblem};
use crossbeam::channel::{self, Receiver};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{info, warn};

/// Result of [`OptimizationCoordinator::start`]. Everything but `Started`
/// leaves the session untouched.
#[derive(Clone, Debug, PartialEq)]
pub enum StartOutcome {
    Started,
    /// The same kind is already running.
    AlreadyRunning,
    /// Another kind holds the optimization slot.
    Busy(TaskKind),
    PrerequisiteUnmet(String),
}

struct ActiveTask {
    kind: TaskKind,
    cancel: Arc<AtomicBool>,
    reports: Receiver<TaskReport>,
}

#[derive(Default)]
struct Shared {
    slot: Mutex<Option<ActiveTask>>,
    states: Mutex<[TaskState; 3]>,
    last_reports: Mutex<[Option<TaskReport>; 3]>,
    status: Mutex<String>,
}

impl Shared {
    fn set_status(&self, message: impl Into<String>) {
        *self.status.lock_recover() = message.into();
    }

    /// Record a finished run and free the slot.
    fn finish(&self, report: &TaskReport) {
        let kind = report.kind;
        self.states.lock_recover()[kind.index()] = report.state.clone();
        self.last_reports.lock_recover()[kind.index()] = Some(report.clone());
        if let Some(message) = report.state.message() {
            self.set_status(message);
        }

        let mut slot = self.slot.lock_recover();
        if slot.as_ref().map_or(false, |active| active.kind == kind) {
            *slot = None;
        }
    }
}

/// Starts, tracks and cancels optimization tasks on a [`TuningSession`].
pub struct OptimizationCoordinator {
    session: Arc<TuningSession>,
    shared: Arc<Shared>,
}

impl OptimizationCoordinator {
    pub fn new(session: Arc<TuningSession>) -> Self {
        Self {
            session,
            shared: Arc::new(Shared::default()),
        }
    }

    pub fn session(&self) -> &Arc<TuningSession> {
        &self.session
    }

    /// Start a task of `kind` unless the slot is taken or its prerequisite
    /// is unmet.
    pub fn start(&self, kind: TaskKind) -> StartOutcome {
        let mut slot = self.shared.slot.lock_recover();
        if let Some(active) = slot.as_ref() {
            return if active.kind == kind {
                StartOutcome::AlreadyRunning
            } else {
                StartOutcome::Busy(active.kind)
            };
        }
        if let Some(reason) = kind.prerequisite(&self.session.tuning()) {
            info!(task = %kind, %reason, "optimization not started");
            return StartOutcome::PrerequisiteUnmet(reason);
        }

        let cancel = Arc::new(AtomicBool::new(false));
        let (tx, rx) = channel::bounded(1);
        self.shared.states.lock_recover()[kind.index()] = TaskState::Running;
        self.shared.set_status(kind.start_message());
        info!(task = %kind, "optimization started");

        let session = Arc::clone(&self.session);
        let shared = Arc::clone(&self.shared);
        let flag = Arc::clone(&cancel);
        // The slot lock is held until the task is registered, so the worker
        // cannot free the slot before it is filled.
        std::thread::spawn(move || {
            let report = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                run_task(&session, kind, &flag)
            }))
            .unwrap_or_else(|panic_info| {
                let message = if let Some(s) = panic_info.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = panic_info.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "Unknown panic".to_string()
                };
                warn!(task = %kind, %message, "optimization task panicked");
                TaskReport {
                    kind,
                    state: TaskState::Failed(message.clone()),
                    message,
                    best_cost: None,
                    best_params: Vec::new(),
                    evaluations: 0,
                }
            });

            info!(
                task = %kind,
                state = ?report.state,
                best_cost = ?report.best_cost,
                evaluations = report.evaluations,
                "optimization finished"
            );
            shared.finish(&report);
            // Nobody may be waiting; a dropped receiver is fine.
            let _ = tx.send(report);
        });

        *slot = Some(ActiveTask {
            kind,
            cancel,
            reports: rx,
        });
        StartOutcome::Started
    }

    /// Current state of `kind`.
    pub fn status(&self, kind: TaskKind) -> TaskState {
        self.shared.states.lock_recover()[kind.index()].clone()
    }

    /// Ask a running task of `kind` to stop. Returns whether one was running.
    pub fn cancel(&self, kind: TaskKind) -> bool {
        let slot = self.shared.slot.lock_recover();
        match slot.as_ref() {
            Some(active) if active.kind == kind => {
                active.cancel.store(true, Ordering::Release);
                info!(task = %kind, "optimization cancellation requested");
                true
            }
            _ => false,
        }
    }

    /// Wait up to `timeout` for the current or last run of `kind` to end.
    ///
    /// Returns `None` on timeout, or when `kind` has never run.
    pub fn wait(&self, kind: TaskKind, timeout: Duration) -> Option<TaskReport> {
        let reports = {
            let slot = self.shared.slot.lock_recover();
            match slot.as_ref() {
                Some(active) if active.kind == kind => Some(active.reports.clone()),
                _ => None,
            }
        };
        match reports {
            Some(rx) => rx
                .recv_timeout(timeout)
                .ok()
                .or_else(|| self.last_report(kind)),
            None => self.last_report(kind),
        }
    }

    /// Latest status line.
    pub fn status_message(&self) -> String {
        self.shared.status.lock_recover().clone()
    }

    /// Whether any task holds the optimization slot.
    pub fn is_busy(&self) -> bool {
        self.shared.slot.lock_recover().is_some()
    }

    fn last_report(&self, kind: TaskKind) -> Option<TaskReport> {
        let report = self.shared.last_reports.lock_recover()[kind.index()].clone();
        // A report from an earlier run is not an answer while a new one runs.
        report.filter(|_| !self.status(kind).is_running())
    }
}

impl Drop for OptimizationCoordinator {
    fn drop(&mut self) {
        if let Some(active) = self.shared.slot.lock_recover().as_ref() {
            active.cancel.store(true, Ordering::Release);
        }
    }
}

impl std::fmt::Debug for OptimizationCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OptimizationCoordinator")
            .field("busy", &self.is_busy())
            .field("status", &self.status_message())
            .finish()
    }
}

/// Run one optimization to completion on the calling thread.
fn run_task(session: &TuningSession, kind: TaskKind, cancel: &AtomicBool) -> TaskReport {
    let max_iter = session.config().optimizer.max_iter;
    let problem = TuningProblem::new(session, kind, cancel);

    // The seed is scored first so the best point is never worse than it.
    let outcome = problem.cost(problem.initial_params()).and_then(|_| {
        if max_iter == 0 {
            return Ok(None);
        }
        // `max_iter` follows the gradient-method convention: one iteration
        // costs about n + 1 evaluations, so the simplex gets that many steps
        // per iteration. The bounded scalar search counts evaluations.
        let mut solver: Box<dyn Solver> = match kind {
            TaskKind::RxCtle => Box::new(BoundedScalar::new(max_iter)),
            TaskKind::TxTaps | TaskKind::CoOptimize => Box::new(ConstrainedSimplex::new(
                max_iter.saturating_mul(problem.num_params() + 1),
            )),
        };
        let mut callback = ProgressCallback { kind, cancel };
        solver.solve(&problem, &mut callback).map(Some)
    });

    let best = problem.restore_best();
    let cancelled = cancel.load(Ordering::Acquire);
    let (state, message) = match outcome {
        Err(e) if e.is_cancelled() => (TaskState::Cancelled, e.to_string()),
        Err(e) => (TaskState::Failed(e.to_string()), e.to_string()),
        Ok(_) if cancelled => (TaskState::Cancelled, "Optimization cancelled".to_string()),
        Ok(None) => (TaskState::Succeeded, "No iterations requested".to_string()),
        Ok(Some(SolverResult { success: true, message, .. })) => (TaskState::Succeeded, message),
        Ok(Some(SolverResult { message, .. })) => (TaskState::Failed(message.clone()), message),
    };

    let (best_params, best_cost) = match best {
        Some((params, cost)) => (params, Some(cost)),
        None => (Vec::new(), None),
    };
    TaskReport {
        kind,
        state,
        message,
        best_cost,
        best_params,
        evaluations: problem.evaluations(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::tests::small_config;
    use crossbeam::channel::Sender;
    use lib_dsp::SeriesSink;
    use lib_types::{CtleMode, LinkConfig};

    const WAIT: Duration = Duration::from_secs(120);

    fn coordinator(config: LinkConfig) -> OptimizationCoordinator {
        OptimizationCoordinator::new(Arc::new(TuningSession::open(config).unwrap()))
    }

    #[test]
    fn test_zero_iterations_keeps_seed() {
        let mut config = small_config();
        config.optimizer.max_iter = 0;
        config.tx.taps[0].value = -0.05;
        let coord = coordinator(config);
        let seed = coord.session().tuning();
        let seed_cost = coord.session().cost().unwrap();

        assert_eq!(coord.start(TaskKind::TxTaps), StartOutcome::Started);
        let report = coord.wait(TaskKind::TxTaps, WAIT).unwrap();

        assert_eq!(report.state, TaskState::Succeeded);
        assert_eq!(report.evaluations, 1);
        assert_eq!(report.best_cost, Some(seed_cost));
        assert_eq!(report.best_params, vec![-0.05]);
        assert_eq!(coord.session().tuning(), seed);
        assert_eq!(coord.session().cost().unwrap(), seed_cost);
        assert_eq!(coord.status_message(), "Optimization succeeded.");
        assert!(!coord.is_busy());
    }

    #[test]
    fn test_tx_search_never_worsens_cost() {
        let mut config = small_config();
        config.optimizer.max_iter = 20;
        let coord = coordinator(config);
        let seed_cost = coord.session().cost().unwrap();

        assert_eq!(coord.start(TaskKind::TxTaps), StartOutcome::Started);
        let report = coord.wait(TaskKind::TxTaps, WAIT).unwrap();

        assert!(report.state.is_terminal());
        assert_ne!(report.state, TaskState::Cancelled);
        // Seed, initial simplex, then at most three calls per iteration.
        assert!(report.evaluations <= 1 + 2 + 40 * 3);
        let best = report.best_cost.unwrap();
        assert!(best <= seed_cost);
        assert_eq!(coord.session().cost().unwrap(), best);

        let taps = coord.session().tuning().tx_taps;
        assert_eq!(taps[0].value, report.best_params[0]);
        assert!(taps[0].value.abs() <= 0.2);
        assert_eq!(coord.status(TaskKind::TxTaps), report.state);
        assert_eq!(coord.status_message(), report.state.message().unwrap());
    }

    #[test]
    fn test_rx_search_stays_in_bounds() {
        let mut config = small_config();
        config.rx.ctle.mode = CtleMode::Agc;
        config.rx.ctle.peak_mag_db = 3.0;
        config.optimizer.max_iter = 15;
        let coord = coordinator(config);
        let seed_cost = coord.session().cost().unwrap();

        assert_eq!(coord.start(TaskKind::RxCtle), StartOutcome::Started);
        let report = coord.wait(TaskKind::RxCtle, WAIT).unwrap();

        assert!(report.state.is_terminal());
        assert!(report.best_cost.unwrap() <= seed_cost);
        let peak = coord.session().tuning().ctle.peak_mag_db;
        assert!((0.0..=20.0).contains(&peak));
        assert_eq!(peak, report.best_params[0]);
    }

    #[test]
    fn test_coopt_respects_tap_budget() {
        let mut config = small_config();
        config.tx.taps[1].enabled = true;
        config.rx.ctle.mode = CtleMode::Agc;
        config.optimizer.max_iter = 15;
        let coord = coordinator(config);

        assert_eq!(coord.start(TaskKind::CoOptimize), StartOutcome::Started);
        let report = coord.wait(TaskKind::CoOptimize, WAIT).unwrap();

        assert!(report.state.is_terminal());
        assert_eq!(report.best_params.len(), 3);
        let tuning = coord.session().tuning();
        let total: f64 = tuning.tx_taps.iter().map(|t| t.effective_value().abs()).sum();
        assert!(total <= 0.7 + 1e-12);
        assert_eq!(tuning.ctle.peak_mag_db, report.best_params[2]);
    }

    #[test]
    fn test_default_budget_converges() {
        let coord = coordinator(small_config());
        assert_eq!(coord.session().config().optimizer.max_iter, 50);

        assert_eq!(coord.start(TaskKind::CoOptimize), StartOutcome::Started);
        let report = coord.wait(TaskKind::CoOptimize, WAIT).unwrap();
        assert_eq!(report.state, TaskState::Succeeded, "{}", report.message);
        assert_eq!(report.best_params.len(), 2);
    }

    #[test]
    fn test_four_tap_search_converges_without_dfe() {
        let mut config = small_config();
        for tap in &mut config.tx.taps {
            tap.enabled = true;
        }
        let coord = coordinator(config);
        coord.session().set_use_dfe(false);
        let seed_cost = coord.session().cost().unwrap();

        assert_eq!(coord.start(TaskKind::TxTaps), StartOutcome::Started);
        let report = coord.wait(TaskKind::TxTaps, WAIT).unwrap();
        assert_eq!(report.state, TaskState::Succeeded, "{}", report.message);
        assert_eq!(report.best_params.len(), 4);
        assert!(report.best_cost.unwrap() < seed_cost);
    }

    #[test]
    fn test_prerequisites_block_start() {
        let mut config = small_config();
        config.tx.taps[0].enabled = false;
        let coord = coordinator(config);

        assert!(matches!(
            coord.start(TaskKind::TxTaps),
            StartOutcome::PrerequisiteUnmet(_)
        ));
        assert!(matches!(
            coord.start(TaskKind::RxCtle),
            StartOutcome::PrerequisiteUnmet(_)
        ));
        assert_eq!(coord.status(TaskKind::TxTaps), TaskState::Idle);
        assert_eq!(coord.status(TaskKind::RxCtle), TaskState::Idle);
        assert!(!coord.is_busy());
        assert!(coord.wait(TaskKind::TxTaps, Duration::from_millis(10)).is_none());
    }

    /// While armed, announces every published series and then blocks until
    /// the gate is dropped.
    struct GateSink {
        armed: AtomicBool,
        entered: Sender<()>,
        gate: Receiver<()>,
    }

    impl SeriesSink for GateSink {
        fn set(&self, _name: &str, _values: Vec<f64>) {
            if self.armed.load(Ordering::Acquire) {
                let _ = self.entered.send(());
                let _ = self.gate.recv();
            }
        }
    }

    #[test]
    fn test_single_slot_and_cancellation() {
        let mut config = small_config();
        config.optimizer.max_iter = 1_000_000;
        let (release, gate) = channel::unbounded();
        let (entered, parked) = channel::unbounded();
        let sink = Arc::new(GateSink {
            armed: AtomicBool::new(false),
            entered,
            gate,
        });
        let session = TuningSession::new(config, None, sink.clone()).unwrap();
        let seed_cost = session.cost().unwrap();
        let coord = OptimizationCoordinator::new(Arc::new(session));

        // The worker parks inside its first evaluation until released.
        sink.armed.store(true, Ordering::Release);
        assert_eq!(coord.start(TaskKind::CoOptimize), StartOutcome::Started);
        parked.recv_timeout(WAIT).unwrap();
        assert!(coord.is_busy());
        assert_eq!(coord.status(TaskKind::CoOptimize), TaskState::Running);
        assert_eq!(coord.status_message(), "Co-optimizing...");

        assert_eq!(coord.start(TaskKind::CoOptimize), StartOutcome::AlreadyRunning);
        assert_eq!(
            coord.start(TaskKind::TxTaps),
            StartOutcome::Busy(TaskKind::CoOptimize)
        );
        assert!(!coord.cancel(TaskKind::TxTaps));
        assert!(coord.wait(TaskKind::CoOptimize, Duration::from_millis(10)).is_none());

        assert!(coord.cancel(TaskKind::CoOptimize));
        drop(release);
        let report = coord.wait(TaskKind::CoOptimize, WAIT).unwrap();
        assert_eq!(report.state, TaskState::Cancelled);
        assert_eq!(report.evaluations, 1);
        assert_eq!(report.best_cost, Some(seed_cost));
        assert_eq!(coord.status_message(), "Optimization cancelled.");
        assert!(!coord.is_busy());

        // The slot is free again.
        assert_eq!(coord.start(TaskKind::TxTaps), StartOutcome::Started);
        coord.cancel(TaskKind::TxTaps);
        assert!(coord.wait(TaskKind::TxTaps, WAIT).is_some());
    }

    #[test]
    fn test_wait_after_finish_returns_last_report() {
        let mut config = small_config();
        config.optimizer.max_iter = 0;
        let coord = coordinator(config);

        coord.start(TaskKind::TxTaps);
        let first = coord.wait(TaskKind::TxTaps, WAIT).unwrap();
        let again = coord.wait(TaskKind::TxTaps, Duration::from_millis(10)).unwrap();
        assert_eq!(first, again);
    }
}
