use crate::error::TuneResult;

/// Outcome of one minimizer run.
#[derive(Clone, Debug)]
pub struct SolverResult {
    /// The minimizer met its convergence test.
    pub success: bool,
    pub cost: f64,
    pub iterations: u32,
    pub message: String,
    pub params: Vec<f64>,
    pub cost_evals: usize,
}

/// Progress hook called once per minimizer iteration.
pub trait OptimizationCallback {
    /// Called at each iteration with the current best parameters and cost.
    fn on_iteration(&mut self, iteration: u32, params: &[f64], cost: f64) -> TuneResult<()>;

    /// Check if optimization should stop early.
    fn should_stop(&self) -> bool {
        false
    }
}

/// A bounded minimization problem.
pub trait Problem {
    /// Evaluate the objective at `params`.
    fn cost(&self, params: &[f64]) -> TuneResult<f64>;

    fn num_params(&self) -> usize;

    fn initial_params(&self) -> &[f64];

    /// `(min, max)` for each parameter.
    fn bounds(&self) -> &[(f64, f64)];

    /// Project `params` onto the feasible set. Called after clamping to
    /// [`Problem::bounds`].
    fn apply_constraints(&self, _params: &mut [f64]) {}
}

/// Minimizer interface.
pub trait Solver {
    fn name(&self) -> &str;

    fn solve(
        &mut self,
        problem: &dyn Problem,
        callback: &mut dyn OptimizationCallback,
    ) -> TuneResult<SolverResult>;
}

/// Clamp each parameter into its bounds.
#[inline]
pub fn clamp_to_bounds(params: &mut [f64], bounds: &[(f64, f64)]) {
    for (p, &(min, max)) in params.iter_mut().zip(bounds) {
        *p = p.clamp(min, max);
    }
}

/// Callback that never interrupts.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopCallback;

impl OptimizationCallback for NoopCallback {
    fn on_iteration(&mut self, _iteration: u32, _params: &[f64], _cost: f64) -> TuneResult<()> {
        Ok(())
    }
}
