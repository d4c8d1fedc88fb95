use super::traits::{clamp_to_bounds, OptimizationCallback, Problem, Solver, SolverResult};
use crate::error::TuneResult;

const REFLECT: f64 = 1.0;
const EXPAND: f64 = 2.0;
const CONTRACT: f64 = 0.5;
const SHRINK: f64 = 0.5;

/// Initial simplex edge as a fraction of each parameter's bound width.
const INITIAL_STEP: f64 = 0.1;

/// Nelder–Mead over a bounded box with projected trial points.
///
/// Every vertex is clamped to the bounds and then passed through
/// [`Problem::apply_constraints`] before it is evaluated, so the objective
/// only ever sees feasible points.
///
/// Converged once the vertex costs agree within `fatol` and either the
/// vertices agree within `xatol` or the best cost has not moved for
/// `2 (n + 1)` iterations. The second case covers directions the cost does
/// not depend on, where the simplex cannot collapse.
pub struct ConstrainedSimplex {
    max_iter: usize,
    max_evals: Option<usize>,
    xatol: f64,
    fatol: f64,
}

impl ConstrainedSimplex {
    /// Search for at most `max_iter` simplex steps.
    pub fn new(max_iter: usize) -> Self {
        Self {
            max_iter,
            max_evals: None,
            xatol: 1e-4,
            fatol: 1e-4,
        }
    }

    /// Also stop after `max_evals` objective calls.
    pub fn with_max_evals(mut self, max_evals: usize) -> Self {
        self.max_evals = Some(max_evals);
        self
    }
}

/// Objective calls left in the run.
struct Budget<'a> {
    problem: &'a dyn Problem,
    used: usize,
    max: usize,
}

impl Budget<'_> {
    fn project(&self, x: &mut [f64]) {
        clamp_to_bounds(x, self.problem.bounds());
        self.problem.apply_constraints(x);
    }

    /// Project and evaluate `x`, or `None` once the budget is spent.
    fn eval(&mut self, x: &mut [f64]) -> TuneResult<Option<f64>> {
        if self.used >= self.max {
            return Ok(None);
        }
        self.project(x);
        self.used += 1;
        self.problem.cost(x).map(Some)
    }
}

/// `c + coef * (x - c)`
fn along(c: &[f64], x: &[f64], coef: f64) -> Vec<f64> {
    c.iter().zip(x).map(|(c, x)| c + coef * (x - c)).collect()
}

impl Solver for ConstrainedSimplex {
    fn name(&self) -> &str {
        "ConstrainedNelderMead"
    }

    fn solve(
        &mut self,
        problem: &dyn Problem,
        callback: &mut dyn OptimizationCallback,
    ) -> TuneResult<SolverResult> {
        let n = problem.num_params();
        let bounds = problem.bounds();
        let mut budget = Budget {
            problem,
            used: 0,
            max: self.max_evals.map_or(usize::MAX, |m| m.max(1)),
        };

        let mut x0 = problem.initial_params().to_vec();
        budget.project(&mut x0);
        let f0 = problem.cost(&x0)?;
        budget.used = 1;
        if n == 0 {
            return Ok(SolverResult {
                success: true,
                cost: f0,
                iterations: 0,
                message: "No free parameters.".to_string(),
                params: x0,
                cost_evals: budget.used,
            });
        }

        let mut simplex: Vec<(Vec<f64>, f64)> = Vec::with_capacity(n + 1);
        simplex.push((x0.clone(), f0));
        let mut exhausted = false;
        for (i, &(lo, hi)) in bounds.iter().enumerate().take(n) {
            let mut x = x0.clone();
            let step = INITIAL_STEP * (hi - lo);
            x[i] = if x0[i] + step <= hi { x0[i] + step } else { x0[i] - step };
            match budget.eval(&mut x)? {
                Some(f) => simplex.push((x, f)),
                None => {
                    exhausted = true;
                    break;
                }
            }
        }

        let stall_limit = 2 * (n + 1);
        let mut stalled = 0;
        let mut last_best = f64::INFINITY;
        let mut iterations = 0;
        let (success, message) = loop {
            simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
            if exhausted {
                break (false, "Maximum number of function evaluations reached".to_string());
            }

            let (best, f_best) = &simplex[0];
            if *f_best < last_best {
                stalled = 0;
                last_best = *f_best;
            } else {
                stalled += 1;
            }
            let x_spread = simplex[1..]
                .iter()
                .flat_map(|(x, _)| x.iter().zip(best).map(|(a, b)| (a - b).abs()))
                .fold(0.0, f64::max);
            let f_spread = simplex[1..]
                .iter()
                .map(|(_, f)| (f - f_best).abs())
                .fold(0.0, f64::max);
            if f_spread <= self.fatol && (x_spread <= self.xatol || stalled >= stall_limit) {
                break (true, "Optimization terminated successfully.".to_string());
            }
            if callback.should_stop() {
                break (false, "Stopped by callback".to_string());
            }
            if iterations as usize >= self.max_iter {
                break (false, "Iteration limit reached".to_string());
            }

            let worst = simplex.len() - 1;
            let mut centroid = vec![0.0; n];
            for (x, _) in &simplex[..worst] {
                for (c, v) in centroid.iter_mut().zip(x) {
                    *c += v / worst as f64;
                }
            }
            let (x_worst, f_worst) = simplex[worst].clone();
            let f_second = simplex[worst - 1].1;

            let mut xr = along(&centroid, &x_worst, -REFLECT);
            let Some(fr) = budget.eval(&mut xr)? else {
                exhausted = true;
                continue;
            };

            if fr < simplex[0].1 {
                let mut xe = along(&centroid, &x_worst, -EXPAND);
                match budget.eval(&mut xe)? {
                    Some(fe) if fe < fr => simplex[worst] = (xe, fe),
                    Some(_) => simplex[worst] = (xr, fr),
                    None => {
                        simplex[worst] = (xr, fr);
                        exhausted = true;
                    }
                }
            } else if fr < f_second {
                simplex[worst] = (xr, fr);
            } else {
                // Outside when the reflection helped at all. An inside
                // contraction must strictly beat the worst vertex.
                let outside = fr < f_worst;
                let (mut xc, limit) = if outside {
                    (along(&centroid, &xr, CONTRACT), fr)
                } else {
                    (along(&centroid, &x_worst, CONTRACT), f_worst)
                };
                match budget.eval(&mut xc)? {
                    Some(fc) if fc < limit || (outside && fc == limit) => simplex[worst] = (xc, fc),
                    Some(_) => {
                        let x_best = simplex[0].0.clone();
                        for vertex in simplex.iter_mut().skip(1) {
                            let mut xs = along(&x_best, &vertex.0, SHRINK);
                            match budget.eval(&mut xs)? {
                                Some(fs) => *vertex = (xs, fs),
                                None => {
                                    exhausted = true;
                                    break;
                                }
                            }
                        }
                    }
                    None => exhausted = true,
                }
            }

            iterations += 1;
            let (x_best, f_best) = simplex
                .iter()
                .min_by(|a, b| a.1.total_cmp(&b.1))
                .map(|(x, f)| (x.as_slice(), *f))
                .unwrap_or((x0.as_slice(), f0));
            callback.on_iteration(iterations, x_best, f_best)?;
        };

        let (params, cost) = simplex.swap_remove(0);
        Ok(SolverResult {
            success,
            cost,
            iterations,
            message,
            params,
            cost_evals: budget.used,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TuneError;
    use crate::solver::NoopCallback;

    /// `(x - a)^2 + (y - b)^2` on a box, optionally with `|x| + |y| <= limit`.
    struct Bowl {
        centre: Vec<f64>,
        start: Vec<f64>,
        bounds: Vec<(f64, f64)>,
        limit: Option<f64>,
    }

    impl Bowl {
        fn new(centre: &[f64]) -> Self {
            Self {
                centre: centre.to_vec(),
                start: vec![0.0; centre.len()],
                bounds: vec![(-1.0, 1.0); centre.len()],
                limit: None,
            }
        }
    }

    impl Problem for Bowl {
        fn cost(&self, params: &[f64]) -> TuneResult<f64> {
            if let Some(limit) = self.limit {
                let total: f64 = params.iter().map(|v| v.abs()).sum();
                assert!(total <= limit + 1e-12, "infeasible point {:?}", params);
            }
            Ok(params
                .iter()
                .zip(&self.centre)
                .map(|(p, c)| (p - c).powi(2))
                .sum())
        }

        fn num_params(&self) -> usize {
            self.centre.len()
        }

        fn initial_params(&self) -> &[f64] {
            &self.start
        }

        fn bounds(&self) -> &[(f64, f64)] {
            &self.bounds
        }

        fn apply_constraints(&self, params: &mut [f64]) {
            if let Some(limit) = self.limit {
                let total: f64 = params.iter().map(|v| v.abs()).sum();
                if total > limit {
                    for p in params.iter_mut() {
                        *p *= limit / total;
                    }
                }
            }
        }
    }

    #[test]
    fn test_unconstrained_minimum() {
        let problem = Bowl::new(&[0.3, -0.2]);
        let result = ConstrainedSimplex::new(500)
            .solve(&problem, &mut NoopCallback)
            .unwrap();

        assert!(result.success, "{}", result.message);
        assert!((result.params[0] - 0.3).abs() < 1e-3);
        assert!((result.params[1] + 0.2).abs() < 1e-3);
        assert!(result.cost_evals <= 500);
    }

    #[test]
    fn test_bound_active() {
        let problem = Bowl::new(&[1.5]);
        let result = ConstrainedSimplex::new(500)
            .solve(&problem, &mut NoopCallback)
            .unwrap();

        assert!(result.params[0] <= 1.0);
        assert!((result.params[0] - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_constraint_respected() {
        let mut problem = Bowl::new(&[0.5, 0.5]);
        problem.limit = Some(0.7);
        let result = ConstrainedSimplex::new(300)
            .solve(&problem, &mut NoopCallback)
            .unwrap();

        let total: f64 = result.params.iter().map(|v| v.abs()).sum();
        assert!(total <= 0.7 + 1e-12);
        // Seed cost is 0.5; the constrained optimum is 0.045.
        assert!(result.cost < 0.25);
    }

    #[test]
    fn test_evaluation_budget() {
        let problem = Bowl::new(&[0.3, -0.2, 0.1]);
        let result = ConstrainedSimplex::new(500)
            .with_max_evals(6)
            .solve(&problem, &mut NoopCallback)
            .unwrap();

        assert!(!result.success);
        assert_eq!(result.message, "Maximum number of function evaluations reached");
        assert_eq!(result.cost_evals, 6);
        assert!(result.cost <= 0.3 * 0.3 + 0.2 * 0.2 + 0.1 * 0.1);
    }

    #[test]
    fn test_iteration_limit() {
        let problem = Bowl::new(&[0.3, -0.2, 0.1]);
        let result = ConstrainedSimplex::new(3)
            .solve(&problem, &mut NoopCallback)
            .unwrap();

        assert!(!result.success);
        assert_eq!(result.message, "Iteration limit reached");
        assert_eq!(result.iterations, 3);
        // Each step costs at most a reflection, a contraction and a shrink.
        assert!(result.cost_evals <= 4 + 3 * 5);
    }

    #[test]
    fn test_flat_direction_converges() {
        // `|x|` ignores `y`: the seed sits on the kink and two vertices tie.
        struct Kink {
            bounds: Vec<(f64, f64)>,
        }
        impl Problem for Kink {
            fn cost(&self, params: &[f64]) -> TuneResult<f64> {
                Ok(params[0].abs())
            }
            fn num_params(&self) -> usize {
                2
            }
            fn initial_params(&self) -> &[f64] {
                &[0.0, 0.5]
            }
            fn bounds(&self) -> &[(f64, f64)] {
                &self.bounds
            }
        }

        let problem = Kink {
            bounds: vec![(-1.0, 1.0); 2],
        };
        let result = ConstrainedSimplex::new(200)
            .solve(&problem, &mut NoopCallback)
            .unwrap();

        assert!(result.success, "{}", result.message);
        assert!(result.iterations < 50);
        assert!(result.cost < 1e-4);
    }

    #[test]
    fn test_callback_stops_run() {
        struct StopAfter(u32);
        impl OptimizationCallback for StopAfter {
            fn on_iteration(&mut self, iteration: u32, _: &[f64], _: f64) -> TuneResult<()> {
                self.0 = iteration;
                Ok(())
            }
            fn should_stop(&self) -> bool {
                self.0 >= 2
            }
        }

        let problem = Bowl::new(&[0.3, -0.2]);
        let result = ConstrainedSimplex::new(500)
            .solve(&problem, &mut StopAfter(0))
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.iterations, 2);
    }

    #[test]
    fn test_callback_error_propagates() {
        struct Refuse;
        impl OptimizationCallback for Refuse {
            fn on_iteration(&mut self, _: u32, _: &[f64], _: f64) -> TuneResult<()> {
                Err(TuneError::Cancelled)
            }
        }

        let problem = Bowl::new(&[0.3]);
        assert!(matches!(
            ConstrainedSimplex::new(50).solve(&problem, &mut Refuse),
            Err(TuneError::Cancelled)
        ));
    }
}
