use super::traits::{OptimizationCallback, Problem, Solver, SolverResult};
use crate::error::{TuneError, TuneResult};

/// Golden-section fraction `(3 - sqrt(5)) / 2`.
const GOLDEN: f64 = 0.381_966_011_250_105_1;

/// Brent's bounded scalar minimizer.
///
/// Golden-section steps with parabolic interpolation on the interval given
/// by the problem's single bound. Only the bracket is used; the problem's
/// initial point is ignored.
pub struct BoundedScalar {
    max_evals: usize,
    xatol: f64,
}

impl BoundedScalar {
    pub fn new(max_evals: usize) -> Self {
        Self {
            max_evals,
            xatol: 1e-5,
        }
    }
}

impl Solver for BoundedScalar {
    fn name(&self) -> &str {
        "BoundedBrent"
    }

    fn solve(
        &mut self,
        problem: &dyn Problem,
        callback: &mut dyn OptimizationCallback,
    ) -> TuneResult<SolverResult> {
        let &[(lo, hi)] = problem.bounds() else {
            return Err(TuneError::solver(format!(
                "bounded scalar search needs exactly one parameter, got {}",
                problem.num_params()
            )));
        };
        if !(lo <= hi) {
            return Err(TuneError::solver(format!("empty interval [{}, {}]", lo, hi)));
        }

        let sqrt_eps = f64::EPSILON.sqrt();
        let max_evals = self.max_evals.max(1);
        let (mut a, mut b) = (lo, hi);

        // x: best so far, w: second best, v: previous w
        let mut x = a + GOLDEN * (b - a);
        let mut fx = problem.cost(&[x])?;
        let (mut w, mut fw) = (x, fx);
        let (mut v, mut fv) = (x, fx);
        let mut evals = 1;
        let mut iterations = 0;

        let mut d = 0.0_f64;
        let mut e = 0.0_f64;
        let mut xm = 0.5 * (a + b);
        let mut tol1 = sqrt_eps * x.abs() + self.xatol / 3.0;
        let mut tol2 = 2.0 * tol1;

        let mut converged = true;
        let mut message = "Solution found.".to_string();

        while (x - xm).abs() > tol2 - 0.5 * (b - a) {
            if evals >= max_evals {
                converged = false;
                message = "Maximum number of function calls reached.".to_string();
                break;
            }
            if callback.should_stop() {
                converged = false;
                message = "Stopped by callback".to_string();
                break;
            }

            let mut golden = true;
            if e.abs() > tol1 {
                // Parabola through x, w, v
                let r = (x - w) * (fx - fv);
                let mut q = (x - v) * (fx - fw);
                let mut p = (x - v) * q - (x - w) * r;
                q = 2.0 * (q - r);
                if q > 0.0 {
                    p = -p;
                }
                q = q.abs();
                let e_prev = e;
                e = d;

                if p.abs() < (0.5 * q * e_prev).abs() && p > q * (a - x) && p < q * (b - x) {
                    golden = false;
                    d = p / q;
                    let u = x + d;
                    if u - a < tol2 || b - u < tol2 {
                        d = tol1.copysign(xm - x);
                    }
                }
            }
            if golden {
                e = if x >= xm { a - x } else { b - x };
                d = GOLDEN * e;
            }

            let step = if d == 0.0 { tol1 } else { d.abs().max(tol1).copysign(d) };
            let u = x + step;
            let fu = problem.cost(&[u])?;
            evals += 1;

            if fu <= fx {
                if u >= x {
                    a = x;
                } else {
                    b = x;
                }
                (v, fv) = (w, fw);
                (w, fw) = (x, fx);
                (x, fx) = (u, fu);
            } else {
                if u < x {
                    a = u;
                } else {
                    b = u;
                }
                if fu <= fw || w == x {
                    (v, fv) = (w, fw);
                    (w, fw) = (u, fu);
                } else if fu <= fv || v == x || v == w {
                    (v, fv) = (u, fu);
                }
            }

            iterations += 1;
            callback.on_iteration(iterations, &[x], fx)?;

            xm = 0.5 * (a + b);
            tol1 = sqrt_eps * x.abs() + self.xatol / 3.0;
            tol2 = 2.0 * tol1;
        }

        Ok(SolverResult {
            success: converged,
            cost: fx,
            iterations,
            message,
            params: vec![x],
            cost_evals: evals,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::NoopCallback;
    use std::cell::Cell;

    struct Parabola {
        centre: f64,
        bounds: [(f64, f64); 1],
        calls: Cell<usize>,
    }

    impl Parabola {
        fn new(centre: f64, lo: f64, hi: f64) -> Self {
            Self {
                centre,
                bounds: [(lo, hi)],
                calls: Cell::new(0),
            }
        }
    }

    impl Problem for Parabola {
        fn cost(&self, params: &[f64]) -> TuneResult<f64> {
            self.calls.set(self.calls.get() + 1);
            Ok((params[0] - self.centre).powi(2) - 1.0)
        }

        fn num_params(&self) -> usize {
            1
        }

        fn initial_params(&self) -> &[f64] {
            &[0.0]
        }

        fn bounds(&self) -> &[(f64, f64)] {
            &self.bounds
        }
    }

    #[test]
    fn test_interior_minimum() {
        let problem = Parabola::new(7.3, 0.0, 20.0);
        let result = BoundedScalar::new(100).solve(&problem, &mut NoopCallback).unwrap();

        assert!(result.success);
        assert!((result.params[0] - 7.3).abs() < 1e-4);
        assert!((result.cost + 1.0).abs() < 1e-8);
        assert_eq!(result.cost_evals, problem.calls.get());
    }

    #[test]
    fn test_minimum_at_edge() {
        let problem = Parabola::new(-3.0, 0.0, 20.0);
        let result = BoundedScalar::new(100).solve(&problem, &mut NoopCallback).unwrap();

        assert!(result.success);
        assert!(result.params[0] < 1e-3);
        assert!(result.params[0] >= 0.0);
    }

    #[test]
    fn test_evaluation_budget() {
        let problem = Parabola::new(7.3, 0.0, 20.0);
        let result = BoundedScalar::new(3).solve(&problem, &mut NoopCallback).unwrap();

        assert!(!result.success);
        assert_eq!(result.cost_evals, 3);
        assert_eq!(problem.calls.get(), 3);
    }

    #[test]
    fn test_rejects_multi_parameter_problem() {
        struct Two;
        impl Problem for Two {
            fn cost(&self, _: &[f64]) -> TuneResult<f64> {
                Ok(0.0)
            }
            fn num_params(&self) -> usize {
                2
            }
            fn initial_params(&self) -> &[f64] {
                &[0.0, 0.0]
            }
            fn bounds(&self) -> &[(f64, f64)] {
                &[(0.0, 1.0), (0.0, 1.0)]
            }
        }

        assert!(matches!(
            BoundedScalar::new(10).solve(&Two, &mut NoopCallback),
            Err(TuneError::Solver(_))
        ));
    }

    #[test]
    fn test_cancellation_propagates() {
        struct Cancelled;
        impl Problem for Cancelled {
            fn cost(&self, _: &[f64]) -> TuneResult<f64> {
                Err(TuneError::Cancelled)
            }
            fn num_params(&self) -> usize {
                1
            }
            fn initial_params(&self) -> &[f64] {
                &[0.0]
            }
            fn bounds(&self) -> &[(f64, f64)] {
                &[(0.0, 1.0)]
            }
        }

        assert!(matches!(
            BoundedScalar::new(10).solve(&Cancelled, &mut NoopCallback),
            Err(TuneError::Cancelled)
        ));
    }
}
