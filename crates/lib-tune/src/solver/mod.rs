//! Derivative-free minimizers for equalizer tuning.
//!
//! - [`BoundedScalar`]: Brent's method on a closed interval (Rx CTLE search)
//! - [`ConstrainedSimplex`]: Nelder–Mead with every trial point projected
//!   onto the feasible set (Tx and joint searches)

mod brent;
mod simplex;
mod traits;

pub use brent::BoundedScalar;
pub use simplex::ConstrainedSimplex;
pub use traits::{clamp_to_bounds, NoopCallback, OptimizationCallback, Problem, Solver, SolverResult};
