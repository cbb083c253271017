//! Monte Carlo Driver (C5): repeats the projector under correlated shocks
//! across scenarios and draws, and aggregates the result into distributions
//! (§4.5).

mod driver;
mod shock;
mod stats;

pub use driver::{run_monte_carlo, LoanContext, LoanValuationResult, MonteCarloOutcome, SimulationConfig};
pub use shock::{draw_common_factor, draw_loan_shocks, flat_shocks, seed_for_draw, LoanShocks, ShockConfig};
pub use stats::{percentiles_of, Percentiles};
