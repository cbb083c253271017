//! Mortgage pool valuation kernel
//!
//! Prices pools of seasoned residential mortgage loans for acquisition: it
//! projects each loan's cash flows under a probabilistic state model,
//! discounts them, and aggregates to package-level present value, ROE
//! distributions, and bid-price analysis.
//!
//! The kernel is a pipeline of cooperating components — model registry,
//! leaf assigner, hazard decomposer, cash-flow projector, Monte Carlo
//! driver, and result shaper — wired together by [`kernel::ValuationKernel`].

pub mod error;
pub mod hazard;
pub mod kernel;
pub mod loan;
pub mod models;
pub mod montecarlo;
pub mod projection;
pub mod result;

pub use error::{ValuationError, ValuationResult};
pub use kernel::{KernelConfig, ValuationKernel, ValuationRequest};
pub use loan::Loan;
pub use result::{BidConfig, BidLadder, BidRow, ModelManifestView, LeafView, PackageValuationResult};
