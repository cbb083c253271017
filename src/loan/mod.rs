//! Loan data structures and loan-tape ingestion

mod data;
mod loader;

pub use data::{pmt, Loan, DEFAULT_DTI, DEFAULT_ITIN, NO_SCORE};
pub use loader::{load_loans, load_loans_from_reader};
