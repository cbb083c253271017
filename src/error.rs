//! Error taxonomy for the valuation kernel
//!
//! Every operation in the kernel returns either a result or one of these
//! tagged variants (never a bare string). `ModelFallback` is deliberately
//! absent here: a fallback to a lower leaf-assignment tier is non-fatal and
//! is reported through [`crate::models::FallbackTally`], not as an `Err`.

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the valuation kernel's public operations.
#[derive(Debug, Error)]
pub enum ValuationError {
    /// A loan failed basic input validation (§7: fails the whole valuation).
    #[error("invalid input on loan {loan_id}: field `{field}` {detail}")]
    InvalidInput {
        loan_id: String,
        field: &'static str,
        detail: String,
    },

    /// A required model artifact file is absent at startup.
    #[error("missing model artifact: {0}")]
    MissingArtifact(PathBuf),

    /// A model artifact file exists but is structurally invalid.
    #[error("malformed model artifact at {path}: {detail}")]
    BadFormat { path: PathBuf, detail: String },

    /// A requested survival-curve variant is not registered in the manifest.
    #[error("curve variant not found: {0}")]
    VariantNotFound(String),

    /// A single loan's projection hit a numerical invariant violation
    /// (negative balance from float drift, a non-converging amortisation,
    /// or a percentile request on an empty distribution). The loan is
    /// flagged and excluded; the rest of the package still prices (§7).
    #[error("numeric error on loan {loan_id}: {detail}")]
    NumericError { loan_id: String, detail: String },

    /// The caller cancelled the valuation before all draws completed.
    #[error("valuation cancelled")]
    Cancelled,

    /// The valuation exceeded its caller-supplied deadline.
    #[error("valuation timed out")]
    Timeout,
}

pub type ValuationResult<T> = Result<T, ValuationError>;
