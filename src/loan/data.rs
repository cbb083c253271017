//! Loan data structures matching the pricing loan-tape format

use serde::{Deserialize, Serialize};

use crate::error::ValuationError;

/// Canonical "no score" sentinel for `credit_score` (§3).
pub const NO_SCORE: u16 = 555;

/// A single seasoned mortgage loan to be priced. Immutable per valuation call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Loan {
    /// Opaque loan identifier.
    pub loan_id: String,

    /// Unpaid principal balance (currency units, > 0).
    pub upb: f64,

    /// Annual note interest rate, as a fraction (e.g. 0.072).
    pub note_rate: f64,

    /// Original term in months.
    pub original_term: u32,

    /// Remaining term in months (<= original_term).
    pub remaining_term: u32,

    /// Loan age / seasoning in months.
    pub age: u32,

    /// Credit score (300-850), or [`NO_SCORE`] (555) when unknown.
    pub credit_score: u16,

    /// Loan-to-value ratio as a fraction (e.g. 0.80).
    pub ltv: f64,

    /// Origination year, if known.
    #[serde(default)]
    pub origination_year: Option<u32>,

    /// Debt-to-income ratio, if known.
    #[serde(default)]
    pub dti: Option<f64>,

    /// Two-letter property state code, if known.
    #[serde(default)]
    pub state: Option<String>,

    /// Whether the borrower is identified by an ITIN rather than an SSN.
    #[serde(default)]
    pub itin: Option<bool>,
}

/// Imputed defaults applied by the leaf assigner when optional fields are
/// absent (§4.2). Not an error — just recorded for the result manifest.
pub const DEFAULT_DTI: f64 = 0.36;
pub const DEFAULT_ITIN: bool = false;

impl Loan {
    /// Validate basic structural invariants (§7 `InvalidInput`).
    ///
    /// This fails fast on the whole valuation per §7's propagation policy —
    /// callers should check every loan in a package before pricing any of
    /// them.
    pub fn validate(&self) -> Result<(), ValuationError> {
        let fail = |field: &'static str, detail: &str| ValuationError::InvalidInput {
            loan_id: self.loan_id.clone(),
            field,
            detail: detail.to_string(),
        };

        if !self.upb.is_finite() || self.upb <= 0.0 {
            return Err(fail("upb", "must be a positive, finite amount"));
        }
        if !self.note_rate.is_finite() || self.note_rate < 0.0 || self.note_rate > 1.0 {
            return Err(fail("note_rate", "must be a finite fraction in [0, 1]"));
        }
        if self.original_term == 0 {
            return Err(fail("original_term", "must be >= 1"));
        }
        if self.remaining_term == 0 {
            return Err(fail("remaining_term", "must be >= 1"));
        }
        if self.remaining_term > self.original_term {
            return Err(fail(
                "remaining_term",
                "must not exceed original_term",
            ));
        }
        if !self.ltv.is_finite() || self.ltv < 0.0 || self.ltv > 3.0 {
            return Err(fail("ltv", "out of plausible range [0, 3]"));
        }
        if let Some(dti) = self.dti {
            if !dti.is_finite() || dti < 0.0 || dti > 3.0 {
                return Err(fail("dti", "out of plausible range [0, 3]"));
            }
        }
        Ok(())
    }

    /// Scheduled level monthly payment that fully amortises `upb` over
    /// `remaining_term` at the monthly note rate (§3 invariant).
    ///
    /// Guards the zero-rate corner case (straight-line amortisation), which
    /// is a closed form, not a degenerate one (§9 design notes).
    pub fn scheduled_payment(&self) -> f64 {
        pmt(self.upb, self.note_rate / 12.0, self.remaining_term)
    }

    /// DTI, defaulted per §4.2 when the loan does not carry one.
    pub fn dti_or_default(&self) -> (f64, bool) {
        match self.dti {
            Some(v) => (v, false),
            None => (DEFAULT_DTI, true),
        }
    }

    /// ITIN flag, defaulted per §4.2 when the loan does not carry one.
    pub fn itin_or_default(&self) -> (bool, bool) {
        match self.itin {
            Some(v) => (v, false),
            None => (DEFAULT_ITIN, true),
        }
    }

    /// Whether the credit score is the canonical "no score" sentinel.
    pub fn has_no_score(&self) -> bool {
        self.credit_score == NO_SCORE
    }
}

/// Standard level-payment amortisation formula.
///
/// `pmt = B * r / (1 - (1+r)^-n)`, with the `r -> 0` limit handled as the
/// closed-form straight-line case `B / n` rather than dividing by zero.
pub fn pmt(balance: f64, monthly_rate: f64, n_months: u32) -> f64 {
    if n_months == 0 {
        return 0.0;
    }
    if monthly_rate.abs() < 1e-12 {
        return balance / n_months as f64;
    }
    let v = (1.0 + monthly_rate).powi(-(n_months as i32));
    balance * monthly_rate / (1.0 - v)
}
