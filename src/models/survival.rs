//! Kaplan-Meier survival curves and their discrete-hazard derivation.

use crate::error::ValuationError;

/// Curve horizon in months (§3).
pub const CURVE_HORIZON_MONTHS: usize = 360;

/// A single leaf's all-cause survival curve: `S(t)` is the probability a
/// loan originated at the leaf survives (is neither defaulted nor prepaid)
/// through month `t`. Non-increasing, `S(0) == 1.0`, length 360.
#[derive(Debug, Clone)]
pub struct SurvivalCurve {
    survival: Vec<f64>,
}

impl SurvivalCurve {
    /// Construct from a raw month-indexed survival series, validating the
    /// monotonicity and range invariants (§3, §8).
    pub fn new(survival: Vec<f64>, leaf_id: u32) -> Result<Self, ValuationError> {
        if survival.len() != CURVE_HORIZON_MONTHS {
            return Err(ValuationError::BadFormat {
                path: format!("survival curve for leaf {leaf_id}").into(),
                detail: format!(
                    "expected {CURVE_HORIZON_MONTHS} months, got {}",
                    survival.len()
                ),
            });
        }
        let mut prev = 1.0_f64;
        for (t, &s) in survival.iter().enumerate() {
            if !s.is_finite() || s < 0.0 || s > 1.0 {
                return Err(ValuationError::BadFormat {
                    path: format!("survival curve for leaf {leaf_id}").into(),
                    detail: format!("S({t}) = {s} out of [0, 1]"),
                });
            }
            if s > prev + 1e-9 {
                return Err(ValuationError::BadFormat {
                    path: format!("survival curve for leaf {leaf_id}").into(),
                    detail: format!("S({t}) = {s} exceeds S({}) = {prev}", t.saturating_sub(1)),
                });
            }
            prev = s;
        }
        Ok(Self { survival })
    }

    /// `S(t)`, the survival probability through month `t` (1-indexed months
    /// clamp to the last curve entry once past the horizon).
    pub fn survival_at(&self, month: usize) -> f64 {
        if month == 0 {
            return 1.0;
        }
        let idx = (month - 1).min(self.survival.len() - 1);
        self.survival[idx]
    }

    /// Discrete hazard `h(t) = 1 - S(t) / S(t-1)`, the conditional
    /// probability of exit during month `t` given survival through `t-1`.
    /// Zero once the curve's survival has fully decayed to zero.
    pub fn hazard_at(&self, month: usize) -> f64 {
        let prior = self.survival_at(month.saturating_sub(1));
        if prior <= 0.0 {
            return 0.0;
        }
        let current = self.survival_at(month);
        (1.0 - current / prior).clamp(0.0, 1.0)
    }

    pub fn horizon_months(&self) -> usize {
        self.survival.len()
    }
}
