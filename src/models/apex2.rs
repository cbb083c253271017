//! APEX2 prepayment multiplier tables.
//!
//! Four independent banded lookups — rate incentive, seasoning, credit, LTV
//! — each producing a dimension-specific multiplier on the baseline
//! prepayment hazard; the overall APEX2 multiplier is their average (§4.3).

use crate::error::ValuationError;
use crate::loan::NO_SCORE;

/// The reserved `band_label` key (§6) carrying the credit dimension's
/// "no-score" multiplier, looked up instead of the ordinary ordered bands
/// whenever a loan's credit score is the [`NO_SCORE`] sentinel.
pub const NO_SCORE_BAND_LABEL: &str = "no_score";

/// One band: applies `multiplier` when the driving value is `<= upper_bound`
/// (bands are evaluated in ascending order; the last band's `upper_bound`
/// should be `f64::INFINITY`).
#[derive(Debug, Clone, Copy)]
pub struct Band {
    pub upper_bound: f64,
    pub multiplier: f64,
}

/// An ordered set of bands for one dimension.
#[derive(Debug, Clone)]
pub struct BandedLookup {
    bands: Vec<Band>,
}

impl BandedLookup {
    pub fn new(mut bands: Vec<Band>, dimension: &'static str) -> Result<Self, ValuationError> {
        if bands.is_empty() {
            return Err(ValuationError::BadFormat {
                path: format!("apex2 table `{dimension}`").into(),
                detail: "must have at least one band".to_string(),
            });
        }
        bands.sort_by(|a, b| a.upper_bound.partial_cmp(&b.upper_bound).unwrap());
        Ok(Self { bands })
    }

    /// The multiplier for the band containing `value`; values beyond the
    /// last band's bound clamp to that band (the last band should carry
    /// `f64::INFINITY` as its bound so this never happens by accident).
    pub fn lookup(&self, value: f64) -> f64 {
        self.bands
            .iter()
            .find(|band| value <= band.upper_bound)
            .unwrap_or_else(|| self.bands.last().unwrap())
            .multiplier
    }
}

/// Inputs driving the four APEX2 dimensions, derived from a loan's current
/// state (§4.3).
#[derive(Debug, Clone, Copy)]
pub struct Apex2Inputs {
    /// Note rate minus the current 10-year treasury, in percentage points
    /// (§3 "rate-delta band").
    pub rate_delta_pct: f64,
    /// Credit score, or [`crate::loan::NO_SCORE`] for the no-score band.
    pub credit_score: f64,
    /// Current loan-to-value, as a percentage.
    pub ltv_pct: f64,
    /// Unpaid principal balance, in currency units (§3 "loan-size band").
    pub loan_size: f64,
}

/// The four APEX2 prepayment multiplier tables for one segmentation leaf
/// (§3: credit band x9, rate-delta band x7, LTV band x5, loan-size band x8).
#[derive(Debug, Clone)]
pub struct Apex2Tables {
    credit: BandedLookup,
    /// Multiplier applied instead of `credit`'s ordered bands when the
    /// loan's credit score is the [`NO_SCORE`] sentinel (§3, §6).
    no_score_multiplier: f64,
    rate_delta: BandedLookup,
    ltv: BandedLookup,
    loan_size: BandedLookup,
}

impl Apex2Tables {
    pub fn new(
        credit: BandedLookup,
        no_score_multiplier: f64,
        rate_delta: BandedLookup,
        ltv: BandedLookup,
        loan_size: BandedLookup,
    ) -> Self {
        Self {
            credit,
            no_score_multiplier,
            rate_delta,
            ltv,
            loan_size,
        }
    }

    /// The combined APEX2 multiplier: the unweighted mean of the four
    /// dimension-specific multipliers (§4.3), order-independent since it is
    /// a plain arithmetic mean (§8 round-trip law).
    pub fn multiplier(&self, inputs: Apex2Inputs) -> f64 {
        let credit_band = if inputs.credit_score as u16 == NO_SCORE {
            self.no_score_multiplier
        } else {
            self.credit.lookup(inputs.credit_score)
        };
        let m = [
            credit_band,
            self.rate_delta.lookup(inputs.rate_delta_pct),
            self.ltv.lookup(inputs.ltv_pct),
            self.loan_size.lookup(inputs.loan_size),
        ];
        m.iter().sum::<f64>() / m.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_table(multiplier: f64) -> BandedLookup {
        BandedLookup::new(
            vec![Band {
                upper_bound: f64::INFINITY,
                multiplier,
            }],
            "test",
        )
        .unwrap()
    }

    #[test]
    fn test_banded_lookup_picks_lowest_matching_band() {
        let bands = BandedLookup::new(
            vec![
                Band {
                    upper_bound: 1.0,
                    multiplier: 0.5,
                },
                Band {
                    upper_bound: f64::INFINITY,
                    multiplier: 2.0,
                },
            ],
            "rate_delta",
        )
        .unwrap();
        assert_eq!(bands.lookup(0.5), 0.5);
        assert_eq!(bands.lookup(5.0), 2.0);
    }

    #[test]
    fn test_apex2_multiplier_is_average_of_four() {
        let tables = Apex2Tables::new(
            flat_table(1.0),
            1.0,
            flat_table(2.0),
            flat_table(3.0),
            flat_table(4.0),
        );
        let m = tables.multiplier(Apex2Inputs {
            rate_delta_pct: 0.0,
            credit_score: 700.0,
            ltv_pct: 0.0,
            loan_size: 0.0,
        });
        assert!((m - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_apex2_no_score_sentinel_bypasses_credit_bands() {
        let tables = Apex2Tables::new(flat_table(1.0), 9.0, flat_table(1.0), flat_table(1.0), flat_table(1.0));
        let m = tables.multiplier(Apex2Inputs {
            rate_delta_pct: 0.0,
            credit_score: NO_SCORE as f64,
            ltv_pct: 0.0,
            loan_size: 0.0,
        });
        assert!((m - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_apex2_multiplier_order_independent() {
        let tables_a = Apex2Tables::new(flat_table(1.0), 1.0, flat_table(2.0), flat_table(3.0), flat_table(4.0));
        let tables_b = Apex2Tables::new(flat_table(4.0), 1.0, flat_table(3.0), flat_table(2.0), flat_table(1.0));
        let inputs = Apex2Inputs {
            rate_delta_pct: 0.0,
            credit_score: 700.0,
            ltv_pct: 0.0,
            loan_size: 0.0,
        };
        assert!((tables_a.multiplier(inputs) - tables_b.multiplier(inputs)).abs() < 1e-9);
    }

    #[test]
    fn test_banded_lookup_rejects_empty() {
        assert!(BandedLookup::new(vec![], "empty").is_err());
    }
}
