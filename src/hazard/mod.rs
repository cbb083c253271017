//! Hazard Decomposer (C3): splits a leaf's all-cause survival hazard into
//! per-month default and prepayment components under one of four
//! decomposition modes (§4.3).

use crate::loan::Loan;
use crate::models::{Apex2Inputs, Apex2Tables, Scenario, SurvivalCurve};

/// Which decomposition strategy produces the monthly hazards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecompositionMode {
    /// Formula-driven, no KM curve: flat CDR plus a PSA-style prepayment
    /// ramp. Used when no survival curve is available for a leaf.
    Stub,
    /// The KM all-cause hazard is split by a fixed default share `alpha`.
    KmAll,
    /// Default hazard is a flat CDR; prepayment absorbs the remainder of
    /// the KM hazard (can collapse to zero, see [`DecompositionMode::KmWithFlatDefault`] docs on
    /// `decompose`).
    KmWithFlatDefault,
    /// Default hazard is a flat CDR; prepayment is expressed as a dollar
    /// extra-principal amount driven by a time-varying APEX2 multiplier.
    Apex2,
}

/// Tunables for the hazard decomposition (§4.3, §9 design notes).
#[derive(Debug, Clone, Copy)]
pub struct HazardConfig {
    pub mode: DecompositionMode,
    /// Target annual conditional default rate used by every mode except
    /// `km_all` (which derives default share from the KM curve itself).
    pub target_annual_cdr: f64,
    /// Share of the KM hazard attributed to default in `km_all` mode.
    pub km_all_default_share: f64,
    /// Seasoning ramp horizon `R` for the APEX2 extra-principal schedule
    /// (default 30 months, §4.3).
    pub seasoning_ramp_months: f64,
    /// Window (in months) over which the stub mode's PSA-style prepayment
    /// curve ramps from zero to its ultimate CPR.
    pub psa_ramp_months: u32,
    /// Ultimate annual CPR for the stub mode's prepayment ramp.
    pub psa_ultimate_cpr: f64,
    /// Fraction of months a `km_with_flat_default` curve may collapse to
    /// zero prepayment before a warning is logged (§9 Open Question 1:
    /// collapse is tolerated, but surfaced rather than silent).
    pub clamp_collapse_warn_threshold: f64,
}

impl Default for HazardConfig {
    fn default() -> Self {
        Self {
            mode: DecompositionMode::KmWithFlatDefault,
            target_annual_cdr: 0.01,
            km_all_default_share: 0.2,
            seasoning_ramp_months: 30.0,
            psa_ramp_months: 30,
            psa_ultimate_cpr: 0.06,
            clamp_collapse_warn_threshold: 0.2,
        }
    }
}

/// Converts an annualised rate to its monthly-compounding equivalent
/// (§ Glossary: `monthly = 1 - (1 - annual)^(1/12)`).
pub fn annual_to_monthly(annual: f64) -> f64 {
    1.0 - (1.0 - annual).powf(1.0 / 12.0)
}

fn seasoning_ramp(age_months: f64, horizon: f64) -> f64 {
    if horizon <= 0.0 {
        return 1.0;
    }
    (age_months / horizon).clamp(0.0, 1.0)
}

/// The prepayment side of one month's hazard decomposition: either a
/// hazard rate, or (in `apex2` mode) a dollar extra-principal amount.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PrepaymentComponent {
    Hazard(f64),
    ExtraPrincipalDollars(f64),
}

/// One month's decomposed hazards, post scenario-multiplier application.
#[derive(Debug, Clone, Copy)]
pub struct MonthlyHazard {
    pub month: u32,
    pub default_hazard: f64,
    pub prepayment: PrepaymentComponent,
}

/// Optional monthly discount-curve lookup used to re-derive the APEX2
/// rate-incentive dimension each month (§4.4 treasury-curve handling).
pub trait RateAt {
    fn rate_at(&self, month: f64) -> f64;
}

impl RateAt for Scenario {
    fn rate_at(&self, month: f64) -> f64 {
        match &self.treasury_curve {
            Some(curve) => curve.rate_at(month),
            None => 0.0,
        }
    }
}

/// Produces the per-month `(default, prepayment)` decomposition for a loan
/// across `remaining_term` months, applying the scenario's default and
/// prepayment multipliers (§4.3).
pub fn decompose(
    loan: &Loan,
    survival: Option<&SurvivalCurve>,
    apex2: Option<&Apex2Tables>,
    scenario: &Scenario,
    fallback_discount_rate: f64,
    config: &HazardConfig,
) -> Vec<MonthlyHazard> {
    match config.mode {
        DecompositionMode::Stub => decompose_stub(loan, scenario, config),
        DecompositionMode::KmAll => decompose_km_all(loan, survival, scenario, config),
        DecompositionMode::KmWithFlatDefault => {
            decompose_km_with_flat_default(loan, survival, scenario, config)
        }
        DecompositionMode::Apex2 => decompose_apex2(
            loan,
            apex2,
            scenario,
            fallback_discount_rate,
            config,
        ),
    }
}

fn decompose_stub(loan: &Loan, scenario: &Scenario, config: &HazardConfig) -> Vec<MonthlyHazard> {
    let monthly_cdr = annual_to_monthly(config.target_annual_cdr);
    let monthly_cpr = annual_to_monthly(config.psa_ultimate_cpr);

    (1..=loan.remaining_term)
        .map(|t| {
            let age = loan.age + t;
            let seasoning_mult = 1.0 + 0.01 * (age as f64).min(24.0) / 24.0;
            let default_hazard = (monthly_cdr * seasoning_mult * scenario.default_multiplier)
                .clamp(0.0, 1.0);

            let ramp = (t as f64 / config.psa_ramp_months.max(1) as f64).min(1.0);
            let prepay_hazard =
                (monthly_cpr * ramp * scenario.prepay_multiplier).clamp(0.0, 1.0 - default_hazard);

            MonthlyHazard {
                month: t,
                default_hazard,
                prepayment: PrepaymentComponent::Hazard(prepay_hazard),
            }
        })
        .collect()
}

fn decompose_km_all(
    loan: &Loan,
    survival: Option<&SurvivalCurve>,
    scenario: &Scenario,
    config: &HazardConfig,
) -> Vec<MonthlyHazard> {
    let alpha = config.km_all_default_share.clamp(0.0, 1.0);
    (1..=loan.remaining_term)
        .map(|t| {
            let h_km = survival
                .map(|s| s.hazard_at((loan.age + t) as usize))
                .unwrap_or(0.0);
            let default_hazard = (alpha * h_km * scenario.default_multiplier).clamp(0.0, 1.0);
            let prepay_hazard = ((1.0 - alpha) * h_km * scenario.prepay_multiplier)
                .clamp(0.0, 1.0 - default_hazard);
            MonthlyHazard {
                month: t,
                default_hazard,
                prepayment: PrepaymentComponent::Hazard(prepay_hazard),
            }
        })
        .collect()
}

fn decompose_km_with_flat_default(
    loan: &Loan,
    survival: Option<&SurvivalCurve>,
    scenario: &Scenario,
    config: &HazardConfig,
) -> Vec<MonthlyHazard> {
    let monthly_cdr = annual_to_monthly(config.target_annual_cdr);
    let mut collapsed_months = 0u32;
    let total_months = loan.remaining_term.max(1);

    let rows: Vec<MonthlyHazard> = (1..=loan.remaining_term)
        .map(|t| {
            let h_km = survival
                .map(|s| s.hazard_at((loan.age + t) as usize))
                .unwrap_or(0.0);
            let default_hazard = (monthly_cdr * scenario.default_multiplier).clamp(0.0, 1.0);
            let raw_prepay = h_km - monthly_cdr;
            if raw_prepay <= 0.0 {
                collapsed_months += 1;
            }
            let prepay_hazard =
                (raw_prepay.max(0.0) * scenario.prepay_multiplier).clamp(0.0, 1.0 - default_hazard);
            MonthlyHazard {
                month: t,
                default_hazard,
                prepayment: PrepaymentComponent::Hazard(prepay_hazard),
            }
        })
        .collect();

    let collapse_fraction = collapsed_months as f64 / total_months as f64;
    if collapse_fraction > config.clamp_collapse_warn_threshold {
        log::warn!(
            "loan {}: km_with_flat_default collapsed prepayment to zero in {:.0}% of months (cdr {} exceeds the KM hazard)",
            loan.loan_id,
            collapse_fraction * 100.0,
            config.target_annual_cdr
        );
    }

    rows
}

fn decompose_apex2(
    loan: &Loan,
    apex2: Option<&Apex2Tables>,
    scenario: &Scenario,
    fallback_discount_rate: f64,
    config: &HazardConfig,
) -> Vec<MonthlyHazard> {
    let monthly_cdr = annual_to_monthly(config.target_annual_cdr);
    let scheduled_payment = loan.scheduled_payment();

    (1..=loan.remaining_term)
        .map(|t| {
            let default_hazard = (monthly_cdr * scenario.default_multiplier).clamp(0.0, 1.0);

            let treasury_rate = scenario.rate_at(t as f64).max(0.0).min(1.0);
            let effective_treasury = if scenario.treasury_curve.is_some() {
                treasury_rate
            } else {
                fallback_discount_rate
            };
            let rate_delta_pct = (loan.note_rate - effective_treasury) * 100.0;

            let multiplier = apex2
                .map(|tables| {
                    tables.multiplier(Apex2Inputs {
                        rate_delta_pct,
                        credit_score: loan.credit_score as f64,
                        ltv_pct: loan.ltv * 100.0,
                        loan_size: loan.upb,
                    })
                })
                .unwrap_or(1.0);

            let ramp = seasoning_ramp((loan.age + t) as f64, config.seasoning_ramp_months);
            let extra_principal = (scheduled_payment * (multiplier - 1.0) * ramp
                * scenario.prepay_multiplier)
                .max(0.0);

            MonthlyHazard {
                month: t,
                default_hazard,
                prepayment: PrepaymentComponent::ExtraPrincipalDollars(extra_principal),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Band, BandedLookup};

    fn sample_loan() -> Loan {
        Loan {
            loan_id: "L1".to_string(),
            upb: 100_000.0,
            note_rate: 0.06,
            original_term: 360,
            remaining_term: 120,
            age: 0,
            credit_score: 720,
            ltv: 0.75,
            origination_year: Some(2015),
            dti: None,
            state: None,
            itin: None,
        }
    }

    fn declining_curve() -> SurvivalCurve {
        let series: Vec<f64> = (0..360).map(|t| 1.0 - t as f64 / 720.0).collect();
        SurvivalCurve::new(series, 1).unwrap()
    }

    #[test]
    fn test_monthly_cdr_conversion_matches_glossary_formula() {
        let m = annual_to_monthly(0.01);
        let back = 1.0 - (1.0 - m).powi(12);
        assert!((back - 0.01).abs() < 1e-9);
    }

    #[test]
    fn test_default_plus_prepay_never_exceeds_one() {
        let loan = sample_loan();
        let scenario = Scenario::base_case();
        let config = HazardConfig::default();
        for rows in [
            decompose(&loan, None, None, &scenario, 0.06, &HazardConfig {
                mode: DecompositionMode::Stub,
                ..config
            }),
            decompose(
                &loan,
                Some(&declining_curve()),
                None,
                &scenario,
                0.06,
                &HazardConfig {
                    mode: DecompositionMode::KmAll,
                    ..config
                },
            ),
            decompose(
                &loan,
                Some(&declining_curve()),
                None,
                &scenario,
                0.06,
                &HazardConfig {
                    mode: DecompositionMode::KmWithFlatDefault,
                    ..config
                },
            ),
        ] {
            for row in rows {
                let prepay_hazard = match row.prepayment {
                    PrepaymentComponent::Hazard(h) => h,
                    PrepaymentComponent::ExtraPrincipalDollars(_) => 0.0,
                };
                assert!(row.default_hazard >= 0.0);
                assert!(prepay_hazard >= 0.0);
                assert!(row.default_hazard + prepay_hazard <= 1.0 + 1e-9);
            }
        }
    }

    #[test]
    fn test_km_with_flat_default_collapses_near_zero_curve() {
        let loan = sample_loan();
        let scenario = Scenario::base_case();
        let flat_curve = SurvivalCurve::new(vec![1.0; 360], 1).unwrap();
        let config = HazardConfig {
            mode: DecompositionMode::KmWithFlatDefault,
            target_annual_cdr: 0.05,
            ..HazardConfig::default()
        };
        let rows = decompose(&loan, Some(&flat_curve), None, &scenario, 0.06, &config);
        for row in rows {
            match row.prepayment {
                PrepaymentComponent::Hazard(h) => assert_eq!(h, 0.0),
                _ => panic!("expected hazard form"),
            }
        }
    }

    #[test]
    fn test_apex2_mode_produces_extra_principal_not_hazard() {
        let loan = sample_loan();
        let scenario = Scenario::base_case();
        let flat = |dimension| {
            BandedLookup::new(
                vec![Band {
                    upper_bound: f64::INFINITY,
                    multiplier: 1.5,
                }],
                dimension,
            )
            .unwrap()
        };
        let tables = Apex2Tables::new(
            flat("credit"),
            1.5,
            flat("rate_delta"),
            flat("ltv"),
            flat("loan_size"),
        );
        let config = HazardConfig {
            mode: DecompositionMode::Apex2,
            seasoning_ramp_months: 1.0,
            ..HazardConfig::default()
        };
        let rows = decompose(&loan, None, Some(&tables), &scenario, 0.06, &config);
        match rows[30].prepayment {
            PrepaymentComponent::ExtraPrincipalDollars(dollars) => assert!(dollars > 0.0),
            _ => panic!("expected dollar extra-principal form"),
        }
    }

    #[test]
    fn test_km_all_split_sums_to_km_hazard() {
        let loan = sample_loan();
        let scenario = Scenario::base_case();
        let curve = declining_curve();
        let config = HazardConfig {
            mode: DecompositionMode::KmAll,
            km_all_default_share: 0.25,
            ..HazardConfig::default()
        };
        let rows = decompose(&loan, Some(&curve), None, &scenario, 0.06, &config);
        let t = 10;
        let h_km = curve.hazard_at((loan.age + t as u32) as usize);
        let row = &rows[t - 1];
        let prepay = match row.prepayment {
            PrepaymentComponent::Hazard(h) => h,
            _ => panic!("expected hazard form"),
        };
        assert!((row.default_hazard + prepay - h_km).abs() < 1e-9);
    }
}
