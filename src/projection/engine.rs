//! Cash-Flow Projector (C4): threads one loan through the monthly
//! state machine, producing its discounted cash-flow sequence (§4.4).
//!
//! Carries *probabilities* forward, not samples — stochastic shocks enter
//! only through the hazard multipliers the Monte Carlo driver (C5) applies
//! before calling this function per draw.

use crate::error::ValuationError;
use crate::hazard::{MonthlyHazard, PrepaymentComponent};
use crate::loan::Loan;
use crate::models::Scenario;

use super::cashflows::{MonthlyCashFlow, ProjectionResult};
use super::delinquency::DelinquencyConfig;
use super::state::ProjectionState;

/// Per-projection configuration: the discount rate and delinquency-chain
/// parameters (§4.4).
#[derive(Debug, Clone)]
pub struct ProjectionConfig {
    /// Annual discount rate, decimal (§3 `SimulationConfig`).
    pub discount_rate_annual: f64,
    pub delinquency: DelinquencyConfig,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            discount_rate_annual: 0.06,
            delinquency: DelinquencyConfig::default(),
        }
    }
}

/// Property value backing a loan's recovery calculation, derived from UPB
/// and LTV at acquisition (§4.4: `recovery_rate * property_value`). LTV is
/// treated as fixed over the projection — re-appraising monthly is out of
/// scope for this kernel.
fn property_value(loan: &Loan) -> f64 {
    if loan.ltv > 1e-6 {
        loan.upb / loan.ltv
    } else {
        loan.upb
    }
}

/// Loss severity scaled by the scenario's recovery multiplier: a multiplier
/// above 1.0 makes the *loss* more severe (lower recovery), matching §4.3's
/// "recovery severity is scaled by the scenario's recovery multiplier"
/// rather than scaling the recovery rate up directly.
fn effective_recovery_rate(delinquency: &DelinquencyConfig, scenario: &Scenario) -> f64 {
    let severity = (1.0 - delinquency.recovery_rate) * scenario.severity_multiplier;
    (1.0 - severity).clamp(0.0, 1.0)
}

/// Projects one loan's monthly cash-flow sequence to its remaining term
/// (§4.4). `hazards` must carry exactly `loan.remaining_term` entries, one
/// per month, already scenario-adjusted (C3's output).
pub fn project_loan(
    loan: &Loan,
    hazards: &[MonthlyHazard],
    scenario: &Scenario,
    config: &ProjectionConfig,
) -> Result<ProjectionResult, ValuationError> {
    if hazards.len() != loan.remaining_term as usize {
        return Err(ValuationError::NumericError {
            loan_id: loan.loan_id.clone(),
            detail: format!(
                "hazard schedule has {} months, expected {}",
                hazards.len(),
                loan.remaining_term
            ),
        });
    }

    let delinquency = &config.delinquency;
    let scheduled_payment = loan.scheduled_payment();
    let monthly_rate = loan.note_rate / 12.0;
    let monthly_discount = config.discount_rate_annual / 12.0;
    let prop_value = property_value(loan);
    let recovery_rate = effective_recovery_rate(delinquency, scenario);
    let recovery_cash_per_unit =
        prop_value * (recovery_rate - delinquency.liquidation_cost_pct).max(0.0);
    let foreclosure_delay = delinquency.foreclosure_delay_months(loan.state.as_deref());

    let mut state = ProjectionState::new(loan.upb);
    let mut months = Vec::with_capacity(hazards.len());
    let mut principal_by_month = Vec::with_capacity(hazards.len());

    for row in hazards {
        let t = row.month;
        let b_prev = state.balance;
        if b_prev < -1e-6 {
            return Err(ValuationError::NumericError {
                loan_id: loan.loan_id.clone(),
                detail: format!("projected balance went negative at month {t}: {b_prev}"),
            });
        }
        let b_prev = b_prev.max(0.0);

        let interest = b_prev * monthly_rate;
        let scheduled_principal = (scheduled_payment - interest).clamp(0.0, b_prev);
        let b_after_scheduled = (b_prev - scheduled_principal).max(0.0);

        // Cash realized this month from a default that resolved through
        // foreclosure in an earlier month (§4.4's foreclosure-delay timer).
        let resolved_mass_now = state.take_default_resolution(t);
        let recovery_cash_now = state.take_recovery(t);
        state.p_resolved += resolved_mass_now;

        let (prepay_fraction, extra_principal_applied) = match row.prepayment {
            PrepaymentComponent::Hazard(h) => (h.clamp(0.0, 1.0), 0.0),
            PrepaymentComponent::ExtraPrincipalDollars(raw) => {
                let clamped = raw.max(0.0).min(b_after_scheduled);
                let fully_pays_off = raw >= b_after_scheduled - 1e-9 && b_after_scheduled > 0.0;
                if fully_pays_off {
                    (1.0, 0.0)
                } else {
                    (0.0, clamped)
                }
            }
        };

        let survival_prob_bop = state.survival_prob();
        let mass_prepaid_this_month = state.p_current * prepay_fraction;
        let payoff_cash = mass_prepaid_this_month * b_after_scheduled;
        let extra_principal_cash = state.p_current * extra_principal_applied;

        let mass_to_d30 = state.p_current * row.default_hazard.clamp(0.0, 1.0);
        let mass_stay_current =
            (state.p_current - mass_prepaid_this_month - mass_to_d30).max(0.0);

        let mass_d30_to_current = state.p_d30 * delinquency.cure30;
        let mass_d30_to_d60 = state.p_d30 * delinquency.roll30;
        let mass_d30_stay =
            (state.p_d30 - mass_d30_to_current - mass_d30_to_d60).max(0.0);

        let mass_d60_to_current = state.p_d60 * delinquency.cure60;
        let mass_d60_to_d90 = state.p_d60 * delinquency.roll60;
        let mass_d60_stay =
            (state.p_d60 - mass_d60_to_current - mass_d60_to_d90).max(0.0);

        let mass_d90_to_current = state.p_d90 * delinquency.cure90;
        let mass_d90_to_default = state.p_d90 * delinquency.roll90;
        let mass_d90_stay =
            (state.p_d90 - mass_d90_to_current - mass_d90_to_default).max(0.0);

        if mass_d90_to_default > 0.0 {
            let maturity = t + foreclosure_delay;
            state.schedule_default_resolution(maturity, mass_d90_to_default);
            state.schedule_recovery(maturity, mass_d90_to_default * recovery_cash_per_unit);
        }

        let expected_scheduled_principal = survival_prob_bop * scheduled_principal;
        let expected_payment =
            survival_prob_bop * scheduled_payment + payoff_cash + extra_principal_cash;
        let expected_loss = mass_d90_to_default * (1.0 - recovery_rate) * b_prev;
        let servicing_cost = b_prev * delinquency.servicing_bps_annual / 12.0;
        let net_cash_flow =
            expected_payment + recovery_cash_now - expected_loss - servicing_cost;
        let discount_factor = 1.0 / (1.0 + monthly_discount).powi(t as i32);
        let present_value = net_cash_flow * discount_factor;

        months.push(MonthlyCashFlow {
            month: t,
            survival_prob: survival_prob_bop,
            scheduled_payment,
            expected_payment,
            delinquency_prob: state.p_d30 + state.p_d60 + state.p_d90,
            default_prob: mass_d90_to_default,
            expected_loss,
            expected_recovery: recovery_cash_now,
            servicing_cost,
            net_cash_flow,
            discount_factor,
            present_value,
        });
        principal_by_month.push(expected_scheduled_principal + payoff_cash + extra_principal_cash);

        state.p_current = mass_stay_current + mass_d30_to_current + mass_d60_to_current + mass_d90_to_current;
        state.p_d30 = mass_to_d30 + mass_d30_stay;
        state.p_d60 = mass_d30_to_d60 + mass_d60_stay;
        state.p_d90 = mass_d60_to_d90 + mass_d90_stay;
        state.p_resolved += mass_prepaid_this_month;
        state.balance = (b_after_scheduled - extra_principal_applied).max(0.0);
    }

    let present_value: f64 = months.iter().map(|m| m.present_value).sum();
    let wal_years = ProjectionResult::weighted_average_life_years(&months, &principal_by_month);

    Ok(ProjectionResult {
        loan_id: loan.loan_id.clone(),
        leaf_id: 0,
        months,
        present_value,
        wal_years,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hazard::{decompose, DecompositionMode, HazardConfig};

    fn sample_loan(remaining_term: u32) -> Loan {
        Loan {
            loan_id: "L1".to_string(),
            upb: 100_000.0,
            note_rate: 0.06,
            original_term: 120,
            remaining_term,
            age: 0,
            credit_score: 720,
            ltv: 0.75,
            origination_year: Some(2015),
            dti: None,
            state: Some("TX".to_string()),
            itin: None,
        }
    }

    fn zero_hazard_rows(n: u32) -> Vec<MonthlyHazard> {
        (1..=n)
            .map(|t| MonthlyHazard {
                month: t,
                default_hazard: 0.0,
                prepayment: PrepaymentComponent::Hazard(0.0),
            })
            .collect()
    }

    #[test]
    fn test_deterministic_amortiser_reproduces_par_value() {
        // Scenario 1 (§8): zero default/prepay, discount = note rate -> NPV = UPB.
        let loan = sample_loan(120);
        let hazards = zero_hazard_rows(120);
        let scenario = Scenario::base_case();
        let config = ProjectionConfig {
            discount_rate_annual: 0.06,
            delinquency: DelinquencyConfig::default(),
        };
        let result = project_loan(&loan, &hazards, &scenario, &config).unwrap();
        assert!((result.present_value - 100_000.0).abs() < 1e-3);
    }

    #[test]
    fn test_balance_fully_amortises_with_no_default_or_prepay() {
        let loan = sample_loan(120);
        let hazards = zero_hazard_rows(120);
        let scenario = Scenario::base_case();
        let config = ProjectionConfig::default();
        let result = project_loan(&loan, &hazards, &scenario, &config).unwrap();
        // Every month's survival_prob should stay at 1.0 (no exits).
        for row in &result.months {
            assert!((row.survival_prob - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_single_month_remaining_term() {
        // Boundary behaviour (§8): remaining_term = 1 produces one cash flow.
        let loan = sample_loan(1);
        let hazards = zero_hazard_rows(1);
        let scenario = Scenario::base_case();
        let config = ProjectionConfig {
            discount_rate_annual: 0.06,
            delinquency: DelinquencyConfig::default(),
        };
        let result = project_loan(&loan, &hazards, &scenario, &config).unwrap();
        assert_eq!(result.months.len(), 1);
        let payment = loan.scheduled_payment();
        let expected_pv = payment / (1.0 + 0.06 / 12.0);
        assert!((result.months[0].present_value - expected_pv).abs() < 1e-6 * payment);
    }

    #[test]
    fn test_hazard_rejects_mismatched_schedule_length() {
        let loan = sample_loan(12);
        let hazards = zero_hazard_rows(10);
        let scenario = Scenario::base_case();
        let config = ProjectionConfig::default();
        assert!(project_loan(&loan, &hazards, &scenario, &config).is_err());
    }

    #[test]
    fn test_default_and_prepay_hazard_produces_finite_wal_and_pv() {
        let loan = sample_loan(60);
        let curve: Vec<f64> = (0..360).map(|t| (1.0 - t as f64 / 400.0).max(0.0)).collect();
        let survival = crate::models::SurvivalCurve::new(curve, 1).unwrap();
        let scenario = Scenario::base_case();
        let hazard_config = HazardConfig {
            mode: DecompositionMode::KmWithFlatDefault,
            target_annual_cdr: 0.02,
            ..HazardConfig::default()
        };
        let hazards = decompose(&loan, Some(&survival), None, &scenario, 0.06, &hazard_config);
        let config = ProjectionConfig::default();
        let result = project_loan(&loan, &hazards, &scenario, &config).unwrap();
        assert!(result.present_value.is_finite() && result.present_value > 0.0);
        assert!(result.wal_years.is_finite() && result.wal_years > 0.0);
        // Survival is monotone non-increasing: hazards only remove mass.
        for pair in result.months.windows(2) {
            assert!(pair[1].survival_prob <= pair[0].survival_prob + 1e-9);
        }
    }
}
