//! Cash-flow output structures for a single loan's projection (§3, §4.4).

use serde::{Deserialize, Serialize};

/// A single month's projected cash flow for one loan.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MonthlyCashFlow {
    pub month: u32,
    /// Probability the loan is still obligated to the contractual
    /// schedule (performing or delinquent, not yet permanently exited).
    pub survival_prob: f64,
    pub scheduled_payment: f64,
    pub expected_payment: f64,
    pub delinquency_prob: f64,
    /// Probability of newly entering the `default` disposition this month.
    pub default_prob: f64,
    pub expected_loss: f64,
    pub expected_recovery: f64,
    pub servicing_cost: f64,
    pub net_cash_flow: f64,
    pub discount_factor: f64,
    pub present_value: f64,
}

/// The full monthly cash-flow sequence for one loan, plus its summary
/// statistics (§3 `LoanValuationResult`'s per-draw cash-flow sequence).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectionResult {
    pub loan_id: String,
    pub leaf_id: u32,
    pub months: Vec<MonthlyCashFlow>,
    pub present_value: f64,
    /// Weighted-average life, in years (§4.5).
    pub wal_years: f64,
}

impl ProjectionResult {
    /// Weighted-average life: `Σ t · expected_principal[t] / Σ expected_principal[t]`,
    /// in years (§4.5). `expected_principal[t]` is approximated here as the
    /// month's expected payment net of the expected-loss-adjusted interest
    /// portion, i.e. the principal actually returned to the investor that
    /// month through either scheduled amortisation or payoff.
    pub fn weighted_average_life_years(months: &[MonthlyCashFlow], principal_by_month: &[f64]) -> f64 {
        let total_principal: f64 = principal_by_month.iter().sum();
        if total_principal <= 0.0 {
            return 0.0;
        }
        let weighted: f64 = months
            .iter()
            .zip(principal_by_month.iter())
            .map(|(m, p)| m.month as f64 * p)
            .sum();
        (weighted / total_principal) / 12.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wal_single_month_is_that_month_in_years() {
        let months = vec![MonthlyCashFlow {
            month: 6,
            survival_prob: 1.0,
            scheduled_payment: 1000.0,
            expected_payment: 1000.0,
            delinquency_prob: 0.0,
            default_prob: 0.0,
            expected_loss: 0.0,
            expected_recovery: 0.0,
            servicing_cost: 0.0,
            net_cash_flow: 1000.0,
            discount_factor: 1.0,
            present_value: 1000.0,
        }];
        let principal = vec![100_000.0];
        let wal = ProjectionResult::weighted_average_life_years(&months, &principal);
        assert!((wal - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_wal_is_zero_when_no_principal_returned() {
        let wal = ProjectionResult::weighted_average_life_years(&[], &[]);
        assert_eq!(wal, 0.0);
    }
}
