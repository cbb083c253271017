//! Monthly state carried forward across the projection loop (§4.4).

use std::collections::HashMap;

/// Probability mass held in each non-absorbing state, plus the running
/// balance and cumulative absorbed mass. One instance is threaded through
/// the whole projection for a loan.
#[derive(Debug, Clone)]
pub struct ProjectionState {
    pub balance: f64,
    pub p_current: f64,
    pub p_d30: f64,
    pub p_d60: f64,
    pub p_d90: f64,
    /// Mass that has permanently exited (voluntary prepayment, or a
    /// defaulted loan that has resolved through foreclosure sale).
    pub p_resolved: f64,
    /// Recovery cash scheduled for a future month, keyed by the absolute
    /// month it matures at (§4.4: "whose foreclosure timer matures at t").
    pending_recovery: HashMap<u32, f64>,
    /// Probability mass awaiting foreclosure resolution, keyed by the
    /// month it resolves into `p_resolved`.
    pending_default_mass: HashMap<u32, f64>,
}

impl ProjectionState {
    pub fn new(initial_balance: f64) -> Self {
        Self {
            balance: initial_balance,
            p_current: 1.0,
            p_d30: 0.0,
            p_d60: 0.0,
            p_d90: 0.0,
            p_resolved: 0.0,
            pending_recovery: HashMap::new(),
            pending_default_mass: HashMap::new(),
        }
    }

    /// Mass still obligated to the contractual schedule: performing or
    /// delinquent, not yet permanently exited (§4.4 `survival_prob`).
    pub fn survival_prob(&self) -> f64 {
        self.p_current + self.p_d30 + self.p_d60 + self.p_d90
    }

    pub fn schedule_recovery(&mut self, maturity_month: u32, cash: f64) {
        *self.pending_recovery.entry(maturity_month).or_insert(0.0) += cash;
    }

    /// Recovery cash maturing at `month`, removed from the schedule.
    pub fn take_recovery(&mut self, month: u32) -> f64 {
        self.pending_recovery.remove(&month).unwrap_or(0.0)
    }

    pub fn schedule_default_resolution(&mut self, maturity_month: u32, mass: f64) {
        *self
            .pending_default_mass
            .entry(maturity_month)
            .or_insert(0.0) += mass;
    }

    /// Mass resolving out of foreclosure into `p_resolved` at `month`.
    pub fn take_default_resolution(&mut self, month: u32) -> f64 {
        self.pending_default_mass.remove(&month).unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_is_fully_current() {
        let state = ProjectionState::new(100_000.0);
        assert_eq!(state.survival_prob(), 1.0);
        assert_eq!(state.p_resolved, 0.0);
    }

    #[test]
    fn test_recovery_schedule_round_trips() {
        let mut state = ProjectionState::new(100_000.0);
        state.schedule_recovery(12, 500.0);
        state.schedule_recovery(12, 250.0);
        assert_eq!(state.take_recovery(12), 750.0);
        assert_eq!(state.take_recovery(12), 0.0);
    }
}
