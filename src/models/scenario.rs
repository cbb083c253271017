//! Named macroeconomic scenarios: hazard multipliers plus an optional
//! discount/treasury curve.

use std::collections::HashMap;

use crate::error::ValuationError;

/// Treasury par-yield curve, given at a handful of maturity pillars and
/// interpolated linearly between them (§4.4 discounting).
#[derive(Debug, Clone)]
pub struct TreasuryCurve {
    /// `(maturity_months, annual_rate)` pairs, ascending by maturity.
    pillars: Vec<(f64, f64)>,
}

/// Standard pillar maturities, in months (§3).
pub const STANDARD_PILLARS_MONTHS: [f64; 4] = [0.0, 12.0, 24.0, 60.0];

impl TreasuryCurve {
    pub fn new(mut pillars: Vec<(f64, f64)>) -> Result<Self, ValuationError> {
        if pillars.len() < 2 {
            return Err(ValuationError::BadFormat {
                path: "treasury curve".into(),
                detail: "must carry at least two pillars".to_string(),
            });
        }
        pillars.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
        Ok(Self { pillars })
    }

    /// Piecewise-linear interpolation of the annual rate at `month`,
    /// clamping to the first/last pillar outside the curve's domain.
    pub fn rate_at(&self, month: f64) -> f64 {
        if month <= self.pillars[0].0 {
            return self.pillars[0].1;
        }
        let last = self.pillars.len() - 1;
        if month >= self.pillars[last].0 {
            return self.pillars[last].1;
        }
        for window in self.pillars.windows(2) {
            let (m0, r0) = window[0];
            let (m1, r1) = window[1];
            if month >= m0 && month <= m1 {
                let frac = (month - m0) / (m1 - m0);
                return r0 + frac * (r1 - r0);
            }
        }
        self.pillars[last].1
    }
}

/// A named macroeconomic scenario: hazard multipliers applied on top of the
/// baseline leaf curves, plus an optional discount curve (§3, §4.4). When
/// `treasury_curve` is absent, the caller-supplied flat discount rate
/// applies instead.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub name: String,
    pub prepay_multiplier: f64,
    pub default_multiplier: f64,
    pub severity_multiplier: f64,
    pub treasury_curve: Option<TreasuryCurve>,
}

impl Scenario {
    pub fn base_case() -> Self {
        Self {
            name: "base".to_string(),
            prepay_multiplier: 1.0,
            default_multiplier: 1.0,
            severity_multiplier: 1.0,
            treasury_curve: None,
        }
    }
}

/// The registered set of scenarios a valuation run may select from.
#[derive(Debug, Clone, Default)]
pub struct ScenarioCatalogue {
    scenarios: HashMap<String, Scenario>,
}

impl ScenarioCatalogue {
    pub fn new(scenarios: Vec<Scenario>) -> Self {
        Self {
            scenarios: scenarios.into_iter().map(|s| (s.name.clone(), s)).collect(),
        }
    }

    pub fn get(&self, name: &str) -> Result<&Scenario, ValuationError> {
        self.scenarios
            .get(name)
            .ok_or_else(|| ValuationError::VariantNotFound(name.to_string()))
    }

    pub fn names(&self) -> Vec<&str> {
        self.scenarios.keys().map(|s| s.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_curve() -> TreasuryCurve {
        TreasuryCurve::new(vec![(0.0, 0.02), (12.0, 0.03), (24.0, 0.035), (60.0, 0.04)]).unwrap()
    }

    #[test]
    fn test_treasury_curve_interpolates_between_pillars() {
        let curve = sample_curve();
        let mid = curve.rate_at(6.0);
        assert!((mid - 0.025).abs() < 1e-9);
    }

    #[test]
    fn test_treasury_curve_exact_pillar() {
        let curve = sample_curve();
        assert!((curve.rate_at(12.0) - 0.03).abs() < 1e-9);
    }

    #[test]
    fn test_treasury_curve_clamps_outside_domain() {
        let curve = sample_curve();
        assert_eq!(curve.rate_at(-5.0), curve.rate_at(0.0));
        assert_eq!(curve.rate_at(1000.0), curve.rate_at(60.0));
    }

    #[test]
    fn test_scenario_catalogue_lookup() {
        let catalogue = ScenarioCatalogue::new(vec![Scenario::base_case()]);
        assert!(catalogue.get("base").is_ok());
        assert!(catalogue.get("missing").is_err());
    }
}
