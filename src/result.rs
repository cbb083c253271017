//! Result Shaper & Bid Ladder (C6): builds the package-level valuation
//! result and re-prices a fixed NPV distribution across a ladder of
//! purchase prices (§4.6).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::ValuationError;
use crate::loan::Loan;
use crate::models::{FallbackTally, ModelArtifactInfo, RegistryData};
use crate::montecarlo::{percentiles_of, LoanValuationResult, Percentiles};

/// §3 `PackageValuationResult`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageValuationResult {
    pub loan_results: Vec<LoanValuationResult>,
    /// Flattened `(scenario, draw)` package NPVs — every loan's PV summed
    /// per draw (§4.5 "sum per draw").
    pub npv_distribution: Vec<f64>,
    pub npv_by_scenario: HashMap<String, f64>,
    pub roe_by_scenario: HashMap<String, f64>,
    pub roe_distribution: Vec<f64>,
    pub roe_percentiles: Percentiles,
    pub expected_npv: f64,
    pub npv_percentiles: Percentiles,
    pub total_upb: f64,
    pub purchase_price: Option<f64>,
    pub package_wal_years: f64,
    pub fallback_tally: FallbackTally,
    /// Loan ids excluded from one or more draws by a numeric error (§7),
    /// with the last recorded detail message.
    pub numeric_errors: Vec<(String, String)>,
}

/// §4.6 bid configuration.
#[derive(Debug, Clone)]
pub struct BidConfig {
    pub center_price: f64,
    pub increment: f64,
    pub target_roe: f64,
}

impl BidConfig {
    /// Defaults derived from a package's total UPB (§4.6: center price
    /// `round(UPB * 0.90)`, increment `10_000`).
    pub fn default_for_upb(total_upb: f64) -> Self {
        Self {
            center_price: (total_upb * 0.90).round(),
            increment: 10_000.0,
            target_roe: 0.0,
        }
    }
}

/// §3 `Bid Row`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BidRow {
    pub purchase_price: f64,
    pub expected_roe: f64,
    pub annualized_roe: f64,
    pub roe_percentiles: Percentiles,
    pub probability_roe_above_target: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BidLadder {
    pub rows: Vec<BidRow>,
}

/// Builds the package result from a completed Monte Carlo sweep (§4.6).
///
/// `purchase_price`, if supplied, seeds `roe_by_scenario`/`roe_distribution`
/// against that single price; a full price sweep is a separate call to
/// [`run_bid_analysis`].
pub fn shape_package_result(
    loan_results: Vec<LoanValuationResult>,
    npv_by_scenario: HashMap<String, Vec<f64>>,
    total_upb: f64,
    purchase_price: Option<f64>,
    fallback_tally: FallbackTally,
    numeric_errors: Vec<(String, String)>,
) -> PackageValuationResult {
    let npv_distribution: Vec<f64> = npv_by_scenario.values().flatten().copied().collect();
    let npv_mean_by_scenario: HashMap<String, f64> = npv_by_scenario
        .iter()
        .map(|(name, draws)| {
            let mean = if draws.is_empty() {
                0.0
            } else {
                draws.iter().sum::<f64>() / draws.len() as f64
            };
            (name.clone(), mean)
        })
        .collect();
    // §4.5: scenarios are equiprobable unless the caller supplies weights,
    // which is an open question the kernel deliberately does not expose yet.
    let expected_npv = if npv_mean_by_scenario.is_empty() {
        0.0
    } else {
        npv_mean_by_scenario.values().sum::<f64>() / npv_mean_by_scenario.len() as f64
    };
    let npv_percentiles = if npv_distribution.is_empty() {
        percentiles_of(&[0.0])
    } else {
        percentiles_of(&npv_distribution)
    };

    let total_weighted_wal: f64 = loan_results
        .iter()
        .zip(upb_weights(&loan_results))
        .map(|(lr, weight)| lr.wal_years * weight)
        .sum();

    let (roe_by_scenario, roe_distribution) = match purchase_price {
        Some(price) if price > 0.0 => {
            let by_scenario = npv_mean_by_scenario
                .iter()
                .map(|(name, npv)| (name.clone(), (npv - price) / price))
                .collect();
            let distribution = npv_distribution.iter().map(|npv| (npv - price) / price).collect();
            (by_scenario, distribution)
        }
        _ => (HashMap::new(), Vec::new()),
    };
    let roe_percentiles = if roe_distribution.is_empty() {
        percentiles_of(&[0.0])
    } else {
        percentiles_of(&roe_distribution)
    };

    PackageValuationResult {
        loan_results,
        npv_distribution,
        npv_by_scenario: npv_mean_by_scenario,
        roe_by_scenario,
        roe_distribution,
        roe_percentiles,
        expected_npv,
        npv_percentiles,
        total_upb,
        purchase_price,
        package_wal_years: total_weighted_wal,
        fallback_tally,
        numeric_errors,
    }
}

/// UPB weights for every loan in `loan_results`, in the order given, summing
/// to 1.0 (falling back to an equal split when the loans' combined UPB is
/// zero, which shouldn't happen for a valid package but guards the divide).
fn upb_weights(loan_results: &[LoanValuationResult]) -> Vec<f64> {
    let total: f64 = loan_results.iter().map(|lr| lr.upb).sum();
    if total <= 0.0 || loan_results.is_empty() {
        let n = loan_results.len().max(1) as f64;
        return vec![1.0 / n; loan_results.len()];
    }
    loan_results.iter().map(|lr| lr.upb / total).collect()
}

/// §6 `run_bid_analysis`: re-prices a fixed NPV distribution across a ladder
/// of purchase prices (§4.6). Independent of the projector — operates only
/// on the already-computed NPV distribution and the loans' remaining terms.
pub fn run_bid_analysis(
    npv_distribution: &[f64],
    loans: &[Loan],
    bid_config: &BidConfig,
) -> Result<BidLadder, ValuationError> {
    if npv_distribution.is_empty() {
        return Err(ValuationError::NumericError {
            loan_id: "<package>".to_string(),
            detail: "cannot build a bid ladder from an empty NPV distribution".to_string(),
        });
    }
    if loans.is_empty() {
        return Err(ValuationError::InvalidInput {
            loan_id: "<package>".to_string(),
            field: "loans",
            detail: "bid analysis requires at least one loan".to_string(),
        });
    }

    let avg_remaining_years = loans
        .iter()
        .map(|loan| loan.remaining_term as f64 / 12.0)
        .sum::<f64>()
        / loans.len() as f64;

    let mut rows = Vec::new();
    for i in -10..=10 {
        let price = bid_config.center_price + i as f64 * bid_config.increment;
        if price <= 0.0 {
            continue;
        }

        let roe_draws: Vec<f64> = npv_distribution.iter().map(|npv| (npv - price) / price).collect();
        let expected_roe = roe_draws.iter().sum::<f64>() / roe_draws.len() as f64;
        let annualized_roe = if avg_remaining_years > 0.0 {
            (1.0 + expected_roe).powf(1.0 / avg_remaining_years) - 1.0
        } else {
            expected_roe
        };
        let target_price_level = price * (1.0 + bid_config.target_roe);
        let hits = npv_distribution.iter().filter(|&&npv| npv >= target_price_level).count();
        let probability_roe_above_target = hits as f64 / npv_distribution.len() as f64;

        rows.push(BidRow {
            purchase_price: price,
            expected_roe,
            annualized_roe,
            roe_percentiles: percentiles_of(&roe_draws),
            probability_roe_above_target,
        });
    }

    Ok(BidLadder { rows })
}

/// §6 `model_status() -> ModelManifestView`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelManifestView {
    pub models: HashMap<String, ModelArtifactInfo>,
    pub default_curve_variant: String,
    pub curve_variants: Vec<String>,
}

/// §6 `leaf_detail(leaf_id) -> LeafView | NotFound`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeafView {
    pub leaf_id: u32,
    pub decision_path: Vec<String>,
    pub sample_count: u64,
    pub source_population_count: u64,
    pub curve_variants_available: Vec<String>,
}

/// Builds the model-status view from a registry snapshot (§4.1).
pub fn model_status(registry: &RegistryData) -> ModelManifestView {
    ModelManifestView {
        models: registry.model_infos.clone(),
        default_curve_variant: registry.default_curve_variant.clone(),
        curve_variants: registry.curve_variants.clone(),
    }
}

/// Builds the detail view for one segmentation leaf (§4.1/§4.2). Returns
/// [`ValuationError::VariantNotFound`] when the leaf id does not appear in
/// the segmentation tree — the kernel has no dedicated "not found" variant,
/// so this reuses the lookup-miss error already carried by the taxonomy.
pub fn leaf_detail(registry: &RegistryData, leaf_id: u32) -> Result<LeafView, ValuationError> {
    let tree = registry.segmentation_tree.as_ref().ok_or_else(|| {
        ValuationError::VariantNotFound("no segmentation tree loaded".to_string())
    })?;
    let info = tree
        .leaf_info(leaf_id)
        .ok_or_else(|| ValuationError::VariantNotFound(format!("leaf {leaf_id}")))?;
    let curve_variants_available = registry
        .survival_curves
        .iter()
        .filter(|(_, curves)| curves.contains_key(&leaf_id))
        .map(|(variant, _)| variant.clone())
        .collect();
    Ok(LeafView {
        leaf_id: info.leaf_id,
        decision_path: info.decision_path.clone(),
        sample_count: info.sample_count,
        source_population_count: info.source_population_count,
        curve_variants_available,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_loan() -> Loan {
        Loan {
            loan_id: "L1".to_string(),
            upb: 100_000.0,
            note_rate: 0.06,
            original_term: 120,
            remaining_term: 120,
            age: 0,
            credit_score: 700,
            ltv: 0.75,
            origination_year: None,
            dti: None,
            state: None,
            itin: None,
        }
    }

    #[test]
    fn test_bid_ladder_skips_non_positive_prices() {
        let loans = vec![sample_loan()];
        let bid_config = BidConfig {
            center_price: 5_000.0,
            increment: 10_000.0,
            target_roe: 0.0,
        };
        let ladder = run_bid_analysis(&[100_000.0; 30], &loans, &bid_config).unwrap();
        assert!(ladder.rows.iter().all(|r| r.purchase_price > 0.0));
    }

    #[test]
    fn test_bid_ladder_par_price_has_zero_roe() {
        let loans = vec![sample_loan()];
        let bid_config = BidConfig {
            center_price: 100_000.0,
            increment: 10_000.0,
            target_roe: 0.0,
        };
        let npv_distribution = vec![100_000.0; 50];
        let ladder = run_bid_analysis(&npv_distribution, &loans, &bid_config).unwrap();
        let par_row = ladder
            .rows
            .iter()
            .find(|r| (r.purchase_price - 100_000.0).abs() < 1e-6)
            .unwrap();
        assert!(par_row.expected_roe.abs() < 1e-9);
        assert!(par_row.annualized_roe.abs() < 1e-9);
        assert!((par_row.probability_roe_above_target - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_bid_ladder_rejects_empty_distribution() {
        let loans = vec![sample_loan()];
        let bid_config = BidConfig::default_for_upb(100_000.0);
        assert!(run_bid_analysis(&[], &loans, &bid_config).is_err());
    }

    #[test]
    fn test_default_bid_config_matches_spec_formula() {
        let config = BidConfig::default_for_upb(250_000.0);
        assert_eq!(config.center_price, 225_000.0);
        assert_eq!(config.increment, 10_000.0);
    }

    #[test]
    fn test_shape_package_result_computes_equal_weighted_expected_npv() {
        let npv_by_scenario: HashMap<String, Vec<f64>> = [
            ("base".to_string(), vec![100.0, 110.0]),
            ("stress".to_string(), vec![80.0, 90.0]),
        ]
        .into_iter()
        .collect();
        let result = shape_package_result(
            Vec::new(),
            npv_by_scenario,
            100_000.0,
            None,
            FallbackTally::default(),
            Vec::new(),
        );
        assert!((result.expected_npv - 95.0).abs() < 1e-9);
    }

    #[test]
    fn test_package_wal_is_upb_weighted_not_a_plain_mean() {
        let big = LoanValuationResult {
            loan_id: "big".to_string(),
            leaf_id: 1,
            upb: 300_000.0,
            expected_pv: 0.0,
            pv_by_scenario: HashMap::new(),
            pv_distribution: Vec::new(),
            pv_percentiles: percentiles_of(&[0.0]),
            expected_cash_flows: Vec::new(),
            wal_years: 10.0,
        };
        let small = LoanValuationResult {
            loan_id: "small".to_string(),
            leaf_id: 1,
            upb: 100_000.0,
            expected_pv: 0.0,
            pv_by_scenario: HashMap::new(),
            pv_distribution: Vec::new(),
            pv_percentiles: percentiles_of(&[0.0]),
            expected_cash_flows: Vec::new(),
            wal_years: 2.0,
        };
        let result = shape_package_result(
            vec![big, small],
            HashMap::new(),
            400_000.0,
            None,
            FallbackTally::default(),
            Vec::new(),
        );
        // UPB-weighted: 0.75 * 10 + 0.25 * 2 = 8.0, not the plain mean (6.0).
        assert!((result.package_wal_years - 8.0).abs() < 1e-9);
    }
}
