//! Top-level valuation kernel: wires the model registry, leaf assigner,
//! hazard decomposer, projector, Monte Carlo driver, and result shaper
//! behind the four inbound operations of §6.

use std::env;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::time::{Duration, Instant};

use crate::error::ValuationError;
use crate::hazard::{DecompositionMode, HazardConfig};
use crate::loan::Loan;
use crate::models::{assign_leaf, FallbackTally, ModelRegistry};
use crate::montecarlo::{run_monte_carlo, LoanContext, SimulationConfig};
use crate::projection::{DelinquencyConfig, ProjectionConfig};
use crate::result::{
    leaf_detail as build_leaf_detail, model_status as build_model_status, run_bid_analysis as shape_bid_analysis,
    shape_package_result, BidConfig, BidLadder, LeafView, ModelManifestView, PackageValuationResult,
};

/// §6 process configuration, read from environment variables with
/// hard-coded fallbacks when unset.
#[derive(Debug, Clone)]
pub struct KernelConfig {
    pub artifact_root: PathBuf,
    pub default_curve_variant: Option<String>,
    pub default_discount_rate: f64,
    pub default_seasoning_ramp_months: f64,
    pub default_shock_sigma: f64,
    pub default_shock_rho: f64,
    pub default_num_draws: u32,
    pub cpu_pool_size: Option<usize>,
}

fn env_f64(key: &str, default: f64) -> f64 {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

impl KernelConfig {
    /// Reads `ARTIFACT_ROOT`, `DEFAULT_CURVE_VARIANT`, `DEFAULT_DISCOUNT_RATE`,
    /// `DEFAULT_SEASONING_RAMP_MONTHS`, `DEFAULT_SHOCK_SIGMA`,
    /// `DEFAULT_SHOCK_RHO`, `DEFAULT_NUM_DRAWS`, `CPU_POOL_SIZE` (§6).
    pub fn from_env() -> Self {
        Self {
            artifact_root: env::var("ARTIFACT_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./artifacts")),
            default_curve_variant: env::var("DEFAULT_CURVE_VARIANT").ok(),
            default_discount_rate: env_f64("DEFAULT_DISCOUNT_RATE", 0.06),
            default_seasoning_ramp_months: env_f64("DEFAULT_SEASONING_RAMP_MONTHS", 30.0),
            default_shock_sigma: env_f64("DEFAULT_SHOCK_SIGMA", 0.15),
            default_shock_rho: env_f64("DEFAULT_SHOCK_RHO", 0.30),
            default_num_draws: env_u32("DEFAULT_NUM_DRAWS", 1000),
            cpu_pool_size: env::var("CPU_POOL_SIZE").ok().and_then(|v| v.parse().ok()),
        }
    }
}

/// Per-call overrides layered on top of [`KernelConfig`]'s process defaults.
#[derive(Debug, Clone)]
pub struct ValuationRequest {
    pub scenarios: Vec<String>,
    pub decomposition_mode: DecompositionMode,
    pub simulation: SimulationConfig,
    pub purchase_price: Option<f64>,
    pub curve_variant: Option<String>,
    pub deadline: Option<Duration>,
}

impl Default for ValuationRequest {
    fn default() -> Self {
        Self {
            scenarios: vec!["base".to_string()],
            decomposition_mode: DecompositionMode::KmWithFlatDefault,
            simulation: SimulationConfig::default(),
            purchase_price: None,
            curve_variant: None,
            deadline: None,
        }
    }
}

/// The assembled valuation kernel (§2): owns the model registry and process
/// defaults, and exposes the §6 inbound operations.
pub struct ValuationKernel {
    pub registry: ModelRegistry,
    pub config: KernelConfig,
}

impl ValuationKernel {
    pub fn load(config: KernelConfig) -> Result<Self, ValuationError> {
        if let Some(num_threads) = config.cpu_pool_size {
            // Best-effort: a second call (e.g. in tests) would fail to
            // install twice, which is harmless — draws still run, just on
            // whatever pool is already global.
            let _ = rayon::ThreadPoolBuilder::new()
                .num_threads(num_threads)
                .build_global();
        }
        let registry = ModelRegistry::load(&config.artifact_root)?;
        Ok(Self { registry, config })
    }

    /// §6 `run_valuation(package, config) -> PackageValuationResult | Error`.
    pub fn run_valuation(
        &self,
        package: &[Loan],
        request: &ValuationRequest,
        cancel: &AtomicBool,
    ) -> Result<PackageValuationResult, ValuationError> {
        for loan in package {
            loan.validate()?;
        }

        let snapshot = self.registry.snapshot();
        let curve_variant = request
            .curve_variant
            .as_deref()
            .or(self.config.default_curve_variant.as_deref());

        let mut tally = FallbackTally::default();
        let mut leaf_ids = Vec::with_capacity(package.len());
        for loan in package {
            let (leaf_id, _tier) = assign_leaf(
                loan,
                snapshot.segmentation_tree.as_ref(),
                snapshot.rules_table.as_ref(),
                &snapshot.state_groups,
                &mut tally,
            );
            leaf_ids.push(leaf_id);
        }

        let survival_curves: Vec<_> = package
            .iter()
            .zip(leaf_ids.iter())
            .map(|(_, &leaf_id)| snapshot.survival_curve(curve_variant, leaf_id).ok())
            .collect();

        let loan_contexts: Vec<LoanContext> = package
            .iter()
            .zip(leaf_ids.iter())
            .zip(survival_curves.iter())
            .map(|((loan, &leaf_id), &survival)| LoanContext {
                loan,
                leaf_id,
                survival,
                apex2: Some(&snapshot.apex2),
            })
            .collect();

        let scenarios: Vec<_> = request
            .scenarios
            .iter()
            .map(|name| snapshot.scenarios.get(name))
            .collect::<Result<Vec<_>, ValuationError>>()?;

        let hazard_config = HazardConfig {
            mode: request.decomposition_mode,
            seasoning_ramp_months: self.config.default_seasoning_ramp_months,
            ..HazardConfig::default()
        };
        let projection_config = ProjectionConfig {
            discount_rate_annual: self.config.default_discount_rate,
            delinquency: DelinquencyConfig::default(),
        };

        let deadline = Instant::now() + request.deadline.unwrap_or(Duration::from_secs(300));

        let outcome = run_monte_carlo(
            &loan_contexts,
            &scenarios,
            &request.simulation,
            &hazard_config,
            self.config.default_discount_rate,
            &projection_config,
            cancel,
            deadline,
        )?;

        let total_upb: f64 = package.iter().map(|l| l.upb).sum();
        Ok(shape_package_result(
            outcome.loan_results,
            outcome.npv_by_scenario,
            total_upb,
            request.purchase_price,
            tally,
            outcome.numeric_errors,
        ))
    }

    /// §6 `run_bid_analysis(npv_distribution, loans, bid_config) -> BidLadder | Error`.
    pub fn run_bid_analysis(
        &self,
        npv_distribution: &[f64],
        loans: &[Loan],
        bid_config: &BidConfig,
    ) -> Result<BidLadder, ValuationError> {
        shape_bid_analysis(npv_distribution, loans, bid_config)
    }

    /// §6 `model_status() -> ModelManifestView`.
    pub fn model_status(&self) -> ModelManifestView {
        build_model_status(&self.registry.snapshot())
    }

    /// §6 `leaf_detail(leaf_id) -> LeafView | NotFound`.
    pub fn leaf_detail(&self, leaf_id: u32) -> Result<LeafView, ValuationError> {
        build_leaf_detail(&self.registry.snapshot(), leaf_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_fixture(dir: &std::path::Path) {
        fs::write(
            dir.join("manifest.json"),
            r#"{
                "default_curve_variant": "baseline",
                "curve_variants": ["baseline"],
                "state_groups": {"TX": 1.0, "CA": 2.0},
                "models": {
                    "segmentation_tree": {"status": "real", "version": "2024.1"},
                    "apex2": {"status": "real", "version": "2024.1"}
                }
            }"#,
        )
        .unwrap();
        let flat_survival: Vec<f64> = (0..360).map(|t| (1.0 - t as f64 / 720.0).max(0.0)).collect();
        let body = serde_json::json!({ "leaf_curves": { "1": flat_survival } });
        fs::write(dir.join("survival_baseline.json"), serde_json::to_string(&body).unwrap()).unwrap();
        fs::create_dir_all(dir.join("apex2")).unwrap();
        let one_band = serde_json::json!({"inf": 1.0, "no_score": 1.0});
        for file in [
            "credit_rates.json",
            "rate_delta_rates.json",
            "ltv_rates.json",
            "loan_size_rates.json",
        ] {
            fs::write(dir.join("apex2").join(file), serde_json::to_string(&one_band).unwrap()).unwrap();
        }
        let scenarios = serde_json::json!({
            "scenarios": [
                {"name": "base", "prepay_multiplier": 1.0, "default_multiplier": 1.0},
                {"name": "stress", "prepay_multiplier": 0.5, "default_multiplier": 2.0, "severity_multiplier": 1.5}
            ]
        });
        fs::write(dir.join("scenarios.json"), serde_json::to_string(&scenarios).unwrap()).unwrap();
    }

    fn sample_loan() -> Loan {
        Loan {
            loan_id: "L1".to_string(),
            upb: 100_000.0,
            note_rate: 0.06,
            original_term: 120,
            remaining_term: 60,
            age: 12,
            credit_score: 700,
            ltv: 0.80,
            origination_year: Some(2019),
            dti: None,
            state: Some("TX".to_string()),
            itin: None,
        }
    }

    fn with_fixture_kernel<F: FnOnce(ValuationKernel)>(test_name: &str, f: F) {
        let dir = std::env::temp_dir().join(format!("mortgage_pool_kernel_{test_name}_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        write_fixture(&dir);
        let config = KernelConfig {
            artifact_root: dir.clone(),
            default_curve_variant: None,
            default_discount_rate: 0.06,
            default_seasoning_ramp_months: 30.0,
            default_shock_sigma: 0.15,
            default_shock_rho: 0.30,
            default_num_draws: 20,
            cpu_pool_size: None,
        };
        let kernel = ValuationKernel::load(config).unwrap();
        f(kernel);
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_run_valuation_end_to_end_produces_ordered_percentiles() {
        with_fixture_kernel("e2e", |kernel| {
            let loans = vec![sample_loan()];
            let request = ValuationRequest {
                scenarios: vec!["base".to_string()],
                simulation: SimulationConfig {
                    num_draws: 20,
                    include_stochastic: true,
                    seed: Some(7),
                    ..Default::default()
                },
                ..ValuationRequest::default()
            };
            let cancel = AtomicBool::new(false);
            let result = kernel.run_valuation(&loans, &request, &cancel).unwrap();
            assert_eq!(result.total_upb, 100_000.0);
            assert!(result.npv_percentiles.p5 <= result.npv_percentiles.p50);
            assert!(result.npv_percentiles.p50 <= result.npv_percentiles.p95);
            assert_eq!(result.loan_results.len(), 1);
        });
    }

    #[test]
    fn test_run_valuation_rejects_invalid_loan() {
        with_fixture_kernel("invalid", |kernel| {
            let mut loan = sample_loan();
            loan.upb = -1.0;
            let request = ValuationRequest::default();
            let cancel = AtomicBool::new(false);
            let result = kernel.run_valuation(&[loan], &request, &cancel);
            assert!(matches!(result, Err(ValuationError::InvalidInput { .. })));
        });
    }

    #[test]
    fn test_model_status_reports_loaded_models() {
        with_fixture_kernel("status", |kernel| {
            let status = kernel.model_status();
            assert!(status.models.contains_key("apex2"));
            assert_eq!(status.default_curve_variant, "baseline");
        });
    }

    #[test]
    fn test_leaf_detail_not_found_without_tree() {
        with_fixture_kernel("leaf", |kernel| {
            let result = kernel.leaf_detail(1);
            assert!(result.is_err());
        });
    }
}
