//! Monte Carlo Driver (C5): repeats the projector under correlated shocks
//! and aggregates loan-level cash flows into package-level distributions
//! (§4.5).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use rayon::prelude::*;

use crate::error::ValuationError;
use crate::hazard::{decompose, HazardConfig, MonthlyHazard, PrepaymentComponent};
use crate::loan::Loan;
use crate::models::{Apex2Tables, Scenario, SurvivalCurve};
use crate::projection::{project_loan, MonthlyCashFlow, ProjectionConfig};

use super::shock::{draw_common_factor, draw_loan_shocks, flat_shocks, seed_for_draw, ShockConfig};
use super::stats::{percentiles_of, Percentiles};

/// Everything the hazard decomposer and projector need for one loan,
/// resolved ahead of time by the caller (C1 registry lookup + C2 leaf
/// assignment happen before the Monte Carlo loop runs).
pub struct LoanContext<'a> {
    pub loan: &'a Loan,
    pub leaf_id: u32,
    pub survival: Option<&'a SurvivalCurve>,
    pub apex2: Option<&'a Apex2Tables>,
}

/// §3 `SimulationConfig`.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub num_draws: u32,
    pub include_stochastic: bool,
    pub seed: Option<u64>,
    pub shock: ShockConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            num_draws: 1000,
            include_stochastic: true,
            seed: None,
            shock: ShockConfig::default(),
        }
    }
}

/// §3 `LoanValuationResult`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LoanValuationResult {
    pub loan_id: String,
    pub leaf_id: u32,
    /// Unpaid principal balance at valuation (§4.5: package WAL is
    /// UPB-weighted across loans).
    pub upb: f64,
    pub expected_pv: f64,
    pub pv_by_scenario: HashMap<String, f64>,
    pub pv_distribution: Vec<f64>,
    pub pv_percentiles: Percentiles,
    pub expected_cash_flows: Vec<MonthlyCashFlow>,
    pub wal_years: f64,
}

/// Everything the Monte Carlo driver produces, before C6 shapes it into the
/// external-facing result objects.
pub struct MonteCarloOutcome {
    /// Package NPV for every (scenario, draw) pair that actually ran.
    pub npv_by_scenario: HashMap<String, Vec<f64>>,
    pub loan_results: Vec<LoanValuationResult>,
    /// `(loan_id, detail)` for every loan excluded from a draw by a
    /// [`ValuationError::NumericError`] (§7: isolated, not fatal).
    pub numeric_errors: Vec<(String, String)>,
    pub cancelled: bool,
}

fn apply_shocks(
    base: &[MonthlyHazard],
    default_mult: &[f64],
    prepay_mult: &[f64],
) -> Vec<MonthlyHazard> {
    base.iter()
        .zip(default_mult.iter())
        .zip(prepay_mult.iter())
        .map(|((row, &dm), &pm)| {
            let default_hazard = (row.default_hazard * dm).clamp(0.0, 1.0);
            let prepayment = match row.prepayment {
                PrepaymentComponent::Hazard(h) => {
                    PrepaymentComponent::Hazard((h * pm).clamp(0.0, (1.0 - default_hazard).max(0.0)))
                }
                PrepaymentComponent::ExtraPrincipalDollars(d) => {
                    PrepaymentComponent::ExtraPrincipalDollars((d * pm).max(0.0))
                }
            };
            MonthlyHazard {
                month: row.month,
                default_hazard,
                prepayment,
            }
        })
        .collect()
}

/// One (scenario, draw) pass over every loan in the package: sums loan PVs
/// into a package NPV and records each loan's own PV for its distribution.
fn run_one_draw(
    loans: &[LoanContext],
    base_hazards: &[Vec<MonthlyHazard>],
    scenario: &Scenario,
    draw_seed: u64,
    include_stochastic: bool,
    shock: &ShockConfig,
    projection_config: &ProjectionConfig,
) -> (f64, Vec<Option<f64>>, Vec<(String, String)>) {
    let max_months = loans
        .iter()
        .map(|ctx| ctx.loan.remaining_term as usize)
        .max()
        .unwrap_or(0);
    let common_factor = if include_stochastic {
        draw_common_factor(draw_seed, max_months)
    } else {
        Vec::new()
    };

    let mut package_npv = 0.0;
    let mut per_loan_pv = Vec::with_capacity(loans.len());
    let mut errors = Vec::new();

    for (i, ctx) in loans.iter().enumerate() {
        let n_months = ctx.loan.remaining_term as usize;
        let shocks = if include_stochastic {
            draw_loan_shocks(draw_seed, i, &common_factor[..n_months], shock)
        } else {
            flat_shocks(n_months)
        };
        let shocked = apply_shocks(&base_hazards[i], &shocks.default_mult, &shocks.prepay_mult);

        match project_loan(ctx.loan, &shocked, scenario, projection_config) {
            Ok(result) => {
                package_npv += result.present_value;
                per_loan_pv.push(Some(result.present_value));
            }
            Err(ValuationError::NumericError { loan_id, detail }) => {
                errors.push((loan_id, detail));
                per_loan_pv.push(None);
            }
            Err(other) => {
                errors.push((ctx.loan.loan_id.clone(), other.to_string()));
                per_loan_pv.push(None);
            }
        }
    }

    (package_npv, per_loan_pv, errors)
}

/// Runs the full Monte Carlo sweep: every enabled scenario, `num_draws`
/// draws each (forced to 1 when `include_stochastic` is false), every loan
/// in the package per draw (§4.5 "the three loops are commutable").
///
/// Draws within a scenario are dispatched to rayon's global pool (§5); the
/// cancellation flag and deadline are checked once per draw rather than once
/// per loan, matching §9's "cooperative between draws" cancellation model.
pub fn run_monte_carlo(
    loans: &[LoanContext],
    scenarios: &[&Scenario],
    sim_config: &SimulationConfig,
    hazard_config: &HazardConfig,
    fallback_discount_rate: f64,
    projection_config: &ProjectionConfig,
    cancel: &AtomicBool,
    deadline: Instant,
) -> Result<MonteCarloOutcome, ValuationError> {
    if scenarios.is_empty() {
        return Err(ValuationError::VariantNotFound(
            "no scenarios enabled for this valuation".to_string(),
        ));
    }

    let num_draws = if sim_config.include_stochastic {
        sim_config.num_draws.max(1)
    } else {
        1
    };
    let run_seed = sim_config.seed.unwrap_or(0);

    // Base hazards depend on (loan, scenario) but not on the draw index —
    // the shock multiplier is layered on afterwards, so this is computed
    // once per scenario rather than once per draw.
    let base_hazards_by_scenario: HashMap<String, Vec<Vec<MonthlyHazard>>> = scenarios
        .iter()
        .map(|scenario| {
            let per_loan = loans
                .iter()
                .map(|ctx| {
                    decompose(
                        ctx.loan,
                        ctx.survival,
                        ctx.apex2,
                        scenario,
                        fallback_discount_rate,
                        hazard_config,
                    )
                })
                .collect();
            (scenario.name.clone(), per_loan)
        })
        .collect();

    let mut npv_by_scenario: HashMap<String, Vec<f64>> = HashMap::new();
    let mut per_loan_pv_by_scenario: HashMap<String, Vec<Vec<f64>>> = HashMap::new();
    let mut numeric_errors = Vec::new();
    let mut cancelled = false;

    'scenarios: for scenario in scenarios {
        let base_hazards = &base_hazards_by_scenario[&scenario.name];

        let draw_outcomes: Vec<_> = (0..num_draws)
            .into_par_iter()
            .map(|draw| {
                if cancel.load(Ordering::Relaxed) || Instant::now() >= deadline {
                    return None;
                }
                let seed = seed_for_draw(run_seed, &scenario.name, draw as u64);
                Some(run_one_draw(
                    loans,
                    base_hazards,
                    scenario,
                    seed,
                    sim_config.include_stochastic,
                    &sim_config.shock,
                    projection_config,
                ))
            })
            .collect();

        let mut npvs = Vec::with_capacity(num_draws as usize);
        let mut per_loan_pvs: Vec<Vec<f64>> = vec![Vec::new(); loans.len()];
        for outcome in draw_outcomes {
            match outcome {
                Some((npv, per_loan, mut errs)) => {
                    npvs.push(npv);
                    for (i, pv) in per_loan.into_iter().enumerate() {
                        if let Some(pv) = pv {
                            per_loan_pvs[i].push(pv);
                        }
                    }
                    numeric_errors.append(&mut errs);
                }
                None => {
                    cancelled = true;
                    break 'scenarios;
                }
            }
        }
        npv_by_scenario.insert(scenario.name.clone(), npvs);
        per_loan_pv_by_scenario.insert(scenario.name.clone(), per_loan_pvs);
    }

    if cancelled {
        return Err(ValuationError::Cancelled);
    }
    if Instant::now() >= deadline {
        return Err(ValuationError::Timeout);
    }

    let representative_scenario = scenarios[0];
    let mut loan_results = Vec::with_capacity(loans.len());
    for (i, ctx) in loans.iter().enumerate() {
        let mut pv_distribution = Vec::new();
        let mut pv_by_scenario = HashMap::new();
        for scenario in scenarios {
            if let Some(pvs) = per_loan_pv_by_scenario.get(&scenario.name) {
                let loan_pvs = &pvs[i];
                if !loan_pvs.is_empty() {
                    let mean = loan_pvs.iter().sum::<f64>() / loan_pvs.len() as f64;
                    pv_by_scenario.insert(scenario.name.clone(), mean);
                    pv_distribution.extend_from_slice(loan_pvs);
                }
            }
        }
        let expected_pv = if pv_by_scenario.is_empty() {
            0.0
        } else {
            pv_by_scenario.values().sum::<f64>() / pv_by_scenario.len() as f64
        };
        let pv_percentiles = if pv_distribution.is_empty() {
            percentiles_of(&[0.0])
        } else {
            percentiles_of(&pv_distribution)
        };

        // Deterministic (no-shock) pass under the first enabled scenario
        // supplies the "expected" cash-flow sequence and WAL carried in the
        // result (§3) — representative rather than re-averaging every
        // month across every draw.
        let base_hazards = &base_hazards_by_scenario[&representative_scenario.name][i];
        let deterministic = project_loan(ctx.loan, base_hazards, representative_scenario, projection_config);
        let (expected_cash_flows, wal_years) = match deterministic {
            Ok(result) => (result.months, result.wal_years),
            Err(_) => (Vec::new(), 0.0),
        };

        loan_results.push(LoanValuationResult {
            loan_id: ctx.loan.loan_id.clone(),
            leaf_id: ctx.leaf_id,
            upb: ctx.loan.upb,
            expected_pv,
            pv_by_scenario,
            pv_distribution,
            pv_percentiles,
            expected_cash_flows,
            wal_years,
        });
    }

    Ok(MonteCarloOutcome {
        npv_by_scenario,
        loan_results,
        numeric_errors,
        cancelled: false,
    })
}
