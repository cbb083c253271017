//! AWS Lambda host adapter for the mortgage pool valuation kernel
//!
//! Thin request/response wrapper (§6 "the kernel is embedded behind a thin
//! request/response layer"): the model registry loads once at cold start,
//! every invocation runs one valuation against it.

use std::io::Cursor;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use lambda_runtime::{service_fn, Error, LambdaEvent};
use mortgage_pool_kernel::kernel::{KernelConfig, ValuationKernel, ValuationRequest};
use mortgage_pool_kernel::loan::load_loans_from_reader;
use serde::{Deserialize, Serialize};

/// Input payload for one valuation request.
#[derive(Debug, Deserialize)]
pub struct ValuationRequestPayload {
    /// Loan tape as a CSV string (LoanID, UPB, NoteRate, OriginalTerm, ...).
    pub loan_tape_csv: String,

    /// Scenario names to run (default: just `base`).
    #[serde(default = "default_scenarios")]
    pub scenarios: Vec<String>,

    /// Number of Monte Carlo draws per scenario (default: 1000).
    #[serde(default = "default_num_draws")]
    pub num_draws: u32,

    /// Whether to apply stochastic shocks at all (default: true).
    #[serde(default = "default_true")]
    pub include_stochastic: bool,

    /// Optional RNG seed for reproducible draws.
    #[serde(default)]
    pub seed: Option<u64>,

    /// Optional purchase price to compute ROE against.
    #[serde(default)]
    pub purchase_price: Option<f64>,
}

fn default_scenarios() -> Vec<String> {
    vec!["base".to_string()]
}
fn default_num_draws() -> u32 {
    1000
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct ValuationResponsePayload {
    pub loan_count: usize,
    pub total_upb: f64,
    pub expected_npv: f64,
    pub npv_p5: f64,
    pub npv_p50: f64,
    pub npv_p95: f64,
    pub package_wal_years: f64,
    pub numeric_error_count: usize,
    pub execution_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn error_response(loan_count: usize, execution_time_ms: u64, message: String) -> ValuationResponsePayload {
    ValuationResponsePayload {
        loan_count,
        total_upb: 0.0,
        expected_npv: 0.0,
        npv_p5: 0.0,
        npv_p50: 0.0,
        npv_p95: 0.0,
        package_wal_years: 0.0,
        numeric_error_count: 0,
        execution_time_ms,
        error: Some(message),
    }
}

async fn handler(
    kernel: Arc<ValuationKernel>,
    event: LambdaEvent<ValuationRequestPayload>,
) -> Result<ValuationResponsePayload, Error> {
    let start = std::time::Instant::now();
    let payload = event.payload;

    let loans = match load_loans_from_reader(Cursor::new(payload.loan_tape_csv.as_bytes())) {
        Ok(loans) => loans,
        Err(err) => {
            return Ok(error_response(
                0,
                start.elapsed().as_millis() as u64,
                format!("failed to parse loan tape: {err}"),
            ))
        }
    };
    let loan_count = loans.len();

    let request = ValuationRequest {
        scenarios: payload.scenarios,
        simulation: mortgage_pool_kernel::montecarlo::SimulationConfig {
            num_draws: payload.num_draws,
            include_stochastic: payload.include_stochastic,
            seed: payload.seed,
            ..Default::default()
        },
        purchase_price: payload.purchase_price,
        ..ValuationRequest::default()
    };
    let cancel = AtomicBool::new(false);

    let result = match kernel.run_valuation(&loans, &request, &cancel) {
        Ok(result) => result,
        Err(err) => {
            return Ok(error_response(
                loan_count,
                start.elapsed().as_millis() as u64,
                err.to_string(),
            ))
        }
    };

    Ok(ValuationResponsePayload {
        loan_count,
        total_upb: result.total_upb,
        expected_npv: result.expected_npv,
        npv_p5: result.npv_percentiles.p5,
        npv_p50: result.npv_percentiles.p50,
        npv_p95: result.npv_percentiles.p95,
        package_wal_years: result.package_wal_years,
        numeric_error_count: result.numeric_errors.len(),
        execution_time_ms: start.elapsed().as_millis() as u64,
        error: None,
    })
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::init();

    let config = KernelConfig::from_env();
    let kernel = Arc::new(ValuationKernel::load(config)?);

    lambda_runtime::run(service_fn(move |event| {
        let kernel = kernel.clone();
        handler(kernel, event)
    }))
    .await
}
