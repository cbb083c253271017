//! Mortgage pool valuation kernel CLI
//!
//! Loads a demo loan tape and an artifact root, runs a valuation, and
//! prints a summary (mirroring the shape of the production host adapters
//! in `src/bin/`, but for ad-hoc local use).

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;

use clap::Parser;
use mortgage_pool_kernel::kernel::{KernelConfig, ValuationKernel, ValuationRequest};
use mortgage_pool_kernel::loan::load_loans;

#[derive(Parser, Debug)]
#[command(name = "mortgage_pool_kernel", about = "Mortgage pool acquisition pricing kernel")]
struct Cli {
    /// Path to a loan-tape CSV (LoanID, UPB, NoteRate, OriginalTerm, ...).
    #[arg(long)]
    loan_tape: PathBuf,

    /// Directory containing manifest.json, segmentation/, survival/, apex2/.
    #[arg(long)]
    artifact_root: PathBuf,

    /// Comma-separated scenario names to run.
    #[arg(long, default_value = "base")]
    scenarios: String,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let mut config = KernelConfig::from_env();
    config.artifact_root = cli.artifact_root;

    let kernel = match ValuationKernel::load(config) {
        Ok(kernel) => kernel,
        Err(err) => {
            eprintln!("failed to load model registry: {err}");
            std::process::exit(1);
        }
    };

    let loans = match load_loans(&cli.loan_tape) {
        Ok(loans) => loans,
        Err(err) => {
            eprintln!("failed to load loan tape: {err}");
            std::process::exit(1);
        }
    };
    println!("Mortgage Pool Valuation Kernel");
    println!("==============================\n");
    println!("Loaded {} loans from {:?}", loans.len(), cli.loan_tape);

    let request = ValuationRequest {
        scenarios: cli.scenarios.split(',').map(|s| s.trim().to_string()).collect(),
        ..ValuationRequest::default()
    };
    let cancel = AtomicBool::new(false);

    match kernel.run_valuation(&loans, &request, &cancel) {
        Ok(result) => {
            println!("\nPackage summary:");
            println!("  Total UPB:       ${:.2}", result.total_upb);
            println!("  Expected NPV:    ${:.2}", result.expected_npv);
            println!(
                "  NPV percentiles: p5=${:.0} p25=${:.0} p50=${:.0} p75=${:.0} p95=${:.0}",
                result.npv_percentiles.p5,
                result.npv_percentiles.p25,
                result.npv_percentiles.p50,
                result.npv_percentiles.p75,
                result.npv_percentiles.p95,
            );
            println!("  Package WAL:     {:.2} years", result.package_wal_years);
            if !result.numeric_errors.is_empty() {
                println!("  Numeric errors on {} loan(s)", result.numeric_errors.len());
            }
        }
        Err(err) => {
            eprintln!("valuation failed: {err}");
            std::process::exit(1);
        }
    }
}
