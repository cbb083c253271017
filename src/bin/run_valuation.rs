//! End-to-end CLI: load a loan tape and artifact root, run a valuation,
//! write the per-loan results to CSV, print a package summary (mirrors the
//! "load inforce, run engine, write CSV, print summary" shape of the main
//! binary, but against the kernel's full bid-ladder output as well).

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;

use clap::Parser;
use mortgage_pool_kernel::kernel::{KernelConfig, ValuationKernel, ValuationRequest};
use mortgage_pool_kernel::loan::load_loans;
use mortgage_pool_kernel::result::BidConfig;

#[derive(Parser, Debug)]
#[command(name = "run_valuation", about = "Runs a full package valuation and bid-ladder analysis")]
struct Cli {
    #[arg(long)]
    loan_tape: PathBuf,

    #[arg(long)]
    artifact_root: PathBuf,

    #[arg(long, default_value = "base")]
    scenarios: String,

    #[arg(long)]
    purchase_price: Option<f64>,

    #[arg(long, default_value = "loan_valuations.csv")]
    out_csv: PathBuf,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let mut config = KernelConfig::from_env();
    config.artifact_root = cli.artifact_root;

    let kernel = ValuationKernel::load(config).unwrap_or_else(|err| {
        eprintln!("failed to load model registry: {err}");
        std::process::exit(1);
    });

    let loans = load_loans(&cli.loan_tape).unwrap_or_else(|err| {
        eprintln!("failed to load loan tape: {err}");
        std::process::exit(1);
    });

    let request = ValuationRequest {
        scenarios: cli.scenarios.split(',').map(|s| s.trim().to_string()).collect(),
        purchase_price: cli.purchase_price,
        ..ValuationRequest::default()
    };
    let cancel = AtomicBool::new(false);

    let result = kernel.run_valuation(&loans, &request, &cancel).unwrap_or_else(|err| {
        eprintln!("valuation failed: {err}");
        std::process::exit(1);
    });

    println!("Package Valuation");
    println!("==================\n");
    println!("Loans:           {}", result.loan_results.len());
    println!("Total UPB:       ${:.2}", result.total_upb);
    println!("Expected NPV:    ${:.2}", result.expected_npv);
    println!("Package WAL:     {:.2} years", result.package_wal_years);
    println!(
        "NPV percentiles: p5=${:.0} p25=${:.0} p50=${:.0} p75=${:.0} p95=${:.0}",
        result.npv_percentiles.p5,
        result.npv_percentiles.p25,
        result.npv_percentiles.p50,
        result.npv_percentiles.p75,
        result.npv_percentiles.p95,
    );

    let bid_config = BidConfig::default_for_upb(result.total_upb);
    match kernel.run_bid_analysis(&result.npv_distribution, &loans, &bid_config) {
        Ok(ladder) => {
            println!("\nBid ladder (center ${:.0}, step ${:.0}):", bid_config.center_price, bid_config.increment);
            println!("{:>12} {:>10} {:>10}", "Price", "ROE", "p(ROE>=0)");
            for row in &ladder.rows {
                println!(
                    "{:>12.0} {:>9.2}% {:>9.1}%",
                    row.purchase_price,
                    row.expected_roe * 100.0,
                    row.probability_roe_above_target * 100.0
                );
            }
        }
        Err(err) => eprintln!("bid ladder failed: {err}"),
    }

    let mut file = File::create(&cli.out_csv).expect("unable to create output CSV");
    writeln!(file, "LoanID,LeafID,ExpectedPV,WALYears,PV_p5,PV_p50,PV_p95").unwrap();
    for loan in &result.loan_results {
        writeln!(
            file,
            "{},{},{:.2},{:.2},{:.2},{:.2},{:.2}",
            loan.loan_id,
            loan.leaf_id,
            loan.expected_pv,
            loan.wal_years,
            loan.pv_percentiles.p5,
            loan.pv_percentiles.p50,
            loan.pv_percentiles.p95,
        )
        .unwrap();
    }
    println!("\nPer-loan results written to {:?}", cli.out_csv);
}
