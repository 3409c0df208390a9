//! Prints where payments to the configured wallet can be inspected.
//!
//! Reads `WALLET_ADDRESS` and `NETWORK` from the environment (`.env` included) or flags.
//! Exits with status 1 when no wallet address is configured.

use clap::Parser;
use dotenvy::dotenv;
use std::process::ExitCode;

use video_paygate::config::DEFAULT_PORT;
use video_paygate::explorer::{explorer_url, resolve_network, transaction_url};

const RULE_WIDTH: usize = 60;

#[derive(Parser, Debug)]
#[command(name = "check-payments")]
#[command(about = "Show the payment wallet and its block explorer links")]
struct Args {
    /// Wallet address receiving payments
    #[arg(long, env = "WALLET_ADDRESS")]
    wallet_address: Option<String>,
    /// Network name; unknown names use base-sepolia links
    #[arg(long, env = "NETWORK", default_value = "base-sepolia")]
    network: String,
    /// Transaction hash to link to
    #[arg(long)]
    tx: Option<String>,
    /// Port of a running server, for the payment-info tip
    #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    port: u16,
}

fn report(address: &str, args: &Args) -> Vec<String> {
    let rule = "=".repeat(RULE_WIDTH);
    let mut lines = vec![
        rule.clone(),
        "PAYMENT RECIPIENT WALLET".to_string(),
        rule.clone(),
        format!("Wallet address: {address}"),
        format!("Network: {}", args.network),
        format!("Chain ID: {}", resolve_network(&args.network).chain_id()),
        format!("Explorer URL: {}", explorer_url(address, &args.network)),
    ];
    if let Some(tx) = &args.tx {
        lines.push(format!(
            "Transaction URL: {}",
            transaction_url(tx, &args.network)
        ));
    }
    lines.push(rule);
    lines.extend([
        String::new(),
        "How to check payments:".to_string(),
        "1. Open the explorer URL above in a browser".to_string(),
        "2. It lists every transaction to this address and the current USDC balance".to_string(),
        "3. Click a transaction hash to see sender, amount, gas fee and timestamp".to_string(),
        String::new(),
        format!(
            "Tip: while the server runs, the same details are at http://localhost:{}/payment-info",
            args.port
        ),
    ]);
    lines
}

fn main() -> ExitCode {
    dotenv().ok();
    let args = Args::parse();

    let address = args
        .wallet_address
        .as_deref()
        .map(str::trim)
        .filter(|address| !address.is_empty());
    let Some(address) = address else {
        eprintln!("ERROR: WALLET_ADDRESS is not configured");
        eprintln!();
        eprintln!("Create a .env file containing:");
        eprintln!("WALLET_ADDRESS=your_ethereum_wallet_address");
        return ExitCode::FAILURE;
    };

    for line in report(address, &args) {
        println!("{line}");
    }
    ExitCode::SUCCESS
}
