//! netpolicy CLI
//!
//! Operator commands for checkpointed policy statement trees: render them
//! as source, validate them, and run them to completion.

use netpolicy_core::cli;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(e) = cli::run_cli().await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
