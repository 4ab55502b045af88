//! cardscore CLI
//!
//! Command-line client for the prepaid card management API.
//!
//! # Usage
//!
//! ```bash
//! cardscore login --email admin@fleet.ma --password secret
//! cardscore cards list
//! cardscore cards recharge 12 250.00
//! cardscore ops add 12 --debit 80 --designation "Fuel"
//! cardscore dashboard > summary.csv
//! ```
//!
//! Reports are written to stdout as CSV. Logs go to stderr and are filtered
//! with `RUST_LOG` (default `cardscore=warn`).
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Error (not logged in, rejected credential, invalid input, API failure)

use cardscore::cli;
use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cardscore=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = cli::parse_args();

    let mut output = std::io::stdout();
    if let Err(e) = cli::run(args, &mut output) {
        eprintln!("Error: {}", e);
        if e.is_auth_failure() {
            eprintln!("Run `cardscore login` to sign in.");
        }
        process::exit(1);
    }
}
