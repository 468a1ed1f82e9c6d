//! Call of Cthulhu Keeper's investigator tracker.
//!
//! A line-oriented interface for tracking investigators at the table. Every
//! command prints the resulting signals, and the roster is saved after
//! every change.
//!
//! ```bash
//! cargo run -p keeper -- --save campaign.json
//! ```

mod headless;

use tracing_subscriber::EnvFilter;

/// Environment variable naming an optional log file.
const LOG_PATH_ENV: &str = "KEEPER_LOG_PATH";

fn init_logging() {
    let filter = EnvFilter::builder()
        .with_default_directive(tracing::Level::INFO.into())
        .from_env_lossy();

    // Keep stdout free for the protocol: log to a file if asked, else stderr
    if let Ok(path) = std::env::var(LOG_PATH_ENV) {
        if let Ok(file) = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
        {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(true)
                .with_ansi(false)
                .with_writer(file)
                .init();
            return;
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    dotenvy::dotenv().ok();
    init_logging();

    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return Ok(());
    }

    let config = headless::parse_config_from_args(&args);
    headless::run_headless(config).await.map_err(|e| e.into())
}

fn print_help() {
    println!("Keeper - Call of Cthulhu investigator tracker");
    println!();
    println!("USAGE:");
    println!("  keeper [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("  -h, --help       Show this help message");
    println!("  --save <PATH>    Roster file (default: $KEEPER_SAVE_PATH or investigators.json)");
    println!("  --fresh          Ignore any saved roster and start with default investigators");
    println!();
    println!("ENVIRONMENT:");
    println!("  KEEPER_SAVE_PATH   Roster file");
    println!("  KEEPER_LOG_PATH    Append logs to this file instead of stderr");
    println!("  RUST_LOG           Log filter (default: info)");
    println!();
    println!("Type 'help' once running for the command list.");
}
