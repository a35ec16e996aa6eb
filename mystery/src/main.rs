//! Terminal front-end for the detective game.
//!
//! Plays a case over stdin/stdout. Every reply comes from the inference
//! endpoint named by `MYSTERY_API_URL`.
//!
//! ```bash
//! cargo run -p mystery -- --data mystery/data/sample.json --save progress.json
//! ```

mod headless;

use mystery_core::{HeadlessConfig, API_URL_ENV};
use tracing_subscriber::EnvFilter;

const DEFAULT_DATA: &str = "mystery/data/sample.json";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    dotenvy::dotenv().ok();
    init_tracing();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return Ok(());
    }

    if std::env::var(API_URL_ENV).is_err() {
        eprintln!("Error: {API_URL_ENV} environment variable not set.");
        eprintln!("Please set it in .env file or with: export {API_URL_ENV}=http://host:port");
        std::process::exit(1);
    }

    let config = parse_config_from_args(&args);
    if let Err(e) = headless::run(config).await {
        tracing::error!(error = %e, "game stopped");
        std::process::exit(1);
    }
    Ok(())
}

/// Logs go to stderr so they never mix with the transcript.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn parse_config_from_args(args: &[String]) -> HeadlessConfig {
    let data = option_value(args, "--data")
        .or_else(|| std::env::var("MYSTERY_DATA").ok())
        .unwrap_or_else(|| DEFAULT_DATA.to_string());
    let mut config = HeadlessConfig::new(data);

    if let Some(save) = option_value(args, "--save") {
        config.session = config.session.with_save_path(save);
    }
    if args.iter().any(|a| a == "--fresh") {
        config = config.fresh();
    }
    config
}

fn option_value(args: &[String], name: &str) -> Option<String> {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn print_help() {
    println!("mystery - question suspects, collect evidence, name the culprit");
    println!();
    println!("USAGE:");
    println!("    mystery [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    --data <path>    Game data file (default: {DEFAULT_DATA})");
    println!("    --save <path>    Save file (default: $MYSTERY_SAVE_PATH, or none)");
    println!("    --fresh          Ignore any existing save");
    println!("    -h, --help       Show this help");
    println!();
    println!("ENVIRONMENT:");
    println!("    MYSTERY_API_URL       Inference endpoint (required)");
    println!("    MYSTERY_TIMEOUT_SECS  Reply timeout in seconds (default: 120)");
    println!("    RUST_LOG              Log filter (default: info)");
}
