mod aggregate;
mod api;
mod cli;
mod export;
mod helpers;
mod model;
mod orchestrator;
mod session;
mod text_summary;
mod validation;

use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Logs go to stderr so stdout stays parseable. `RUST_LOG` wins over `-v`.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("kdv_checks={level}")));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[tokio::main]
async fn main() {
    let args = cli::Cli::parse();
    let is_json = args.json;
    init_logging(args.verbose);

    if let Err(e) = cli::run(args).await {
        if is_json {
            let line = serde_json::json!({ "error": format!("{e:#}") });
            println!("{line}");
        } else {
            eprintln!("Error: {e:#}");
        }
        std::process::exit(1);
    }
}
