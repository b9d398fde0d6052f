use anyhow::{Context, Result};
use clap::Parser;
use henchman::cli::{run_exec, Commands, HenchmanCli};
use henchman::config::Configuration;
use henchman::logging;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = HenchmanCli::parse();
    let Commands::Exec(args) = cli.command;

    let config = Configuration::load(&args.configuration)
        .with_context(|| format!("loading {}", args.configuration.display()))?;
    if let Err(e) = logging::init(&config.log, args.debug) {
        eprintln!("⚠️  Could not open log file {}: {e}", config.log.display());
    }

    info!("Starting henchman v{}", env!("CARGO_PKG_VERSION"));

    match run_exec(&args).await {
        Ok(errors) if errors.is_empty() => {
            println!();
            println!("✅ Plan completed");
            Ok(())
        }
        Ok(errors) => {
            println!();
            println!("❌ Plan failed on {} machine(s)", errors.len());
            for err in &errors {
                eprintln!("  • {err}");
            }
            std::process::exit(1)
        }
        Err(err) => logging::fatal(&err),
    }
}
