//! CLI tool for running automation scripts against an in-memory device.

use anyhow::{Context, Result};
use autoscript::{Engine, RecordingGateway, RunStatus};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "autoscript")]
#[command(author, version, about = "Run a device automation script", long_about = None)]
struct Args {
    /// Script file to run
    input: PathBuf,

    /// Screen width of the simulated device
    #[arg(long, default_value_t = 1080)]
    width: u32,

    /// Screen height of the simulated device
    #[arg(long, default_value_t = 1920)]
    height: u32,

    /// Show debug records
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose {
        "autoscript=debug"
    } else {
        "autoscript=warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let source = std::fs::read_to_string(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;

    let gateway = Arc::new(RecordingGateway::with_size(args.width, args.height));
    let engine = Arc::new(
        Engine::builder()
            .max_coordinate(args.width.max(args.height) as i32)
            .on_log(|line| println!("{}", line))
            .build(gateway.clone()),
    );

    let run = Engine::spawn(&engine, source);

    // Ctrl-C stops the run from another task.
    let stopper = engine.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Stopping...");
            stopper.cancel();
        }
    });

    let report = run.await.context("script task failed")?;
    engine.close().await;

    let actions = gateway.actions();
    if !actions.is_empty() {
        println!("\nRecorded actions:");
        for action in &actions {
            println!("  {:?}", action);
        }
    }

    match report.status {
        RunStatus::Completed => Ok(()),
        RunStatus::Stopped => {
            eprintln!("Run stopped");
            Ok(())
        }
        RunStatus::Crashed(message) => anyhow::bail!("run crashed: {}", message),
    }
}
