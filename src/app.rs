//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and parses CLI arguments
//! - sets up logging
//! - runs the feature pipeline or the sample generator
//! - prints reports/plots and writes outputs

use clap::Parser;
use tracing::info;

use crate::cli::{Cli, Command, PrepareArgs, SampleArgs};
use crate::error::AppError;

pub mod pipeline;

/// Entry point for the `dg` binary.
pub fn run() -> Result<(), AppError> {
    // Values from `.env` feed the `DG_*` env fallbacks of the CLI.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.quiet);

    match cli.command {
        Command::Prepare(args) => handle_prepare(&args),
        Command::Sample(args) => handle_sample(&args),
    }
}

/// Logs go to stderr; `RUST_LOG` takes precedence over `--log-level`.
fn init_logging(level: &str, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    // A second init (e.g. from tests) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn handle_prepare(args: &PrepareArgs) -> Result<(), AppError> {
    let config = args.pipeline_config();
    let inputs = crate::io::load_inputs(&args.input_paths())?;
    let run = pipeline::run(&config, &inputs)?;

    println!(
        "{}",
        crate::report::format_run_summary(&run.stats, run.schema(), &config)
    );
    if args.plot {
        println!(
            "{}",
            crate::plot::render_monthly_plot(&run.monthly_totals, args.width, args.height)
        );
    }

    // Nothing is written unless every stage succeeded, and the four files
    // appear together or not at all.
    let summary = crate::io::RunSummary::new(&config, &run);
    let written = crate::io::write_outputs(&args.out, &run.datasets, &summary)?;
    println!("{}", crate::report::format_written(&written));
    Ok(())
}

fn handle_sample(args: &SampleArgs) -> Result<(), AppError> {
    let config = args.sample_config();
    let inputs = crate::data::generate_sample(&config)?;
    let written = crate::io::write_inputs(&args.out, &inputs)?;
    info!(seed = config.seed, sales = inputs.sales.len(), "generated sample inputs");
    println!("{}", crate::report::format_written(&written));
    Ok(())
}
