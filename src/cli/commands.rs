//! Command implementations for the aggregator CLI
//!
//! This module contains the command dispatch, logging setup, and
//! download job construction for the CLI interface.

use colored::Colorize;
use tracing::{debug, info};

use crate::aggregate::AggregationPipeline;
use crate::boundary::BoundaryCleaner;
use crate::cli::args::{AggregateArgs, Args, CleanArgs, Commands, DownloadArgs};
use crate::config::AggregatorConfig;
use crate::download::{DownloadJob, partition_variables, run_downloads};
use crate::error::Result;
use crate::models::ClimateVariable;

/// Main command runner
///
/// Sets up logging from the subcommand's verbosity flags, validates its
/// arguments, and dispatches to the matching pipeline.
pub async fn run(args: Args) -> Result<()> {
    match args.get_command() {
        Commands::Clean(clean_args) => run_clean(clean_args).await,
        Commands::Aggregate(aggregate_args) => run_aggregate(aggregate_args).await,
        Commands::Download(download_args) => run_download(download_args).await,
    }
}

async fn run_clean(args: CleanArgs) -> Result<()> {
    setup_logging(args.get_log_level(), args.quiet)?;
    args.validate()?;

    let config = AggregatorConfig::default().with_sliver_threshold(args.sliver_threshold);

    let mut cleaner = BoundaryCleaner::new(args.input_path.clone(), args.resolved_output_path())?
        .with_config(config);
    if let Some(report_dir) = &args.report_dir {
        cleaner = cleaner.with_report_dir(report_dir.clone());
    }

    let report = cleaner.clean()?;
    info!(
        "Cleaning retained {} of {} units",
        report.final_count, report.input_count
    );
    Ok(())
}

async fn run_aggregate(args: AggregateArgs) -> Result<()> {
    setup_logging(args.get_log_level(), args.quiet)?;
    args.validate()?;

    let mut config = AggregatorConfig::default()
        .with_chunk_size(args.chunk_size)
        .with_interpolation_method(args.interpolation.into());
    if args.exact {
        config = config.with_exact_matching();
    }

    let pipeline = AggregationPipeline::new(
        args.boundary_path.clone(),
        args.input_dir.clone(),
        args.output_path.clone(),
        args.country.clone(),
    )?
    .with_config(config);

    let stats = pipeline.run().await?;
    info!(
        "Aggregation finished: {} rows for {} units",
        stats.total_rows, stats.units
    );
    Ok(())
}

async fn run_download(args: DownloadArgs) -> Result<()> {
    setup_logging(args.get_log_level(), args.quiet)?;
    args.validate()?;

    let config = AggregatorConfig::default().with_download_workers(args.workers);
    config.validate()?;

    let (first_year, last_year) = args.parse_years()?;
    let bbox = args.parse_bbox()?;
    let (temperature_vars, precipitation_vars) = partition_variables(&args.variable_list());

    // One job per variable family per year, so output files carry the
    // suffix the aggregate command discovers them by
    let mut jobs: Vec<DownloadJob> = Vec::new();
    for year in first_year..=last_year {
        for (variable, variables) in [
            (ClimateVariable::Temperature, &temperature_vars),
            (ClimateVariable::Precipitation, &precipitation_vars),
        ] {
            if variables.is_empty() {
                continue;
            }
            jobs.push(DownloadJob {
                region: args.region.clone(),
                dataset: args.dataset.clone(),
                variable,
                variables: variables.clone(),
                year,
                bbox,
                attempts: 0,
            });
        }
    }

    println!(
        "{}",
        "Starting measurement download".bright_green().bold()
    );
    println!("  {} {}", "Region:".bright_cyan(), args.region);
    println!(
        "  {} {} - {}",
        "Years:".bright_cyan(),
        first_year,
        last_year
    );
    println!(
        "  {} {}",
        "Output:".bright_cyan(),
        args.output_dir.display()
    );

    let downloaded = run_downloads(
        &args.api_url,
        jobs,
        &args.output_dir,
        config.download_workers,
    )
    .await?;
    println!(
        "\n{} {} files downloaded",
        "Done:".bright_green().bold(),
        downloaded
    );
    Ok(())
}

/// Set up structured logging based on CLI arguments
fn setup_logging(log_level: &str, quiet: bool) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("era5_aggregator={}", log_level)));

    if quiet {
        // Minimal logging for quiet mode
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .init();
    } else {
        // Standard logging with timestamps
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_timer(fmt::time::uptime())
                    .with_writer(std::io::stderr),
            )
            .init();
    }

    debug!("Logging initialized at level: {}", log_level);
    Ok(())
}
