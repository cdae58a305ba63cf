use clap::Parser;
use era5_aggregator::AggregatorError;
use era5_aggregator::cli::{args::Args, commands};
use std::process;

fn main() {
    // Parse command line arguments
    let args = Args::parse();

    // If no subcommand was provided, show help and available commands
    if args.command.is_none() {
        show_help_and_commands();
        process::exit(0);
    }

    // Create async runtime and run the main command logic with signal handling
    let runtime = tokio::runtime::Runtime::new().unwrap_or_else(|e| {
        eprintln!("Failed to create async runtime: {}", e);
        process::exit(1);
    });

    let result = runtime.block_on(async {
        let shutdown_signal = async {
            tokio::signal::ctrl_c()
                .await
                .expect("Failed to install CTRL+C signal handler");
        };

        tokio::select! {
            result = commands::run(args) => {
                result
            }
            _ = shutdown_signal => {
                eprintln!("\nReceived CTRL+C, shutting down...");
                Err(AggregatorError::Interrupted {
                    reason: "Processing interrupted by user".to_string(),
                })
            }
        }
    });

    match result {
        Ok(()) => {
            process::exit(0);
        }
        Err(error) => {
            eprintln!("Error: {}", error);
            process::exit(1);
        }
    }
}

/// Show help information and available commands when no subcommand is provided
fn show_help_and_commands() {
    println!("ERA5 Aggregator - Climate Panel Preparation");
    println!("===========================================");
    println!();
    println!("Prepare analysis-ready climate panels from ERA5 reanalysis data:");
    println!("clean boundary shapefiles, aggregate gridded measurements to");
    println!("administrative units, and download raw measurement files.");
    println!();
    println!("USAGE:");
    println!("    era5-aggregator <COMMAND> [OPTIONS]");
    println!();
    println!("COMMANDS:");
    println!("    clean        Clean an administrative boundary shapefile");
    println!("    aggregate    Aggregate measurement files into a unit-by-day panel");
    println!("    download     Download measurement files from the climate data API");
    println!("    help         Show this help message or help for specific commands");
    println!();
    println!("OPTIONS:");
    println!("    -h, --help       Show help information");
    println!("    -V, --version    Show version information");
    println!();
    println!("EXAMPLES:");
    println!("    # Clean a boundary shapefile:");
    println!("    era5-aggregator clean --input boundaries.shp");
    println!();
    println!("    # Aggregate measurements for one country:");
    println!("    era5-aggregator aggregate --boundary boundaries_cleaned.shp \\");
    println!("                              --input ./measurements --country Tanzania");
    println!();
    println!("    # Download two decades of measurements:");
    println!("    era5-aggregator download --region tanzania --years 1998-2016 \\");
    println!("                             --bbox -12.0,29.0,-1.0,41.0");
    println!();
    println!("For detailed help on any command, use:");
    println!("    era5-aggregator <COMMAND> --help");
}
