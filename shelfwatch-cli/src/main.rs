use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

mod compliance;
mod mockdata;
mod models;
mod reports;
mod settings;
mod system;

use settings::Settings;
use system::ComplianceSystem;

#[derive(Parser, Debug)]
#[command(name = "shelfwatch", version)]
#[command(about = "Shelfwatch - autonomous retail compliance agents")]
struct Cli {
    /// Path to a TOML config file (default: ./shelfwatch.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a single compliance check
    Check {
        /// Specific store id to check
        #[arg(long)]
        store_id: Option<String>,
        /// Date for the check (YYYY-MM-DD, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Write the result JSON to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Run continuous compliance monitoring
    Monitor,
    /// Generate mock contracts, planograms and store images
    MockData {
        #[arg(long, default_value_t = 5)]
        contracts: usize,
        #[arg(long, default_value_t = 10)]
        planograms: usize,
        #[arg(long, default_value_t = 20)]
        images: usize,
    },
    /// Show configuration and component status
    Status,
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::from_default_env();
    let env_filter = match "info".parse() {
        Ok(directive) => env_filter.add_directive(directive),
        Err(_) => env_filter,
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .json()
        .try_init();
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::load(cli.config.as_deref());

    match cli.command {
        Commands::Check {
            store_id,
            date,
            output,
        } => {
            let date = date
                .map(|raw| NaiveDate::parse_from_str(&raw, "%Y-%m-%d"))
                .transpose()?;

            let mut system = ComplianceSystem::new(settings);
            system.start().await?;
            let result = system.run_check(store_id.as_deref(), date).await;
            system.shutdown().await;

            let result = result?;
            let rendered = serde_json::to_string_pretty(&result)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, rendered)?;
                    println!("Results saved to {}", path.display());
                }
                None => println!("{rendered}"),
            }
        }
        Commands::Monitor => {
            let mut system = ComplianceSystem::new(settings);
            system.start().await?;
            println!("Starting continuous monitoring... (press ctrl-c to stop)");
            tokio::select! {
                _ = system.run_monitoring() => {}
                _ = tokio::signal::ctrl_c() => {
                    println!("Stopping continuous monitoring...");
                }
            }
            system.shutdown().await;
        }
        Commands::MockData {
            contracts,
            planograms,
            images,
        } => {
            let system = ComplianceSystem::new(settings);
            system.generate_mock_data(contracts, planograms, images)?;
            println!("Generated {contracts} contracts, {planograms} planograms, {images} images");
        }
        Commands::Status => {
            println!("=== Shelfwatch Status ===");
            println!("Environment:          {}", settings.environment);
            println!("Run mode:             {}", settings.run_mode);
            println!("Data directory:       {}", settings.data_dir.display());
            println!("Monitoring interval:  {}s", settings.monitoring_interval_secs);
            println!("Compliance threshold: {}%", settings.compliance_threshold);
            println!("Memory retention:     {} days", settings.memory_retention_days);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "Command failed");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
