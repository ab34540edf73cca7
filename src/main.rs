use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

mod api;
mod db;
mod error;
mod generator;
mod models;
mod report;
mod sanitize;
mod stats;

use crate::generator::GeneratorConfig;
use crate::models::PlaceholderMetrics;

#[derive(Parser)]
#[command(name = "jobboard")]
#[command(about = "Job listing backend with admin management and dashboard statistics", long_about = None)]
struct Cli {
    /// Postgres connection string
    #[arg(long, env = "DATABASE_URL", global = true, hide_env_values = true)]
    database_url: Option<String>,
    #[arg(long, env = "DATABASE_MAX_CONNECTIONS", default_value_t = 5, global = true)]
    max_connections: u32,
    /// Increase log verbosity (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load a handful of realistic postings
    Seed,
    /// Import postings from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Run the HTTP API
    Serve {
        #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8080")]
        bind: SocketAddr,
        /// Seconds between mock postings [default: 60]
        #[arg(long, env = "MOCK_JOB_INTERVAL_SECS")]
        mock_interval_secs: Option<u64>,
        /// Stop generating once this many postings are stored [default: 50]
        #[arg(long, env = "MOCK_JOB_CAP")]
        mock_job_cap: Option<i64>,
        /// Do not generate mock postings in the background
        #[arg(long)]
        no_mock_jobs: bool,
        #[command(flatten)]
        placeholders: PlaceholderArgs,
    },
    /// Print dashboard statistics as JSON
    Stats {
        #[command(flatten)]
        placeholders: PlaceholderArgs,
    },
    /// Write the dashboard as a markdown report
    Report {
        #[arg(long, default_value = "dashboard.md")]
        out: PathBuf,
        #[command(flatten)]
        placeholders: PlaceholderArgs,
    },
}

/// Dashboard figures with no data source yet.
#[derive(Args, Debug, Clone)]
struct PlaceholderArgs {
    #[arg(long, env = "DASHBOARD_TOTAL_VISITORS", default_value_t = 12_345)]
    visitors: i64,
    #[arg(long, env = "DASHBOARD_ACTIVE_APPLICATIONS", default_value_t = 156)]
    applications: i64,
    #[arg(long, env = "DASHBOARD_VISITORS_GROWTH", default_value_t = 12.0)]
    visitors_growth: f64,
    #[arg(long, env = "DASHBOARD_APPLICATIONS_GROWTH", default_value_t = 23.0)]
    applications_growth: f64,
}

impl From<PlaceholderArgs> for PlaceholderMetrics {
    fn from(args: PlaceholderArgs) -> Self {
        PlaceholderMetrics {
            total_visitors: args.visitors,
            active_applications: args.applications,
            visitors_growth_percentage: args.visitors_growth,
            applications_growth_percentage: args.applications_growth,
        }
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose >= 2)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let database_url = cli
        .database_url
        .context("DATABASE_URL must be set to a Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(cli.max_connections)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;
    tracing::debug!("connected to db");

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let inserted = db::seed(&pool).await?;
            println!("Seeded {inserted} postings.");
        }
        Commands::Import { csv } => {
            let inserted = db::import_csv(&pool, &csv).await?;
            println!("Inserted {inserted} postings from {}.", csv.display());
        }
        Commands::Serve {
            bind,
            mock_interval_secs,
            mock_job_cap,
            no_mock_jobs,
            placeholders,
        } => {
            let generator = (!no_mock_jobs)
                .then(|| GeneratorConfig::with_overrides(mock_interval_secs, mock_job_cap));
            let state = api::AppState {
                pool,
                placeholders: placeholders.into(),
            };
            api::serve(state, bind, generator).await?;
        }
        Commands::Stats { placeholders } => {
            let jobs = db::fetch_all_jobs(&pool)
                .await
                .context("failed to load jobs")?;
            let stats = stats::compute_stats(&jobs, Utc::now(), &placeholders.into());
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Commands::Report { out, placeholders } => {
            let jobs = db::fetch_all_jobs(&pool)
                .await
                .context("failed to load jobs")?;
            let now = Utc::now();
            let stats = stats::compute_stats(&jobs, now, &placeholders.into());
            let report = report::build_report(&stats, now);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
