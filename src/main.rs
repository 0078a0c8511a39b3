use std::path::PathBuf;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod csv_source;
mod dashboard;
mod db;
mod demo;
mod error;
mod metrics;
mod models;
mod report;
mod store;

use config::Config;
use csv_source::CsvStore;
use dashboard::SnapshotSource;
use db::PgStore;
use metrics::{MetricsConfig, Window};
use store::MetricsStore;

#[derive(Parser)]
#[command(name = "condo-dashboard")]
#[command(about = "Gate traffic and incident metrics for condominium administrators", long_about = None)]
struct Cli {
    /// TOML config file (defaults to ./condo-dashboard.toml when present)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Fixed UTC offset for local days and hours, e.g. -05:00
    #[arg(long, global = true, env = "CONDO_UTC_OFFSET")]
    utc_offset: Option<String>,
    /// Read movements from a CSV export instead of Postgres
    #[arg(long, global = true, value_name = "FILE")]
    movements_csv: Option<PathBuf>,
    /// Incident statuses CSV, used together with --movements-csv
    #[arg(long, global = true, value_name = "FILE", requires = "movements_csv")]
    incidents_csv: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import movement records from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Compute the dashboard metrics for one condominium
    Metrics {
        #[arg(long)]
        company: String,
        /// Anchor instant (RFC 3339); defaults to now
        #[arg(long)]
        at: Option<DateTime<Utc>>,
        /// Print the snapshot as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate a markdown dashboard report
    Report {
        #[arg(long)]
        company: String,
        #[arg(long)]
        at: Option<DateTime<Utc>>,
        #[arg(long, default_value = "dashboard-report.md")]
        out: PathBuf,
    },
    /// Export movement records to CSV
    Export {
        #[arg(long)]
        company: String,
        #[arg(long, default_value_t = 30)]
        since_days: i64,
        #[arg(long, default_value = "movements.csv")]
        out: PathBuf,
    },
}

fn init_logging(level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .try_init()
        .map_err(|err| anyhow::anyhow!("failed to initialise logging: {err}"))
}

async fn connect(config: &Config) -> anyhow::Result<PgStore> {
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections())
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    Ok(PgStore::new(pool))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = config::load(cli.config.as_deref()).context("failed to load configuration")?;
    init_logging(&config.logging.level)?;
    let metrics_config = config.metrics_config(cli.utc_offset.as_deref())?;

    match cli.command {
        Commands::InitDb => {
            let store = connect(&config).await?;
            db::init_db(store.pool()).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let store = connect(&config).await?;
            db::seed(store.pool()).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let store = connect(&config).await?;
            let inserted = db::import_csv(store.pool(), &csv).await?;
            println!("Inserted {inserted} movements from {}.", csv.display());
        }
        command => match cli.movements_csv {
            Some(movements) => {
                let store = CsvStore::open(&movements, cli.incidents_csv.as_deref())?;
                info!(path = %movements.display(), "using CSV movement store");
                run_dashboard(&store, command, &metrics_config).await?;
            }
            None => {
                let store = connect(&config).await?;
                run_dashboard(&store, command, &metrics_config).await?;
            }
        },
    }

    Ok(())
}

async fn run_dashboard<S: MetricsStore>(
    store: &S,
    command: Commands,
    metrics_config: &MetricsConfig,
) -> anyhow::Result<()> {
    match command {
        Commands::Metrics { company, at, json } => {
            let anchor = at.unwrap_or_else(Utc::now);
            let (snapshot, source) =
                dashboard::snapshot_or_demo(store, &company, anchor, metrics_config).await;

            if json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
                return Ok(());
            }

            if source == SnapshotSource::Demo {
                println!("Live data unavailable, showing demo figures.");
            }
            println!("Dashboard for {company}:");
            println!(
                "- entries {} / exits {} (last 30 days)",
                snapshot.total_entries, snapshot.total_exits
            );
            println!(
                "- visitors today {}, week {}, month {}",
                snapshot.total_visitors_today,
                snapshot.total_visitors_week,
                snapshot.total_visitors_month
            );
            println!("- average stay {} min", snapshot.average_stay_minutes);
            for visitor in &snapshot.top_visitors {
                println!("- top visitor {} ({} visits)", visitor.name, visitor.count);
            }
        }
        Commands::Report { company, at, out } => {
            let anchor = at.unwrap_or_else(Utc::now);
            let (snapshot, source) =
                dashboard::snapshot_or_demo(store, &company, anchor, metrics_config).await;
            let report =
                report::build_report(&company, anchor, metrics_config.offset, &snapshot, source);
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Export {
            company,
            since_days,
            out,
        } => {
            let window = Window::trailing_days(Utc::now(), since_days.max(1))
                .context("--since-days out of range")?;
            let records = store.fetch_movements(&company, window).await?;
            let file = std::fs::File::create(&out)
                .with_context(|| format!("failed to create {}", out.display()))?;
            report::write_movements_csv(file, &records, metrics_config.offset)?;
            println!("Exported {} movements to {}.", records.len(), out.display());
        }
        Commands::InitDb | Commands::Seed | Commands::Import { .. } => {
            anyhow::bail!("database maintenance commands need a Postgres connection")
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn export_rejects_oversized_since_days() {
        let store = CsvStore::default();
        let command = Commands::Export {
            company: "condo-1".to_string(),
            since_days: 200_000_000_000_000,
            out: PathBuf::from("never-written.csv"),
        };

        let err = run_dashboard(&store, command, &MetricsConfig::default())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("--since-days out of range"));
        assert!(!PathBuf::from("never-written.csv").exists());
    }
}
