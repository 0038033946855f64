//! maple-metrics: fetch Express Entry rounds through the fallback chain and
//! print the series, forecast and dashboard summary as JSON on stdout.
//!
//! Usage:
//!   maple-metrics                       # report (everything)
//!   maple-metrics draws                 # series + feed status
//!   maple-metrics forecast --program CEC
//!   maple-metrics summary
//!
//! Logs go to stderr. `RUST_LOG` overrides the default filter and
//! `MAPLE_LOG_FORMAT=json` switches to structured output.

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use maple_metrics::ingest::config::{load_feed_config_default, FeedConfig};
use maple_metrics::{summarize, DrawQuery, DrawService, ProgramType};

#[derive(Parser, Debug)]
#[command(name = "maple-metrics")]
#[command(about = "Express Entry draw feed with cutoff forecasts, printed as JSON")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Print the draw series and feed status
    Draws,

    /// Print the forecast, optionally for a single program stream
    Forecast {
        /// Program label (General, CEC, PNP, FSW, FST, Category-based)
        #[arg(short, long, value_parser = parse_program)]
        program: Option<ProgramType>,
    },

    /// Print dashboard statistics
    Summary,

    /// Print status, summary, forecast and records (default)
    Report,
}

fn parse_program(label: &str) -> Result<ProgramType, String> {
    ProgramType::from_label(label).ok_or_else(|| format!("unknown program type `{label}`"))
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("maple_metrics=info,warn"));
    let json = std::env::var("MAPLE_LOG_FORMAT")
        .ok()
        .is_some_and(|v| v.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let command = cli.command.unwrap_or(Command::Report);

    let cfg = load_feed_config_default().unwrap_or_else(|e| {
        tracing::warn!(error = ?e, "feed config unusable, using defaults");
        FeedConfig::default()
    });
    let service = DrawService::from_config(&cfg)?;
    let feed = service.get_draws().await;
    let today = chrono::Utc::now().date_naive();

    let out = match command {
        Command::Draws => json!({ "status": feed.status, "records": feed.records }),
        Command::Forecast { program } => {
            let query = DrawQuery {
                search: None,
                program,
            };
            json!({
                "status": feed.status,
                "program": program,
                "forecast": service.get_forecast_for(&feed.records, &query),
            })
        }
        Command::Summary => json!({
            "status": feed.status,
            "summary": summarize(&feed.records, today),
        }),
        Command::Report => json!({
            "status": feed.status,
            "summary": summarize(&feed.records, today),
            "forecast": service.get_forecast(&feed.records),
            "records": feed.records,
        }),
    };
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
