use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use tushare_reports::analysis;
use tushare_reports::api::{ReportQuery, TushareClient};
use tushare_reports::models::{Config, ReportPeriod};
use tushare_reports::resolver::fetch_latest_report;

#[derive(Parser)]
#[command(name = "tushare-reports", about = "Resolve latest financial disclosures from Tushare")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a report table and print the latest disclosure of a period
    Latest {
        /// Tushare endpoint name (e.g. income, balancesheet, cashflow)
        api_name: String,
        /// Target reporting period, YYYYMMDD
        #[arg(long)]
        period: String,
        /// Column holding the reporting period in this endpoint's output
        #[arg(long, default_value = "end_date")]
        period_field: String,
        /// Extra query parameters as key=value (repeatable)
        #[arg(long = "param", value_parser = parse_key_val)]
        params: Vec<(String, String)>,
        /// Comma-separated output columns (endpoint default when omitted)
        #[arg(long)]
        fields: Option<String>,
        /// Print every row of the latest disclosure instead of one
        #[arg(long)]
        all: bool,
    },
    /// Year-over-year net profit comparison for one stock and period
    Yoy {
        /// Stock code (e.g. 600348.SH)
        ts_code: String,
        /// Reporting period, YYYYMMDD
        period: String,
    },
    /// Verify the configured Tushare token
    CheckToken,
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((k, v)) if !k.is_empty() => Ok((k.to_string(), v.to_string())),
        _ => Err(format!("invalid key=value parameter: '{}'", s)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("tushare_reports=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            eprintln!("Configuration error: {}", e);
            eprintln!("Set TUSHARE_TOKEN in the environment or a .env file.");
            std::process::exit(1);
        }
    };

    let client = TushareClient::new(&config)?;

    match cli.command {
        Commands::Latest {
            api_name,
            period,
            period_field,
            params,
            fields,
            all,
        } => {
            let period = ReportPeriod::parse(&period)?;
            let mut query = ReportQuery::new(api_name);
            for (key, value) in params {
                query = query.param(key, value);
            }
            if let Some(fields) = fields {
                query = query.fields(fields.split(',').map(str::trim));
            }

            let result =
                fetch_latest_report(&client, &query, &period_field, period.as_str(), all).await?;

            match result {
                Some(records) => {
                    println!("{}", serde_json::to_string_pretty(&records.to_json_rows())?)
                }
                None => println!("No data found for period {}", period),
            }
        }
        Commands::Yoy { ts_code, period } => {
            let period = ReportPeriod::parse(&period)?;
            let yoy = analysis::net_profit_yoy(&client, &ts_code, &period).await?;
            println!("{}", serde_json::to_string_pretty(&yoy)?);
        }
        Commands::CheckToken => {
            client.check_token().await?;
            println!("Token OK");
        }
    }

    Ok(())
}
