//! Bitrix24 Timesheet Reports
//!
//! Pulls time entries stored on a Bitrix24 smart process, groups them by
//! employee or project, and writes them out as JSON, CSV, a console summary
//! or a formatted XLSX workbook.

mod aggregate;
mod bitrix;
mod config;
mod constants;
mod dictionary;
mod error;
mod normalize;
mod record;
mod reports;
mod spreadsheet;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use bitrix::BitrixClient;
use config::{Config, FileConfig};
use normalize::TracingSink;
use reports::{ReportFilter, ReportKind};

#[derive(Parser, Debug)]
#[command(name = "timesheet-reports")]
#[command(about = "Time tracking reports for a Bitrix24 portal")]
struct Args {
    /// Path to the config file (optional)
    #[arg(short, long, default_value = constants::CONFIG_FILENAME, global = true)]
    config: PathBuf,

    /// Output directory for generated spreadsheets
    #[arg(short, long, default_value = "./output", global = true)]
    output_dir: PathBuf,

    /// Portal domain, e.g. example.bitrix24.ru
    #[arg(long, env = "BITRIX_DOMAIN", global = true)]
    domain: Option<String>,

    /// OAuth access token
    #[arg(long, env = "BITRIX_ACCESS_TOKEN", hide_env_values = true, global = true)]
    access_token: Option<String>,

    /// Verbose output (debug logs on stderr)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

/// Filters shared by every report command
#[derive(clap::Args, Debug, Clone, Default)]
struct FilterArgs {
    /// Earliest reflection date (YYYY-MM-DD)
    #[arg(long)]
    date_from: Option<String>,

    /// Latest reflection date (YYYY-MM-DD)
    #[arg(long)]
    date_to: Option<String>,

    /// Responsible user ID
    #[arg(long)]
    employee_id: Option<String>,

    /// Project ID
    #[arg(long)]
    project_id: Option<String>,

    /// Exact project name
    #[arg(long)]
    project_name: Option<String>,
}

impl From<FilterArgs> for ReportFilter {
    fn from(args: FilterArgs) -> Self {
        Self {
            date_from: args.date_from,
            date_to: args.date_to,
            employee_id: args.employee_id,
            project_id: args.project_id,
            project_name: args.project_name,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print normalized time entries as JSON
    Data {
        #[command(flatten)]
        filter: FilterArgs,

        /// Write JSON to a file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,

        /// Also write a flat CSV ledger
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Generate an XLSX report in the output directory
    Export {
        /// Report layout
        #[arg(long, value_enum)]
        report: ReportKind,

        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Print top-level totals as a table, or the full report tree as JSON
    Summary {
        /// Report layout
        #[arg(long, value_enum)]
        report: ReportKind,

        /// Print the nested report as JSON instead of a table
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        filter: FilterArgs,
    },

    /// List active portal users
    Users,

    /// List smart process types defined on the portal
    Types,
}

/// Install the stderr log subscriber. `RUST_LOG` wins over `--verbose`.
fn init_tracing(verbose: bool) {
    let default_directive = if verbose {
        "warn,timesheet_reports=debug"
    } else {
        "warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let file_config = FileConfig::load_or_default(&args.config)?;
    let config = Config::from_file(file_config, args.domain, args.access_token).context(
        "Pass --domain and --access-token, set BITRIX_DOMAIN and BITRIX_ACCESS_TOKEN, \
         or fill in [portal] in config.toml (see config.toml.example)",
    )?;

    let client = BitrixClient::new(&config.credentials, Duration::from_secs(config.timeout_secs))
        .context("Failed to create HTTP client")?;

    handle_command(args.command, &args.output_dir, &client, &config).await
}

async fn handle_command(
    command: Command,
    output_dir: &Path,
    client: &BitrixClient,
    config: &Config,
) -> Result<()> {
    match command {
        Command::Data {
            filter,
            output,
            csv,
        } => handle_data(client, config, filter.into(), output, csv).await,
        Command::Export { report, filter } => {
            handle_export(client, config, filter.into(), report, output_dir).await
        }
        Command::Summary {
            report,
            json,
            filter,
        } => handle_summary(client, config, filter.into(), report, json).await,
        Command::Users => {
            let users = dictionary::fetch_active_users(client)
                .await
                .context("Failed to fetch users")?;
            print_json(&users)
        }
        Command::Types => {
            let types = dictionary::fetch_smart_process_types(client)
                .await
                .context("Failed to fetch schema")?;
            print_json(&types)
        }
    }
}

/// Fetch entries and emit them as JSON (and optionally CSV)
async fn handle_data(
    client: &BitrixClient,
    config: &Config,
    filter: ReportFilter,
    output: Option<PathBuf>,
    csv: Option<PathBuf>,
) -> Result<()> {
    let data = reports::fetch_report_data(client, config, &filter, &mut TracingSink)
        .await
        .context("Failed to fetch report data")?;

    if let Some(path) = csv {
        reports::write_csv_file(&path, &data.items)
            .with_context(|| format!("Failed to write CSV: {}", path.display()))?;
        eprintln!("  Generated: {}", path.display());
    }

    match output {
        Some(path) => {
            let json = serde_json::to_string_pretty(&data)?;
            std::fs::write(&path, json)
                .with_context(|| format!("Failed to write JSON: {}", path.display()))?;
            eprintln!("  Generated: {}", path.display());
            Ok(())
        }
        None => print_json(&data),
    }
}

/// Render the XLSX report into the output directory
async fn handle_export(
    client: &BitrixClient,
    config: &Config,
    filter: ReportFilter,
    kind: ReportKind,
    output_dir: &Path,
) -> Result<()> {
    println!("Generating {:?} report...\n", kind);

    let exported = reports::export_report(client, config, &filter, kind, &mut TracingSink)
        .await
        .context("Failed to generate report")?;

    std::fs::create_dir_all(output_dir)?;
    let path = output_dir.join(exported.filename);
    std::fs::write(&path, &exported.bytes)
        .with_context(|| format!("Failed to write report: {}", path.display()))?;

    println!("  Generated: {}", path.display());
    Ok(())
}

/// Print per-group totals to the console, or the whole tree as JSON
async fn handle_summary(
    client: &BitrixClient,
    config: &Config,
    filter: ReportFilter,
    kind: ReportKind,
    json: bool,
) -> Result<()> {
    let report = reports::build_report(client, config, &filter, kind, &mut TracingSink)
        .await
        .context("Failed to build report")?;

    if json {
        return print_json(&report);
    }

    println!("\n============================================================");
    println!("  {}", spreadsheet::sheet_name(report.group_by));
    println!("============================================================\n");
    println!("{}", reports::summary_table(&report));
    println!("\n  Entries: {}", report.entry_count());

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
