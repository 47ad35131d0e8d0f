//! Patchlight - fleet software-version compliance reporting.
//!
//! # Commands
//!
//! - `patchlight report` - audit installed versions against baselines (or
//!   compute ratio-scaled completion when no baselines are requested) and
//!   write the rows as JSON
//! - `patchlight trend` - merge dated snapshot exports into a trend table
//!
//! All output is plain structured data; rendering it into spreadsheets or
//! charts is someone else's job.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use chrono::Utc;
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use patchlight::baseline::{
    BaselineRequest, apply_global_default, read_requests_file, resolve_requests,
    selections_from_catalog,
};
use patchlight::client::{ApiClient, Credentials};
use patchlight::model::{BaselineSelection, TrackedItem};
use patchlight::picker::{PickerSession, PickerStep};
use patchlight::report::{
    ActiveMode, BaselineReport, OverallReport, run_baseline_report, run_overall_report,
};
use patchlight::tabular;
use patchlight::trend::{
    TrendHistoryBuilder, TrendReport, created_recently, date_from_name, read_snapshot_file,
    select_latest,
};

#[derive(Parser, Debug)]
#[command(
    name = "patchlight",
    version,
    about = "Fleet software-version compliance reporting",
    long_about = "Audits a device fleet's installed software versions against\n\
                  administrator-defined minimum-version baselines and emits plain\n\
                  structured report rows."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a compliance report from the backend
    Report(ReportArgs),

    /// Merge dated snapshot exports into a trend report
    Trend(TrendArgs),
}

#[derive(Args, Debug)]
struct ReportArgs {
    /// Base URL of the backend instance
    #[arg(long)]
    url: String,

    /// API client ID (OAuth client credentials)
    #[arg(long)]
    client_id: Option<String>,

    /// API client secret (OAuth client credentials)
    #[arg(long)]
    client_secret: Option<String>,

    /// API username (when not using client credentials)
    #[arg(long)]
    username: Option<String>,

    /// API password (when not using client credentials)
    #[arg(long)]
    password: Option<String>,

    /// Pre-acquired bearer token; skips token acquisition
    #[arg(long)]
    token: Option<String>,

    /// Path for the JSON report
    #[arg(long)]
    output: PathBuf,

    /// Days threshold for "active" devices; 0 disables filtering
    #[arg(long, default_value_t = 30)]
    days: i64,

    /// Organization name recorded in the report header
    #[arg(long)]
    org: Option<String>,

    /// Titles file: .csv with a 'title' column (optional 'min_version'),
    /// or a plain newline list
    #[arg(long)]
    titles_file: Option<PathBuf>,

    /// Pick titles interactively and set per-title baselines
    #[arg(long)]
    interactive: bool,

    /// Baseline applied wherever no per-title baseline is set
    #[arg(long, default_value = "")]
    global_min_version: String,

    /// How ratio mode counts active devices
    #[arg(long, value_enum, default_value = "ratio")]
    active_mode: ActiveModeArg,

    /// File of title names/ids to highlight in ratio mode
    #[arg(long)]
    top_list: Option<PathBuf>,

    /// Also write the full catalog (id,title) to this file
    #[arg(long)]
    export_titles: Option<PathBuf>,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum ActiveModeArg {
    /// Scale vendor counts by the fleet-wide active ratio
    Ratio,
    /// Filter each detail row by its own last-contact time
    PerRecord,
}

impl From<ActiveModeArg> for ActiveMode {
    fn from(arg: ActiveModeArg) -> Self {
        match arg {
            ActiveModeArg::Ratio => ActiveMode::Ratio,
            ActiveModeArg::PerRecord => ActiveMode::PerRecord,
        }
    }
}

#[derive(Args, Debug)]
struct TrendArgs {
    /// Directory of dated snapshot exports (.csv)
    #[arg(long)]
    input_dir: PathBuf,

    /// Only consider snapshots created within this many days
    #[arg(long, default_value_t = 30)]
    days: i64,

    /// Path for the JSON trend report
    #[arg(long)]
    output: PathBuf,
}

/// The JSON document a report run produces.
#[derive(Serialize)]
struct ReportDocument {
    organization: String,
    report_date: String,
    window_days: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    baseline: Option<BaselineReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    overall: Option<OverallReport>,
}

/// The JSON document a trend run produces.
#[derive(Serialize)]
struct TrendDocument {
    report_date: String,
    #[serde(flatten)]
    report: TrendReport,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("patchlight=info".parse()?))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Report(args) => run_report(args).await,
        Command::Trend(args) => run_trend(args),
    }
}

async fn run_report(args: ReportArgs) -> anyhow::Result<()> {
    // Read and validate the titles file up front: a malformed file must
    // fail before any network activity happens.
    let file_requests = match &args.titles_file {
        Some(path) => Some(read_requests_file(path)?),
        None => None,
    };

    let credentials = credentials_from_args(&args)?;
    let client = ApiClient::connect(&args.url, credentials)
        .await
        .context("connecting to the backend")?;

    let catalog = client.list_titles().await.context("listing patch titles")?;
    info!(titles = catalog.len(), "catalog fetched");

    if let Some(path) = &args.export_titles {
        export_catalog(path, &catalog)?;
        info!(path = %path.display(), "catalog exported");
    }

    // Any baseline flag switches the run into baseline mode.
    let baseline_mode = args.interactive
        || args.titles_file.is_some()
        || !args.global_min_version.trim().is_empty();

    let document = if baseline_mode {
        let mut selections = build_selections(&args, file_requests, &catalog)?;
        apply_global_default(&mut selections, &args.global_min_version);

        let report = run_baseline_report(&client, &selections, args.days, Utc::now()).await?;
        ReportDocument {
            organization: args.org.clone().unwrap_or_default(),
            report_date: report_date(),
            window_days: args.days,
            baseline: Some(report),
            overall: None,
        }
    } else {
        let highlight = match &args.top_list {
            Some(path) => read_name_list(path)?,
            None => Vec::new(),
        };

        let report = run_overall_report(
            &client,
            &catalog,
            args.days,
            args.active_mode.into(),
            &highlight,
            Utc::now(),
        )
        .await?;
        ReportDocument {
            organization: args.org.clone().unwrap_or_default(),
            report_date: report_date(),
            window_days: args.days,
            baseline: None,
            overall: Some(report),
        }
    };

    write_json(&args.output, &document)?;
    info!(path = %args.output.display(), "report written");
    Ok(())
}

fn run_trend(args: TrendArgs) -> anyhow::Result<()> {
    let now = Utc::now();
    let mut dated: Vec<(PathBuf, String)> = Vec::new();

    let entries = std::fs::read_dir(&args.input_dir)
        .with_context(|| format!("reading snapshot directory {}", args.input_dir.display()))?;
    for entry in entries {
        let path = entry?.path();
        let is_csv = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        if !is_csv || !created_recently(&path, args.days, now) {
            continue;
        }
        let date_key = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(date_from_name);
        if let Some(date_key) = date_key {
            dated.push((path, date_key));
        }
    }

    if dated.is_empty() {
        bail!(
            "no dated snapshot files created in the last {} days under {}",
            args.days,
            args.input_dir.display()
        );
    }

    let mut builder = TrendHistoryBuilder::new();
    for (path, date_key) in select_latest(dated) {
        info!(path = %path.display(), date = %date_key, "merging snapshot");
        let points = read_snapshot_file(&path, &date_key)?;
        builder.add_snapshot(points);
    }

    let document = TrendDocument {
        report_date: report_date(),
        report: builder.build(),
    };
    write_json(&args.output, &document)?;
    info!(path = %args.output.display(), "trend report written");
    Ok(())
}

fn credentials_from_args(args: &ReportArgs) -> anyhow::Result<Credentials> {
    if let Some(token) = &args.token {
        return Ok(Credentials::Bearer(token.clone()));
    }
    if let (Some(client_id), Some(client_secret)) = (&args.client_id, &args.client_secret) {
        return Ok(Credentials::OAuth {
            client_id: client_id.clone(),
            client_secret: client_secret.clone(),
        });
    }
    if let (Some(username), Some(password)) = (&args.username, &args.password) {
        return Ok(Credentials::Basic {
            username: username.clone(),
            password: password.clone(),
        });
    }
    bail!("supply --token, --client-id/--client-secret, or --username/--password");
}

/// Build the baseline selections: titles file first, then the interactive
/// picker, then the full catalog with no floors.
fn build_selections(
    args: &ReportArgs,
    file_requests: Option<Vec<BaselineRequest>>,
    catalog: &[TrackedItem],
) -> anyhow::Result<Vec<BaselineSelection>> {
    if let Some(requests) = file_requests {
        let selections = resolve_requests(catalog, &requests);
        if selections.is_empty() {
            bail!("no valid titles resolved from the titles file");
        }
        return Ok(selections);
    }

    if args.interactive {
        let selections = pick_interactively(catalog.to_vec())?;
        if selections.is_empty() {
            bail!("no titles selected in interactive mode");
        }
        return Ok(selections);
    }

    Ok(selections_from_catalog(catalog))
}

/// Drive a picker session over stdin.
fn pick_interactively(catalog: Vec<TrackedItem>) -> anyhow::Result<Vec<BaselineSelection>> {
    let mut session = PickerSession::new(catalog);

    println!("\nInteractive Title Picker");
    println!("------------------------");
    println!("Type search text to filter, or type: all | done | ?");
    println!("Select by numbers/ranges (e.g., 1,2,5-8).");
    render_step(&session.listing())?;

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("reading selection input")?;
        match session.handle(&line) {
            PickerStep::Finished(selections) => return Ok(selections),
            step => render_step(&step)?,
        }
    }
    bail!("selection input ended before the session completed");
}

fn render_step(step: &PickerStep) -> anyhow::Result<()> {
    let mut out = std::io::stdout();
    match step {
        PickerStep::Listing { shown, more } => {
            println!();
            for (number, title) in shown {
                println!("{number:3}. {title}");
            }
            if *more > 0 {
                println!("... ({more} more; refine search)");
            }
            print!("Search / numbers / command: ");
        }
        PickerStep::Help => {
            println!("Enter search text, or 'all', or 'done', or numbers like '1,3-6'.");
            print!("Search / numbers / command: ");
        }
        PickerStep::Added(count) => {
            println!("Added {count} selections.");
            print!("Search / numbers / command: ");
        }
        PickerStep::BaselinePrompt { title } => {
            print!("Baseline for '{title}' (Enter to skip): ");
        }
        PickerStep::Finished(_) => {}
    }
    out.flush().context("flushing prompt")
}

/// Write the catalog as `id,title` delimited text.
fn export_catalog(path: &Path, catalog: &[TrackedItem]) -> anyhow::Result<()> {
    let mut lines = vec![tabular::format_row(&["id", "title"])];
    lines.extend(
        catalog
            .iter()
            .map(|item| tabular::format_row(&[item.id.as_str(), item.title.as_str()])),
    );
    std::fs::write(path, lines.join("\n") + "\n")
        .with_context(|| format!("writing catalog export {}", path.display()))
}

/// Read a newline list of names, skipping blanks.
fn read_name_list(path: &Path) -> anyhow::Result<Vec<String>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading highlight list {}", path.display()))?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

fn write_json<T: Serialize>(path: &Path, document: &T) -> anyhow::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating output directory {}", parent.display()))?;
    }
    let file = std::fs::File::create(path)
        .with_context(|| format!("creating output file {}", path.display()))?;
    serde_json::to_writer_pretty(file, document).context("serializing report")?;
    Ok(())
}

fn report_date() -> String {
    Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
}
