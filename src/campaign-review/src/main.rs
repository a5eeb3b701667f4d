//! Campaign Review: reconciles ad spend against affiliate commission and
//! grades every campaign key.
//!
//! Reads JSON row exports, runs one analysis, and writes JSON reports.

use anyhow::Context;
use campaign_core::config::AppConfig;
use campaign_core::types::{AdSpendRecord, CampaignReport, CommissionOrder};
use campaign_reporting::{diff_reports, Analysis, PortfolioSummary, ReconciliationEngine};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "campaign-review")]
#[command(about = "Reconcile ad spend with affiliate commission and grade campaigns")]
#[command(version)]
struct Cli {
    /// TOML configuration file (environment overrides still apply)
    #[arg(long, global = true, env = "CAMPAIGN_REVIEW_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify every campaign over the window ending the day before AS_OF
    Analyze {
        #[arg(long)]
        as_of: NaiveDate,

        /// JSON array of ad-spend rows
        #[arg(long)]
        ads: PathBuf,

        /// JSON array of commission orders
        #[arg(long)]
        commissions: PathBuf,

        /// Include a portfolio rollup
        #[arg(long, default_value_t = false)]
        summary: bool,

        /// Write to a file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// List grade, stage and tier moves between two saved runs
    Diff {
        #[arg(long)]
        previous: PathBuf,

        #[arg(long)]
        current: PathBuf,
    },
    /// Load and validate configuration, then print it
    CheckConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct AnalyzeOutput {
    #[serde(flatten)]
    analysis: Analysis,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    summary: Option<PortfolioSummary>,
}

/// `diff` accepts either a saved `analyze` output or a bare report array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SavedRun {
    Full(AnalyzeOutput),
    Reports(Vec<CampaignReport>),
}

impl SavedRun {
    fn into_reports(self) -> Vec<CampaignReport> {
        match self {
            SavedRun::Full(out) => out.analysis.reports,
            SavedRun::Reports(reports) => reports,
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "campaign_review=info,campaign_reporting=info".into()),
        )
        .json()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Analyze {
            as_of,
            ads,
            commissions,
            summary,
            output,
        } => {
            let config = load_config(cli.config.as_deref())?;
            let ad_rows: Vec<AdSpendRecord> = read_json(&ads)?;
            let commission_rows: Vec<CommissionOrder> = read_json(&commissions)?;
            info!(
                as_of = %as_of,
                ad_rows = ad_rows.len(),
                commission_rows = commission_rows.len(),
                "Campaign Review starting analysis"
            );

            let engine = ReconciliationEngine::new(config);
            let analysis = engine.analyze_detailed(as_of, &ad_rows, &commission_rows);
            let summary = summary.then(|| PortfolioSummary::from_reports(&analysis.reports));
            write_json(output.as_deref(), &AnalyzeOutput { analysis, summary })?;
        }
        Command::Diff { previous, current } => {
            let before = read_json::<SavedRun>(&previous)?.into_reports();
            let after = read_json::<SavedRun>(&current)?.into_reports();
            let changes = diff_reports(&before, &after);
            info!(
                previous = before.len(),
                current = after.len(),
                changes = changes.len(),
                "Runs compared"
            );
            write_json(None, &changes)?;
        }
        Command::CheckConfig => {
            let config = load_config(cli.config.as_deref()).inspect_err(|e| {
                error!(error = %format!("{:#}", e), "Configuration is invalid");
            })?;
            info!(
                window_days = config.window.window_days,
                rate_table = %config.currency.version,
                "Configuration is valid"
            );
            write_json(None, &config)?;
        }
    }

    Ok(())
}

/// Without a file, defaults plus `CAMPAIGN_REVIEW__*` overrides. Invalid
/// values are an error, never a silent fall back to defaults.
fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::load_from(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => AppConfig::load().context("loading config from environment")?,
    };
    Ok(config)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("parsing {}", path.display()))
}

fn write_json<T: Serialize>(path: Option<&Path>, value: &T) -> anyhow::Result<()> {
    let mut out: Box<dyn Write> = match path {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("creating {}", path.display()))?,
        )),
        None => Box::new(std::io::stdout().lock()),
    };
    serde_json::to_writer_pretty(&mut out, value)?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}
