use crate::config::Config;
use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info};
use verso_ot::{AuthorId, Change, LinearDocument};
use verso_server::{DocumentHub, HubConfig, ServerError};

#[derive(Debug, Args)]
pub struct ReplayArgs {
    /// JSON file of recorded submissions
    pub file: PathBuf,

    /// Write the resulting histories here
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Print each document's final text
    #[arg(long)]
    pub render: bool,
}

#[derive(Debug, Deserialize)]
struct ReplayLog {
    submissions: Vec<RecordedSubmission>,
}

/// One client submission, in the order the server received it
#[derive(Debug, Clone, Deserialize)]
pub struct RecordedSubmission {
    pub doc: String,
    pub author: AuthorId,
    #[serde(default)]
    pub backtrack: usize,
    pub change: Change,
}

#[derive(Debug, PartialEq)]
pub enum Outcome {
    /// `accepted` of `submitted` transactions landed at `start`
    Accepted {
        start: usize,
        accepted: usize,
        submitted: usize,
    },
    Rejected {
        submitted: usize,
    },
    Failed(ServerError),
}

#[derive(Debug, Default)]
pub struct ReplayReport {
    pub outcomes: Vec<Outcome>,
    pub histories: BTreeMap<String, Change>,
}

pub fn parse_submissions(content: &str) -> Result<Vec<RecordedSubmission>> {
    let log: ReplayLog = serde_json::from_str(content)?;
    Ok(log.submissions)
}

/// Feed submissions through a fresh hub, in order
pub async fn replay_submissions(
    config: HubConfig,
    submissions: Vec<RecordedSubmission>,
) -> Result<ReplayReport> {
    let hub = DocumentHub::new(config);
    let mut report = ReplayReport::default();

    for submission in submissions {
        let submitted = submission.change.len();
        debug!(doc = %submission.doc, author = submission.author, submitted, "Replaying submission");

        let outcome = match hub
            .apply_change(
                &submission.doc,
                submission.author,
                submission.backtrack,
                submission.change,
            )
            .await
        {
            Ok(change) if change.is_empty() && submitted > 0 => Outcome::Rejected { submitted },
            Ok(change) => Outcome::Accepted {
                start: change.start(),
                accepted: change.len(),
                submitted,
            },
            Err(ServerError::DocumentClosed(doc)) => {
                anyhow::bail!("document worker for {} stopped", doc)
            }
            Err(error) => Outcome::Failed(error),
        };
        report.outcomes.push(outcome);
    }

    for doc in hub.documents() {
        let history = hub.history(&doc).await?;
        report.histories.insert(doc, history);
    }

    Ok(report)
}

pub fn render_history(history: &Change) -> Result<String> {
    let mut document = LinearDocument::new();
    document.apply_change(history)?;
    Ok(document.text())
}

pub fn replay(args: ReplayArgs, config: &Config) -> Result<()> {
    let content = fs::read_to_string(&args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))?;
    let submissions = parse_submissions(&content)?;
    let labels: Vec<(String, AuthorId)> = submissions
        .iter()
        .map(|s| (s.doc.clone(), s.author))
        .collect();

    println!(
        "{} Replaying {} submissions from {}",
        "▶".blue(),
        submissions.len(),
        args.file.display()
    );

    let runtime = tokio::runtime::Runtime::new()?;
    let report = runtime.block_on(replay_submissions(config.hub_config(), submissions))?;

    let mut failures = 0;
    for ((doc, author), outcome) in labels.iter().zip(&report.outcomes) {
        match outcome {
            Outcome::Accepted {
                start,
                accepted,
                submitted,
            } => println!(
                "  {} {} author {}: accepted {}/{} at {}",
                "✓".green(),
                doc,
                author,
                accepted,
                submitted,
                start
            ),
            Outcome::Rejected { submitted } => println!(
                "  {} {} author {}: rejected {}",
                "✗".yellow(),
                doc,
                author,
                submitted
            ),
            Outcome::Failed(error) => {
                failures += 1;
                println!("  {} {} author {}: {}", "✗".red(), doc, author, error);
            }
        }
    }

    if args.render {
        for (doc, history) in &report.histories {
            println!();
            println!("{} {}", doc.bright_white().bold(), history);
            println!("{}", render_history(history)?);
        }
    }

    if let Some(output) = &args.output {
        let json = serde_json::to_string_pretty(&report.histories)?;
        fs::write(output, json)?;
        println!("  {} Wrote {}", "✓".green(), output.display());
    }

    info!(
        documents = report.histories.len(),
        failures, "Replay finished"
    );

    if failures > 0 {
        anyhow::bail!("{} submissions failed", failures);
    }
    Ok(())
}
