//! Session Commands

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Subcommand;
use patternwatch_common::{TestResult, TestSession};
use serde::Serialize;

use super::Context;
use crate::output::{format_timestamp, print_item, print_list, print_success, OutputFormat, TableDisplay};

#[derive(Subcommand)]
pub enum SessionCommands {
    /// List recent sessions
    List {
        /// Maximum number of sessions
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Show a session with its results
    Show {
        /// Session ID
        id: String,
    },

    /// Write a stored screenshot or diff image to a file
    Artifact {
        /// Artifact digest, as listed in the Diff column
        digest: String,

        /// Output PNG path
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Delete a session and its results
    Delete {
        /// Session ID
        id: String,
    },
}

/// Session display wrapper for serialization
#[derive(Serialize)]
pub struct SessionDisplay {
    pub id: String,
    pub category_id: String,
    pub browser: String,
    pub passed: u32,
    pub failed: u32,
    pub missing: u32,
    pub started_at: String,
    pub finished_at: Option<String>,
}

impl From<TestSession> for SessionDisplay {
    fn from(session: TestSession) -> Self {
        Self {
            id: session.id,
            category_id: session.category_id,
            browser: session.browser_name.to_string(),
            passed: session.passed,
            failed: session.failed,
            missing: session.missing,
            started_at: format_timestamp(session.started_at),
            finished_at: session.finished_at.map(format_timestamp),
        }
    }
}

impl TableDisplay for SessionDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["ID", "Category", "Browser", "Passed", "Failed", "No Pattern", "Started", "Finished"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.category_id.clone(),
            self.browser.clone(),
            self.passed.to_string(),
            self.failed.to_string(),
            self.missing.to_string(),
            self.started_at.clone(),
            self.finished_at.clone().unwrap_or_else(|| "running".to_string()),
        ]
    }
}

/// Test result display wrapper for serialization
#[derive(Serialize)]
pub struct ResultDisplay {
    pub test_case: String,
    pub browser: String,
    pub verdict: String,
    pub diff_percent: Option<f64>,
    pub pattern_id: Option<String>,
    pub diff_artifact: Option<String>,
    pub message: Option<String>,
}

impl From<TestResult> for ResultDisplay {
    fn from(result: TestResult) -> Self {
        Self {
            test_case: result.test_case_name,
            browser: result.browser_name.to_string(),
            verdict: result.verdict.to_string(),
            diff_percent: result.diff_percent,
            pattern_id: result.pattern_id,
            diff_artifact: result.diff_digest,
            message: result.message,
        }
    }
}

impl TableDisplay for ResultDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["Test Case", "Browser", "Verdict", "Diff %", "Diff", "Message"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.test_case.clone(),
            self.browser.clone(),
            self.verdict.clone(),
            self.diff_percent
                .map(|p| format!("{:.3}", p))
                .unwrap_or_else(|| "-".to_string()),
            self.diff_artifact.clone().unwrap_or_else(|| "-".to_string()),
            self.message.clone().unwrap_or_default(),
        ]
    }
}

pub async fn execute(cmd: SessionCommands, ctx: &Context, format: OutputFormat) -> Result<()> {
    match cmd {
        SessionCommands::List { limit } => {
            let displays: Vec<SessionDisplay> = ctx
                .db
                .list_sessions(limit)?
                .into_iter()
                .map(SessionDisplay::from)
                .collect();
            print_list(&displays, format);
        }

        SessionCommands::Show { id } => {
            let session = ctx
                .db
                .get_session(&id)?
                .with_context(|| format!("session '{}' not found", id))?;
            let results: Vec<ResultDisplay> = ctx
                .db
                .list_results(&session.id)?
                .into_iter()
                .map(ResultDisplay::from)
                .collect();
            print_item(&SessionDisplay::from(session), format);
            print_list(&results, format);
        }

        SessionCommands::Artifact { digest, out } => {
            let data = ctx
                .artifacts()
                .await?
                .get(&digest)
                .await
                .with_context(|| format!("reading artifact '{}'", digest))?;
            if let Some(parent) = out.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&out, data).with_context(|| format!("writing {}", out.display()))?;
            print_success(&format!("Artifact '{}' written to {}", digest, out.display()));
        }

        SessionCommands::Delete { id } => {
            if !ctx.db.delete_session(&id)? {
                anyhow::bail!("session '{}' not found", id);
            }
            print_success(&format!("Session '{}' deleted", id));
        }
    }

    Ok(())
}
