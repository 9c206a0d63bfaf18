//! Comparison run over a screenshot directory

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use patternwatch_common::BrowserName;
use patternwatch_visual::{DirectoryCamera, PatternRunner};

use super::session::{ResultDisplay, SessionDisplay};
use super::Context;
use crate::output::{print_item, print_list, print_success, print_warning, OutputFormat};

#[derive(Args)]
pub struct RunArgs {
    /// Category name or ID
    #[arg(short, long)]
    pub category: String,

    /// Browser the screenshots were taken with
    #[arg(short, long)]
    pub browser: BrowserName,

    /// Directory holding `<prefix><test case>.png` captures
    #[arg(short, long)]
    pub screenshots: PathBuf,

    /// File name prefix, overrides the configured value
    #[arg(long)]
    pub prefix: Option<String>,

    /// Store captures without a pattern as new patterns
    #[arg(long)]
    pub accept_missing: bool,

    /// Write the full run report as JSON
    #[arg(long)]
    pub report: Option<PathBuf>,
}

/// Returns whether every result passed or had no pattern
pub async fn execute(args: RunArgs, ctx: &Context, format: OutputFormat) -> Result<bool> {
    if !args.screenshots.is_dir() {
        anyhow::bail!("{} is not a directory", args.screenshots.display());
    }

    let category = ctx.category(&args.category)?;
    let prefix = args
        .prefix
        .unwrap_or_else(|| ctx.config.camera.prefix.clone());
    let camera = DirectoryCamera::new(&args.screenshots).with_prefix(prefix);

    let mut config = ctx.config.runner_config();
    config.auto_accept_missing |= args.accept_missing;

    let runner = PatternRunner::new(ctx.db.clone(), ctx.artifacts().await?, config);
    let report = runner
        .run(&category, &args.browser, Arc::new(camera))
        .await?;

    if let Some(path) = &args.report {
        PatternRunner::write_report(&report, path)?;
    }

    let success = report.success();
    let missing = report.missing;
    print_item(&SessionDisplay::from(report.session), format);
    let results: Vec<ResultDisplay> = report.results.into_iter().map(ResultDisplay::from).collect();
    print_list(&results, format);

    if missing > 0 {
        print_warning(&format!("{} screenshot(s) have no pattern", missing));
    }
    if success {
        print_success(&format!("All patterns of '{}' match on {}", category.name, args.browser));
    }

    Ok(success)
}
