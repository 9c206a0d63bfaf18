//! Single screenshot comparison

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Args;
use patternwatch_common::encode_png;
use patternwatch_visual::{Comparator, Comparison};
use serde::Serialize;

use super::Context;
use crate::output::{print_item, print_success, OutputFormat, TableDisplay};

#[derive(Args)]
pub struct CompareArgs {
    /// Captured screenshot (PNG)
    #[arg(short, long)]
    pub candidate: PathBuf,

    /// Pattern ID to compare against
    #[arg(short, long)]
    pub pattern: String,

    /// Write the highlighted diff image here on mismatch
    #[arg(long)]
    pub diff_out: Option<PathBuf>,

    /// Per-channel tolerance, overrides the configured value
    #[arg(long)]
    pub tolerance: Option<u8>,

    /// Allowed share of differing pixels in percent, overrides the configured value
    #[arg(long)]
    pub max_diff: Option<f64>,
}

/// Comparison display wrapper for serialization
#[derive(Serialize)]
pub struct ComparisonDisplay {
    pub pattern_id: String,
    pub matches: bool,
    pub diff_percent: f64,
    pub diff_pixels: u64,
    pub compared_pixels: u64,
    pub masked_pixels: u64,
    pub dimensions_match: bool,
}

impl ComparisonDisplay {
    fn new(pattern_id: &str, comparison: &Comparison) -> Self {
        Self {
            pattern_id: pattern_id.to_string(),
            matches: comparison.matches,
            diff_percent: comparison.diff_percent,
            diff_pixels: comparison.diff_pixels,
            compared_pixels: comparison.compared_pixels,
            masked_pixels: comparison.masked_pixels,
            dimensions_match: comparison.dimensions_match,
        }
    }
}

impl TableDisplay for ComparisonDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["Pattern", "Result", "Diff %", "Differing", "Compared", "Masked", "Same Size"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.pattern_id.clone(),
            if self.matches { "match" } else { "MISMATCH" }.to_string(),
            format!("{:.3}", self.diff_percent),
            self.diff_pixels.to_string(),
            self.compared_pixels.to_string(),
            self.masked_pixels.to_string(),
            if self.dimensions_match { "yes" } else { "no" }.to_string(),
        ]
    }
}

/// Returns whether the candidate matched
pub fn execute(args: CompareArgs, ctx: &Context, format: OutputFormat) -> Result<bool> {
    let pattern = ctx
        .db
        .get_pattern(&args.pattern)?
        .with_context(|| format!("pattern '{}' not found", args.pattern))?;

    let candidate = image::open(&args.candidate)
        .with_context(|| format!("reading {}", args.candidate.display()))?
        .to_rgba8();

    let mut settings = ctx.config.comparison;
    if let Some(tolerance) = args.tolerance {
        settings.channel_tolerance = tolerance;
    }
    if let Some(max_diff) = args.max_diff {
        if !(0.0..=100.0).contains(&max_diff) {
            anyhow::bail!("--max-diff must be within 0..=100, got {}", max_diff);
        }
        settings.max_diff_percent = max_diff;
    }

    let comparison = Comparator::new(settings).compare_pattern(&candidate, &pattern)?;
    print_item(&ComparisonDisplay::new(&pattern.id, &comparison), format);

    if let (Some(diff), Some(out)) = (&comparison.diff_image, &args.diff_out) {
        if let Some(parent) = out.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(out, encode_png(diff)?)
            .with_context(|| format!("writing {}", out.display()))?;
        print_success(&format!("Diff image written to {}", out.display()));
    }

    Ok(comparison.matches)
}
