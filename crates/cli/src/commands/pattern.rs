//! Pattern Commands

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Subcommand;
use patternwatch_common::{BlindRegion, BrowserName, BrowserPattern, PatternScreenshot};
use serde::Serialize;

use super::Context;
use crate::output::{
    format_timestamp, print_item, print_list, print_success, print_warning, OutputFormat,
    TableDisplay,
};

#[derive(Subcommand)]
pub enum PatternCommands {
    /// Store a reference screenshot as the active pattern
    Add {
        /// Category name or ID
        #[arg(short, long)]
        category: String,

        /// Test case name, created when missing
        #[arg(long)]
        case: String,

        /// Browser the screenshot was taken with
        #[arg(short, long)]
        browser: BrowserName,

        /// PNG file holding the reference screenshot
        #[arg(short, long)]
        image: PathBuf,

        /// Blind region as x,y,width,height (repeatable)
        #[arg(short, long = "region")]
        regions: Vec<BlindRegion>,
    },

    /// List active patterns of a category for a browser
    List {
        /// Category name or ID
        #[arg(short, long)]
        category: String,

        /// Browser name
        #[arg(short, long)]
        browser: BrowserName,
    },

    /// Show pattern details
    Show {
        /// Pattern ID
        id: String,
    },

    /// Add a blind region to a pattern
    Region {
        /// Pattern ID
        id: String,

        /// Region as x,y,width,height
        region: BlindRegion,
    },

    /// Write the reference screenshot of a pattern to a file
    Export {
        /// Pattern ID
        id: String,

        /// Output PNG path
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Delete a pattern
    Delete {
        /// Pattern ID
        id: String,
    },
}

/// Pattern display wrapper for serialization
#[derive(Serialize)]
pub struct PatternDisplay {
    pub id: String,
    pub test_case: String,
    pub browser: String,
    pub size: String,
    pub blind_regions: Vec<String>,
    pub active: bool,
    pub screenshot_sha256: String,
    pub created_at: String,
}

impl From<BrowserPattern> for PatternDisplay {
    fn from(pattern: BrowserPattern) -> Self {
        Self {
            id: pattern.id,
            test_case: pattern.test_case_name,
            browser: pattern.browser_name.to_string(),
            size: format!("{}x{}", pattern.screenshot.width, pattern.screenshot.height),
            blind_regions: pattern.blind_regions.iter().map(|r| r.to_string()).collect(),
            active: pattern.active,
            screenshot_sha256: pattern.screenshot.hash,
            created_at: format_timestamp(pattern.created_at),
        }
    }
}

impl TableDisplay for PatternDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["ID", "Test Case", "Browser", "Size", "Blind Regions", "Active", "Created"]
    }

    fn row(&self) -> Vec<String> {
        let regions = if self.blind_regions.is_empty() {
            "-".to_string()
        } else {
            self.blind_regions.join(" ")
        };

        vec![
            self.id.clone(),
            self.test_case.clone(),
            self.browser.clone(),
            self.size.clone(),
            regions,
            if self.active { "yes" } else { "no" }.to_string(),
            self.created_at.clone(),
        ]
    }
}

fn load_pattern(ctx: &Context, id: &str) -> Result<BrowserPattern> {
    ctx.db
        .get_pattern(id)?
        .with_context(|| format!("pattern '{}' not found", id))
}

pub fn execute(cmd: PatternCommands, ctx: &Context, format: OutputFormat) -> Result<()> {
    match cmd {
        PatternCommands::Add {
            category,
            case,
            browser,
            image,
            regions,
        } => {
            let category = ctx.category(&category)?;
            let test_case = match ctx.db.find_test_case(&category.id, &case)? {
                Some(test_case) => test_case,
                None => ctx.db.create_test_case(&category.id, &case)?,
            };

            let png = std::fs::read(&image)
                .with_context(|| format!("reading {}", image.display()))?;
            let screenshot = PatternScreenshot::from_png(png)?;

            let replaced = ctx.db.find_active_pattern(&test_case.id, &browser)?;
            let pattern = ctx.db.save_pattern(&test_case.id, &browser, screenshot, &regions)?;
            if let Some(old) = replaced {
                print_warning(&format!("Pattern '{}' is no longer active", old.id));
            }
            print_success(&format!(
                "Pattern stored for '{}' on {}",
                test_case.name, browser
            ));
            print_item(&PatternDisplay::from(pattern), format);
        }

        PatternCommands::List { category, browser } => {
            let category = ctx.category(&category)?;
            let displays: Vec<PatternDisplay> = ctx
                .db
                .find_patterns_for_browser_in_category(&category.id, &browser)?
                .into_iter()
                .map(PatternDisplay::from)
                .collect();
            print_list(&displays, format);
        }

        PatternCommands::Show { id } => {
            let pattern = load_pattern(ctx, &id)?;
            print_item(&PatternDisplay::from(pattern), format);
        }

        PatternCommands::Region { id, region } => {
            let pattern = ctx.db.add_blind_region(&id, region)?;
            print_success(&format!("Blind region {} added to pattern '{}'", region, id));
            print_item(&PatternDisplay::from(pattern), format);
        }

        PatternCommands::Export { id, out } => {
            let pattern = load_pattern(ctx, &id)?;
            if let Some(parent) = out.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&out, &pattern.screenshot.png)
                .with_context(|| format!("writing {}", out.display()))?;
            print_success(&format!("Pattern '{}' written to {}", id, out.display()));
        }

        PatternCommands::Delete { id } => {
            if !ctx.db.delete_pattern(&id)? {
                anyhow::bail!("pattern '{}' not found", id);
            }
            print_success(&format!("Pattern '{}' deleted", id));
        }
    }

    Ok(())
}
