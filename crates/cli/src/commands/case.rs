//! Test Case Commands

use anyhow::Result;
use clap::Subcommand;
use patternwatch_common::TestCase;
use serde::Serialize;

use super::Context;
use crate::output::{format_timestamp, print_item, print_list, print_success, OutputFormat, TableDisplay};

#[derive(Subcommand)]
pub enum CaseCommands {
    /// Create a test case inside a category
    Add {
        /// Category name or ID
        #[arg(short, long)]
        category: String,

        /// Test case name
        name: String,
    },

    /// List the test cases of a category
    List {
        /// Category name or ID
        #[arg(short, long)]
        category: String,
    },
}

/// Test case display wrapper for serialization
#[derive(Serialize)]
pub struct CaseDisplay {
    pub id: String,
    pub name: String,
    pub category: String,
    pub created_at: String,
}

impl CaseDisplay {
    fn new(test_case: TestCase, category: &str) -> Self {
        Self {
            id: test_case.id,
            name: test_case.name,
            category: category.to_string(),
            created_at: format_timestamp(test_case.created_at),
        }
    }
}

impl TableDisplay for CaseDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["ID", "Name", "Category", "Created"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.name.clone(),
            self.category.clone(),
            self.created_at.clone(),
        ]
    }
}

pub fn execute(cmd: CaseCommands, ctx: &Context, format: OutputFormat) -> Result<()> {
    match cmd {
        CaseCommands::Add { category, name } => {
            let category = ctx.category(&category)?;
            let test_case = ctx.db.create_test_case(&category.id, &name)?;
            print_success(&format!(
                "Test case '{}' created in '{}'",
                test_case.name, category.name
            ));
            print_item(&CaseDisplay::new(test_case, &category.name), format);
        }

        CaseCommands::List { category } => {
            let category = ctx.category(&category)?;
            let displays: Vec<CaseDisplay> = ctx
                .db
                .list_test_cases(&category.id)?
                .into_iter()
                .map(|test_case| CaseDisplay::new(test_case, &category.name))
                .collect();
            print_list(&displays, format);
        }
    }

    Ok(())
}
