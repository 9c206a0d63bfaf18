//! Category Commands

use anyhow::Result;
use clap::Subcommand;
use patternwatch_common::Category;
use serde::Serialize;

use super::Context;
use crate::output::{format_timestamp, print_item, print_list, print_success, OutputFormat, TableDisplay};

#[derive(Subcommand)]
pub enum CategoryCommands {
    /// Create a category
    Add {
        /// Category name
        name: String,
    },

    /// List all categories
    List,
}

/// Category display wrapper for serialization
#[derive(Serialize)]
pub struct CategoryDisplay {
    pub id: String,
    pub name: String,
    pub created_at: String,
}

impl From<Category> for CategoryDisplay {
    fn from(category: Category) -> Self {
        Self {
            id: category.id,
            name: category.name,
            created_at: format_timestamp(category.created_at),
        }
    }
}

impl TableDisplay for CategoryDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["ID", "Name", "Created"]
    }

    fn row(&self) -> Vec<String> {
        vec![self.id.clone(), self.name.clone(), self.created_at.clone()]
    }
}

pub fn execute(cmd: CategoryCommands, ctx: &Context, format: OutputFormat) -> Result<()> {
    match cmd {
        CategoryCommands::Add { name } => {
            let category = ctx.db.create_category(&name)?;
            print_success(&format!("Category '{}' created", category.name));
            print_item(&CategoryDisplay::from(category), format);
        }

        CategoryCommands::List => {
            let displays: Vec<CategoryDisplay> = ctx
                .db
                .list_categories()?
                .into_iter()
                .map(CategoryDisplay::from)
                .collect();
            print_list(&displays, format);
        }
    }

    Ok(())
}
