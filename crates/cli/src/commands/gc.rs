//! Artifact garbage collection

use anyhow::Result;
use serde::Serialize;

use super::Context;
use crate::output::{print_item, OutputFormat, TableDisplay};

#[derive(Serialize)]
pub struct GcDisplay {
    pub total_objects: usize,
    pub total_bytes: u64,
    pub deleted_objects: usize,
    pub deleted_bytes: u64,
}

impl TableDisplay for GcDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["Objects", "Bytes", "Deleted Objects", "Deleted Bytes"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.total_objects.to_string(),
            self.total_bytes.to_string(),
            self.deleted_objects.to_string(),
            self.deleted_bytes.to_string(),
        ]
    }
}

/// Drop stored screenshots and diff images no test result points at
pub async fn execute(ctx: &Context, format: OutputFormat) -> Result<()> {
    let referenced = ctx.db.referenced_artifacts()?;
    let stats = ctx.artifacts().await?.gc(&referenced).await?;

    print_item(
        &GcDisplay {
            total_objects: stats.total_objects,
            total_bytes: stats.total_bytes,
            deleted_objects: stats.deleted_objects,
            deleted_bytes: stats.deleted_bytes,
        },
        format,
    );
    Ok(())
}
