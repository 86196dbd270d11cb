//! Storage dedup sweep
//!
//! Finds duplicate copies of the same item in a storage library and plans
//! which ones to remove. The sweep only reads the tree; it never deletes.

mod folder;
mod plan;
mod scan;

pub use folder::{is_year_folder, parse_folder_name, FolderInfo, FolderName, Sensor, Subtitle};
pub use plan::{format_size, plan, write_report, DeleteReason, Deletion, SweepPlan};
pub use scan::{scan, FolderTree, LocalTree};

use crate::config::SweepConfig;
use std::path::Path;
use thiserror::Error;

/// Errors raised while reading the tree or writing a report
#[derive(Debug, Error)]
pub enum SweepError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Scans `root` on the local filesystem and plans the dedup
pub async fn run_sweep(root: &Path, config: &SweepConfig) -> Result<SweepPlan, SweepError> {
    let folders = scan(&LocalTree, root, config.workers).await?;
    let plan = plan(folders, config.size_threshold_ratio);
    tracing::info!(
        "Sweep planned: keep {}, delete {} ({} reclaimable)",
        plan.keep.len(),
        plan.delete.len(),
        format_size(plan.reclaimable_bytes())
    );
    Ok(plan)
}
