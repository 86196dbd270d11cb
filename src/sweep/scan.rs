//! Storage tree enumeration
//!
//! The tree is laid out as `root/{year}/{actor}/{item folder}`. Years and
//! actors are listed first, then actor directories are listed and sized
//! with a bounded number of concurrent workers.

use crate::sweep::folder::{is_year_folder, parse_folder_name, FolderInfo};
use crate::sweep::SweepError;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};

/// Read-only view of a directory tree
#[async_trait]
pub trait FolderTree: Send + Sync {
    /// Names of the directories directly under `path`
    async fn list_dirs(&self, path: &Path) -> Result<Vec<String>, SweepError>;

    /// Total size in bytes of every file below `path`
    async fn folder_size(&self, path: &Path) -> Result<u64, SweepError>;
}

/// `FolderTree` over a locally mounted directory
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalTree;

#[async_trait]
impl FolderTree for LocalTree {
    async fn list_dirs(&self, path: &Path) -> Result<Vec<String>, SweepError> {
        let mut entries = tokio::fs::read_dir(path).await?;
        let mut dirs = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                dirs.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        dirs.sort();
        Ok(dirs)
    }

    async fn folder_size(&self, path: &Path) -> Result<u64, SweepError> {
        let mut total = 0;
        let mut pending = vec![path.to_path_buf()];
        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    pending.push(entry.path());
                } else if file_type.is_file() {
                    total += entry.metadata().await?.len();
                }
            }
        }
        Ok(total)
    }
}

/// Enumerates every parsable item folder under `root`
///
/// Actor directories are processed by at most `workers` concurrent tasks;
/// the result carries no ordering guarantee. An actor directory that cannot
/// be read is logged and skipped.
///
/// # Arguments
///
/// * `tree` - The tree to read
/// * `root` - Library root holding the year folders
/// * `workers` - Maximum concurrent actor listings
///
/// # Returns
///
/// * `Ok(Vec<FolderInfo>)` - Every folder following the naming convention
/// * `Err(SweepError)` - The root or a year folder could not be listed
pub async fn scan(
    tree: &dyn FolderTree,
    root: &Path,
    workers: usize,
) -> Result<Vec<FolderInfo>, SweepError> {
    let mut actors: Vec<(String, String)> = Vec::new();
    for year in tree.list_dirs(root).await? {
        if !is_year_folder(&year) {
            tracing::debug!("Skipping non-year folder {}", year);
            continue;
        }
        for actor in tree.list_dirs(&root.join(&year)).await? {
            actors.push((year.clone(), actor));
        }
    }

    tracing::info!(
        "Scanning {} actor folders under {} with {} workers",
        actors.len(),
        root.display(),
        workers.max(1)
    );

    let results: Vec<Vec<FolderInfo>> = stream::iter(actors)
        .map(|(year, actor)| async move {
            let dir = root.join(&year).join(&actor);
            match scan_actor(tree, &dir, &year, &actor).await {
                Ok(folders) => folders,
                Err(e) => {
                    tracing::warn!("Failed to scan {}: {}", dir.display(), e);
                    Vec::new()
                }
            }
        })
        .buffer_unordered(workers.max(1))
        .collect()
        .await;

    let folders: Vec<FolderInfo> = results.into_iter().flatten().collect();
    tracing::info!("Found {} item folders", folders.len());
    Ok(folders)
}

async fn scan_actor(
    tree: &dyn FolderTree,
    dir: &Path,
    year: &str,
    actor: &str,
) -> Result<Vec<FolderInfo>, SweepError> {
    let mut folders = Vec::new();
    for name in tree.list_dirs(dir).await? {
        let parsed = match parse_folder_name(&name) {
            Some(parsed) => parsed,
            None => {
                tracing::debug!("Skipping unparsable folder {}", name);
                continue;
            }
        };
        let path: PathBuf = dir.join(&name);
        let size = tree.folder_size(&path).await?;
        folders.push(FolderInfo {
            path,
            year: year.to_string(),
            actor: actor.to_string(),
            code: parsed.code,
            sensor: parsed.sensor,
            subtitle: parsed.subtitle,
            size,
        });
    }
    Ok(folders)
}
