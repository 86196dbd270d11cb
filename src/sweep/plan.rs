//! Keep/delete planning over scanned folders

use crate::sweep::folder::{FolderInfo, Sensor, Subtitle};
use crate::sweep::SweepError;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Why a folder is planned for deletion
#[derive(Debug, Clone, PartialEq)]
pub enum DeleteReason {
    /// A higher priority uncensored copy with the same subtitle exists
    LowerSensorPriority { kept: Sensor, deleted: Sensor },
    /// A subtitled copy exists and this copy is not large enough to keep
    SubtitledCopyExists {
        kept: Sensor,
        subtitled_size: u64,
        size: u64,
    },
}

impl fmt::Display for DeleteReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LowerSensorPriority { kept, deleted } => write!(
                f,
                "Uncensored priority ({} > {}), keep {}, delete {}",
                kept, deleted, kept, deleted
            ),
            Self::SubtitledCopyExists {
                kept,
                subtitled_size,
                size,
            } => write!(
                f,
                "Subtitled copy exists ({}-中字, {}), delete no-subtitle copy ({})",
                kept,
                format_size(*subtitled_size),
                format_size(*size)
            ),
        }
    }
}

/// A folder planned for deletion
#[derive(Debug, Clone, PartialEq)]
pub struct Deletion {
    pub folder: FolderInfo,
    pub reason: DeleteReason,
    /// A copy of the same code that stays
    pub kept_path: Option<PathBuf>,
}

/// Outcome of planning; nothing is deleted
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepPlan {
    pub keep: Vec<FolderInfo>,
    pub delete: Vec<Deletion>,
}

impl SweepPlan {
    pub fn reclaimable_bytes(&self) -> u64 {
        self.delete.iter().map(|d| d.folder.size).sum()
    }

    pub fn codes(&self) -> usize {
        let mut codes: Vec<&str> = self
            .keep
            .iter()
            .map(|f| f.code.as_str())
            .chain(self.delete.iter().map(|d| d.folder.code.as_str()))
            .collect();
        codes.sort_unstable();
        codes.dedup();
        codes.len()
    }
}

/// Plans which copies of each code to keep
///
/// Censored copies: when both subtitle kinds exist every 中字 copy stays and
/// each 无字 copy goes unless it is larger than `size_ratio` times the
/// largest 中字 copy. Uncensored family: within each subtitle kind only the
/// highest priority sensor stays, then the same subtitle rule applies.
///
/// # Arguments
///
/// * `folders` - Every parsed folder of the scan
/// * `size_ratio` - Size factor that keeps a no-subtitle copy
pub fn plan(folders: Vec<FolderInfo>, size_ratio: f64) -> SweepPlan {
    let mut by_code: BTreeMap<String, Vec<FolderInfo>> = BTreeMap::new();
    for folder in folders {
        by_code.entry(folder.code.clone()).or_default().push(folder);
    }

    let mut plan = SweepPlan::default();
    for (code, group) in by_code {
        if group.len() <= 1 {
            plan.keep.extend(group);
            continue;
        }

        let (uncensored, censored): (Vec<FolderInfo>, Vec<FolderInfo>) =
            group.into_iter().partition(|f| f.sensor.is_uncensored_family());

        let before = plan.delete.len();
        plan_censored(&mut plan, censored, size_ratio);
        plan_uncensored(&mut plan, uncensored, size_ratio);

        let removed = plan.delete.len() - before;
        if removed > 0 {
            tracing::debug!("{}: {} duplicate folder(s) planned for deletion", code, removed);
        }
    }
    plan
}

fn plan_censored(plan: &mut SweepPlan, folders: Vec<FolderInfo>, size_ratio: f64) {
    let (subtitled, plain): (Vec<FolderInfo>, Vec<FolderInfo>) = folders
        .into_iter()
        .partition(|f| f.subtitle == Subtitle::Chinese);
    apply_subtitle_rule(plan, subtitled, plain, size_ratio);
}

fn plan_uncensored(plan: &mut SweepPlan, folders: Vec<FolderInfo>, size_ratio: f64) {
    if folders.is_empty() {
        return;
    }
    let (subtitled, plain): (Vec<FolderInfo>, Vec<FolderInfo>) = folders
        .into_iter()
        .partition(|f| f.subtitle == Subtitle::Chinese);

    let subtitled = keep_highest_sensor(plan, subtitled);
    let plain = keep_highest_sensor(plan, plain);
    apply_subtitle_rule(plan, subtitled, plain, size_ratio);
}

/// Keeps the highest priority sensor, first seen wins a tie
fn keep_highest_sensor(plan: &mut SweepPlan, mut folders: Vec<FolderInfo>) -> Vec<FolderInfo> {
    if folders.len() <= 1 {
        return folders;
    }
    folders.sort_by(|a, b| b.sensor.priority().cmp(&a.sensor.priority()));
    let mut rest = folders.split_off(1);
    let kept = &folders[0];
    for folder in rest.drain(..) {
        plan.delete.push(Deletion {
            reason: DeleteReason::LowerSensorPriority {
                kept: kept.sensor,
                deleted: folder.sensor,
            },
            kept_path: Some(kept.path.clone()),
            folder,
        });
    }
    folders
}

fn apply_subtitle_rule(
    plan: &mut SweepPlan,
    subtitled: Vec<FolderInfo>,
    plain: Vec<FolderInfo>,
    size_ratio: f64,
) {
    let reference = match subtitled.iter().max_by_key(|f| f.size).cloned() {
        Some(largest) if !plain.is_empty() => largest,
        _ => {
            plan.keep.extend(subtitled);
            plan.keep.extend(plain);
            return;
        }
    };
    plan.keep.extend(subtitled);

    for folder in plain {
        if reference.size > 0 && folder.size as f64 > reference.size as f64 * size_ratio {
            tracing::debug!(
                "Keeping {}: no-subtitle copy ({}) is over {:.0}% of the subtitled one ({})",
                folder.path.display(),
                format_size(folder.size),
                size_ratio * 100.0,
                format_size(reference.size)
            );
            plan.keep.push(folder);
        } else {
            plan.delete.push(Deletion {
                reason: DeleteReason::SubtitledCopyExists {
                    kept: reference.sensor,
                    subtitled_size: reference.size,
                    size: folder.size,
                },
                kept_path: Some(reference.path.clone()),
                folder,
            });
        }
    }
}

/// Formats bytes with binary units
pub fn format_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    for unit in ["B", "KB", "MB", "GB", "TB"] {
        if size < 1024.0 {
            return format!("{:.2} {}", size, unit);
        }
        size /= 1024.0;
    }
    format!("{:.2} PB", size)
}

/// Writes the deletion list as CSV
///
/// # Arguments
///
/// * `plan` - The computed plan
/// * `path` - Report file to create
pub fn write_report(plan: &SweepPlan, path: &Path) -> Result<(), SweepError> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record([
        "code",
        "sensor",
        "subtitle",
        "reason",
        "size",
        "path",
        "kept_path",
    ])?;
    for deletion in &plan.delete {
        let folder = &deletion.folder;
        writer.write_record([
            folder.code.clone(),
            folder.sensor.to_string(),
            folder.subtitle.to_string(),
            deletion.reason.to_string(),
            folder.size.to_string(),
            folder.path.display().to_string(),
            deletion
                .kept_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
