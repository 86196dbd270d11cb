//! Folder naming convention of the storage tree
//!
//! Each item folder is named `{CODE} [{SENSOR}-{SUBTITLE}]`, for example
//! `ABC-123 [有码-中字]`.

use regex::Regex;
use std::fmt;
use std::path::PathBuf;
use std::sync::LazyLock;

static FOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+?)\s*\[(.+?)-(.+?)\]$").expect("folder name pattern compiles")
});
static YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}$").expect("year pattern compiles"));

/// Sensor category of a stored copy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sensor {
    /// 有码
    Censored,
    /// 无码
    Uncensored,
    /// 无码流出
    Leaked,
    /// 无码破解
    Cracked,
}

impl Sensor {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Censored => "有码",
            Self::Uncensored => "无码",
            Self::Leaked => "无码流出",
            Self::Cracked => "无码破解",
        }
    }

    pub fn from_label(s: &str) -> Option<Self> {
        match s {
            "有码" => Some(Self::Censored),
            "无码" => Some(Self::Uncensored),
            "无码流出" => Some(Self::Leaked),
            "无码破解" => Some(Self::Cracked),
            _ => None,
        }
    }

    /// Rank inside the uncensored family, 0 for censored
    pub fn priority(&self) -> u8 {
        match self {
            Self::Leaked => 3,
            Self::Uncensored => 2,
            Self::Cracked => 1,
            Self::Censored => 0,
        }
    }

    pub fn is_uncensored_family(&self) -> bool {
        self.priority() > 0
    }
}

impl fmt::Display for Sensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Subtitle category of a stored copy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subtitle {
    /// 中字
    Chinese,
    /// 无字
    None,
}

impl Subtitle {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Chinese => "中字",
            Self::None => "无字",
        }
    }

    pub fn from_label(s: &str) -> Option<Self> {
        match s {
            "中字" => Some(Self::Chinese),
            "无字" => Some(Self::None),
            _ => None,
        }
    }
}

impl fmt::Display for Subtitle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Parsed form of an item folder name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderName {
    pub code: String,
    pub sensor: Sensor,
    pub subtitle: Subtitle,
}

/// One item folder found in the tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderInfo {
    pub path: PathBuf,
    pub year: String,
    pub actor: String,
    pub code: String,
    pub sensor: Sensor,
    pub subtitle: Subtitle,
    /// Total bytes of the files under the folder
    pub size: u64,
}

/// Parses `{CODE} [{SENSOR}-{SUBTITLE}]`
///
/// Unknown sensor or subtitle labels are logged and rejected.
///
/// # Arguments
///
/// * `name` - The bare folder name
///
/// # Returns
///
/// * `Some(FolderName)` - Name follows the convention
/// * `None` - Name is malformed or uses an unknown label
pub fn parse_folder_name(name: &str) -> Option<FolderName> {
    let name = name.trim();
    let caps = FOLDER_RE.captures(name)?;
    let (code, sensor, subtitle) = (caps[1].trim(), caps[2].trim(), caps[3].trim());

    let sensor = match Sensor::from_label(sensor) {
        Some(s) => s,
        None => {
            tracing::warn!("Unknown sensor category '{}' in folder: {}", sensor, name);
            return None;
        }
    };
    let subtitle = match Subtitle::from_label(subtitle) {
        Some(s) => s,
        None => {
            tracing::warn!("Unknown subtitle category '{}' in folder: {}", subtitle, name);
            return None;
        }
    };

    Some(FolderName {
        code: code.to_string(),
        sensor,
        subtitle,
    })
}

/// Year folders are four digits, or `未知` for unknown
pub fn is_year_folder(name: &str) -> bool {
    name == "未知" || YEAR_RE.is_match(name)
}
