//! Committing the Selected list to a target directory under a numbered naming scheme.
//!
//! Files are named `<prefix><number><.ext>` where the number starts at the
//! template's starting number, is zero-padded to the template's digit count and
//! increases by one per item in list order. The original extension is kept.

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io;
use std::str::FromStr;
use thiserror::Error;

/// Largest supported zero-padding width
pub const MAX_DIGITS: u32 = 10;

/// Numbers in existing file names at or above this are ignored when suggesting
/// a starting number
const MAX_SUGGESTED_NUMBER: u64 = 1 << 31;

/// Whether exported files are copied or moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportMode {
    #[default]
    Copy,
    Move,
}

impl fmt::Display for ExportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportMode::Copy => f.write_str("copy"),
            ExportMode::Move => f.write_str("move"),
        }
    }
}

impl FromStr for ExportMode {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "copy" => Ok(ExportMode::Copy),
            "move" => Ok(ExportMode::Move),
            other => Err(ExportError::InvalidMode(other.to_string())),
        }
    }
}

/// Errors that can occur during export
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Unknown export mode '{0}' (expected copy or move)")]
    InvalidMode(String),

    #[error("Invalid digit count {0} (expected 1 to 10)")]
    InvalidDigits(u32),

    #[error("Starting number {start} does not fit in {digits} digits")]
    StartOutOfRange { start: u64, digits: u32 },

    #[error("Target directory does not exist: {0}")]
    TargetMissing(Utf8PathBuf),

    #[error("Target file already exists: {0}")]
    TargetExists(Utf8PathBuf),

    #[error("Failed to {mode} {from} to {to}")]
    Io {
        mode: ExportMode,
        from: Utf8PathBuf,
        to: Utf8PathBuf,
        #[source]
        error: io::Error,
    },
}

/// Prefix, starting number and zero-padding of exported file names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamingTemplate {
    pub prefix: String,
    pub start: u64,
    pub digits: u32,
}

impl NamingTemplate {
    pub fn new(prefix: impl Into<String>, start: u64, digits: u32) -> Result<Self, ExportError> {
        if !(1..=MAX_DIGITS).contains(&digits) {
            return Err(ExportError::InvalidDigits(digits));
        }
        if start > Self::max_start(digits) {
            return Err(ExportError::StartOutOfRange { start, digits });
        }
        Ok(Self {
            prefix: prefix.into(),
            start,
            digits,
        })
    }

    /// Largest starting number representable in `digits` digits.
    pub fn max_start(digits: u32) -> u64 {
        10u64.pow(digits.min(MAX_DIGITS)) - 1
    }

    /// File name for the item at `offset` in the export order.
    ///
    /// Numbers that outgrow the digit count are written in full.
    pub fn file_name(&self, offset: u64, source: &Utf8Path) -> String {
        let number = self.start + offset;
        let width = self.digits as usize;
        match source.extension() {
            Some(ext) => format!("{}{:0width$}.{}", self.prefix, number, ext),
            None => format!("{}{:0width$}", self.prefix, number),
        }
    }
}

/// Everything needed to run one export batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPlan {
    pub target_dir: Utf8PathBuf,
    pub template: NamingTemplate,
    pub mode: ExportMode,
}

impl ExportPlan {
    pub fn target_for(&self, offset: u64, source: &Utf8Path) -> Utf8PathBuf {
        self.target_dir.join(self.template.file_name(offset, source))
    }

    pub fn validate(&self) -> Result<(), ExportError> {
        if !self.target_dir.is_dir() {
            return Err(ExportError::TargetMissing(self.target_dir.clone()));
        }
        Ok(())
    }
}

/// Suggest a template that continues the numbering already present in `target_dir`.
///
/// Every file whose name starts with `prefix` contributes the digits that
/// follow the prefix, concatenated. The next number is one more than the
/// largest value found (or 0), and the digit count grows to the longest run
/// found, capped at [`MAX_DIGITS`].
pub fn suggest_template(
    target_dir: &Utf8Path,
    prefix: &str,
    digits: u32,
) -> anyhow::Result<NamingTemplate> {
    use anyhow::Context;

    let mut max_value: Option<u64> = None;
    let mut max_len = digits as usize;

    let entries = fs::read_dir(target_dir)
        .with_context(|| format!("Failed to read target directory: {}", target_dir))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("Failed to read entry in {}", target_dir))?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        let Some(rest) = name.strip_prefix(prefix) else {
            continue;
        };

        let number: String = rest.chars().filter(char::is_ascii_digit).collect();
        if number.is_empty() {
            continue;
        }
        if let Ok(value) = number.parse::<u64>() {
            if value < MAX_SUGGESTED_NUMBER {
                max_value = Some(max_value.map_or(value, |m| m.max(value)));
                max_len = max_len.max(number.len());
            }
        }
    }

    let start = max_value.map_or(0, |m| m + 1);
    let needed = start.to_string().len();
    let digits = (max_len.max(needed) as u32).clamp(1, MAX_DIGITS);
    let start = start.min(NamingTemplate::max_start(digits));

    tracing::debug!(
        "Suggested template for {}: prefix={:?}, start={}, digits={}",
        target_dir,
        prefix,
        start,
        digits
    );
    Ok(NamingTemplate::new(prefix, start, digits)?)
}

/// Copy or move one file. Never overwrites an existing file.
///
/// A move that cannot be done with a rename (for example across file
/// systems) falls back to copy followed by delete.
pub fn export_item(from: &Utf8Path, to: &Utf8Path, mode: ExportMode) -> Result<(), ExportError> {
    if to.exists() {
        return Err(ExportError::TargetExists(to.to_path_buf()));
    }

    let io_error = |error: io::Error| ExportError::Io {
        mode,
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        error,
    };

    match mode {
        ExportMode::Copy => {
            fs::copy(from, to).map_err(io_error)?;
        }
        ExportMode::Move => {
            if let Err(e) = fs::rename(from, to) {
                tracing::debug!("Rename of {} failed ({}), copying instead", from, e);
                fs::copy(from, to).map_err(io_error)?;
                fs::remove_file(from).map_err(io_error)?;
            }
        }
    }

    tracing::info!("Exported ({}) {} -> {}", mode, from, to);
    Ok(())
}
