use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tokio::fs;
use tracing::debug;

use crate::error::{AppError, Result};

static TIMING_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,2}:\d{2}:\d{2}").expect("valid timing regex"));

/// Subtitle text of one input file with timing and cue numbers removed
#[derive(Debug, Clone, PartialEq)]
pub struct RawDocument {
    /// File stem, used as the output title and file name
    pub title: String,
    pub source: PathBuf,
    pub text: String,
}

impl RawDocument {
    /// Read and flatten an SRT file
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(AppError::FileNotFound(path.display().to_string()));
        }

        let bytes = fs::read(path).await?;
        let content = String::from_utf8(bytes).map_err(|e| {
            AppError::Extraction(format!("{} is not valid UTF-8: {}", path.display(), e))
        })?;

        let title = path
            .file_stem()
            .ok_or_else(|| AppError::Extraction(format!("Invalid subtitle filename: {}", path.display())))?
            .to_string_lossy()
            .into_owned();

        let text = extract_text(&content)?;
        debug!("Extracted {} characters from {}", text.chars().count(), path.display());

        Ok(Self {
            title,
            source: path.to_path_buf(),
            text,
        })
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Strip cue numbers and timing lines from SRT content.
///
/// Remaining text lines are trimmed and joined with single spaces, so line
/// breaks inside a cue and between cues both collapse into one space.
pub fn extract_text(srt_content: &str) -> Result<String> {
    let content = srt_content.trim_start_matches('\u{feff}');
    let mut text_lines = Vec::new();
    let mut saw_timing = false;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        if TIMING_LINE.is_match(line) {
            saw_timing = true;
            continue;
        }
        text_lines.push(line);
    }

    if !text_lines.is_empty() && !saw_timing {
        return Err(AppError::Extraction(
            "no subtitle timing lines found; input does not look like SRT".to_string(),
        ));
    }

    Ok(text_lines.join(" "))
}
