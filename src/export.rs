//! One-shot export of the received history.
//!
//! Hex mode exports the raw bytes (`.bin`); text mode exports the transcript
//! rendered from a fresh formatter state (`.log`), the same text a repaint
//! produces.

use crate::bytes::file_stamp;
use crate::history::HistoryStore;
use crate::render::{DisplayMode, FormatterState, RenderFormatter, RenderSettings};
use chrono::{DateTime, Local};
use std::io;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    pub file_name: String,
    pub contents: Vec<u8>,
}

impl ExportArtifact {
    /// Build the artifact for the current settings, stamped with `now`.
    pub fn build(history: &HistoryStore, settings: RenderSettings, now: DateTime<Local>) -> Self {
        let stamp = file_stamp(now);
        match settings.mode {
            DisplayMode::Hex => Self {
                file_name: format!("serial-{stamp}.bin"),
                contents: history.concat_bytes(),
            },
            DisplayMode::Text => {
                let formatter = RenderFormatter::new(settings, false);
                let mut state = FormatterState::default();
                let mut text = formatter.format(&mut state, history.chunks());
                text.push_str(&formatter.finish(&mut state));
                Self {
                    file_name: format!("serial-{stamp}.log"),
                    contents: text.into_bytes(),
                }
            }
        }
    }

    /// Write into `dir`, returning the full path.
    pub fn save(&self, dir: impl AsRef<Path>) -> io::Result<PathBuf> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let path = dir.join(&self.file_name);
        std::fs::write(&path, &self.contents)?;
        info!("Exported {} bytes to {}", self.contents.len(), path.display());
        Ok(path)
    }
}
