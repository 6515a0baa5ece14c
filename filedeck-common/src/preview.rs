//! Preview capability registry.
//!
//! Maps a normalized file extension to how a client should render the
//! object. Anything not registered falls back to a download link.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::naming;
use crate::record::FileRecord;

/// Viewer used to render markdown objects by url.
pub const MARKDOWN_VIEWER_URL: &str = "https://marked.js.org/web/viewer.html";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreviewKind {
    /// Embedded document frame (pdf).
    Document,
    Video,
    Audio,
    Image,
    /// Vector image embedded as an object (svg).
    Vector,
    Markdown,
    Download,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preview {
    pub kind: PreviewKind,
    /// Url the renderer should load.
    pub src: String,
}

#[derive(Debug, Clone)]
pub struct PreviewRegistry {
    by_extension: HashMap<String, PreviewKind>,
}

impl Default for PreviewRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry
            .register("pdf", PreviewKind::Document)
            .register("mp4", PreviewKind::Video)
            .register("mp3", PreviewKind::Audio)
            .register("png", PreviewKind::Image)
            .register("jpg", PreviewKind::Image)
            .register("jpeg", PreviewKind::Image)
            .register("gif", PreviewKind::Image)
            .register("svg", PreviewKind::Vector)
            .register("md", PreviewKind::Markdown);
        registry
    }
}

impl PreviewRegistry {
    pub fn empty() -> Self {
        Self {
            by_extension: HashMap::new(),
        }
    }

    pub fn register(&mut self, extension: &str, kind: PreviewKind) -> &mut Self {
        self.by_extension
            .insert(extension.trim_start_matches('.').to_ascii_lowercase(), kind);
        self
    }

    pub fn kind_for(&self, pathname: &str) -> PreviewKind {
        naming::extension(pathname)
            .map(str::to_ascii_lowercase)
            .and_then(|ext| self.by_extension.get(&ext).copied())
            .unwrap_or(PreviewKind::Download)
    }

    pub fn preview(&self, record: &FileRecord) -> Preview {
        let kind = self.kind_for(&record.pathname);
        let src = match kind {
            PreviewKind::Markdown => format!(
                "{}?url={}",
                MARKDOWN_VIEWER_URL,
                urlencoding::encode(&record.url)
            ),
            _ => record.url.clone(),
        };
        Preview { kind, src }
    }
}
