//! Source loading and text normalization
//!
//! Markdown and plain text are read directly. PDFs are converted with the
//! `pdftotext` binary from poppler; its form-feed page separators become one
//! [`Document`] per page.

use crate::document::Document;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Unsupported source format: {path}")]
    Unsupported { path: PathBuf },

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("PDF extraction failed for {path}: {reason}")]
    Pdf { path: PathBuf, reason: String },

    #[error("No text extracted from {path}")]
    NoText { path: PathBuf },

    #[error("Invalid normalization pattern: {0}")]
    Pattern(String),
}

/// Turns a source path into documents
pub trait Loader: Send + Sync {
    /// Load one source
    ///
    /// Failures are per source; callers are expected to log and continue.
    fn load(&self, path: &Path) -> Result<Vec<Document>, LoadError>;
}

/// Filesystem loader for `.md`, `.markdown`, `.txt` and `.pdf`
pub struct FsLoader {
    pdftotext: PathBuf,
    control_chars: Regex,
}

impl FsLoader {
    pub fn new() -> Result<Self, LoadError> {
        Self::with_pdftotext("pdftotext")
    }

    /// Use a specific `pdftotext` executable
    pub fn with_pdftotext(binary: impl Into<PathBuf>) -> Result<Self, LoadError> {
        // Keep \t (09), \n (0A) and form feed (0C)
        let control_chars = Regex::new(r"[\x00-\x08\x0B\x0E-\x1F\x7F]")
            .map_err(|e| LoadError::Pattern(e.to_string()))?;

        Ok(Self {
            pdftotext: binary.into(),
            control_chars,
        })
    }

    /// Strip BOM, unify line endings and drop stray control characters
    pub fn normalize(&self, raw: &str) -> String {
        let text = raw.strip_prefix('\u{feff}').unwrap_or(raw);
        let text = text.replace("\r\n", "\n").replace('\r', "\n");
        self.control_chars.replace_all(&text, "").into_owned()
    }

    fn load_text(&self, path: &Path) -> Result<Vec<Document>, LoadError> {
        let bytes = std::fs::read(path).map_err(|e| LoadError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;

        let raw = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("{} is not valid UTF-8, decoding lossily", path.display());
                String::from_utf8_lossy(e.as_bytes()).into_owned()
            }
        };

        let text = self.normalize(&raw).replace('\u{c}', "\n");
        if text.trim().is_empty() {
            return Err(LoadError::NoText {
                path: path.to_path_buf(),
            });
        }

        Ok(vec![Document::new(source_id(path), 0, text)])
    }

    fn load_pdf(&self, path: &Path) -> Result<Vec<Document>, LoadError> {
        let output = Command::new(&self.pdftotext)
            .arg("-layout")
            .arg("-enc")
            .arg("UTF-8")
            .arg(path)
            .arg("-")
            .output()
            .map_err(|e| LoadError::Pdf {
                path: path.to_path_buf(),
                reason: format!("failed to run {}: {} (is poppler installed?)", self.pdftotext.display(), e),
            })?;

        if !output.status.success() {
            return Err(LoadError::Pdf {
                path: path.to_path_buf(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let text = self.normalize(&String::from_utf8_lossy(&output.stdout));
        let id = source_id(path);
        let pages: Vec<Document> = text
            .split('\u{c}')
            .enumerate()
            .filter(|(_, page)| !page.trim().is_empty())
            .map(|(i, page)| Document::new(id.clone(), i as u32 + 1, page))
            .collect();

        if pages.is_empty() {
            return Err(LoadError::NoText {
                path: path.to_path_buf(),
            });
        }

        tracing::debug!("Extracted {} page(s) from {}", pages.len(), path.display());
        Ok(pages)
    }
}

impl Loader for FsLoader {
    fn load(&self, path: &Path) -> Result<Vec<Document>, LoadError> {
        match extension(path).as_deref() {
            Some("md") | Some("markdown") | Some("txt") => self.load_text(path),
            Some("pdf") => self.load_pdf(path),
            _ => Err(LoadError::Unsupported {
                path: path.to_path_buf(),
            }),
        }
    }
}

/// List source files under `dir` whose extension is in `extensions`
///
/// Results are sorted so ingestion order, and with it entry ids, is stable.
pub fn discover_sources(
    dir: &Path,
    extensions: &[String],
    recursive: bool,
) -> std::io::Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("source directory not found: {}", dir.display()),
        ));
    }

    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut sources: Vec<PathBuf> = WalkDir::new(dir)
        .max_depth(max_depth)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            extension(path)
                .map(|ext| extensions.iter().any(|wanted| wanted.eq_ignore_ascii_case(&ext)))
                .unwrap_or(false)
        })
        .collect();

    sources.sort();
    Ok(sources)
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

fn source_id(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
