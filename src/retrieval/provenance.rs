//! Provenance tracking and scored chunk structures

use crate::document::Chunk;
use crate::index::SearchHit;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Where a retrieved chunk came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    /// Source file path
    pub source_id: String,

    /// Page number for paginated sources, 0 otherwise
    pub ordinal: u32,

    /// Character span within the source document
    pub start_offset: usize,
    pub end_offset: usize,
}

impl Provenance {
    pub fn from_chunk(chunk: &Chunk) -> Self {
        Self {
            source_id: chunk.source_id.clone(),
            ordinal: chunk.ordinal,
            start_offset: chunk.start_offset,
            end_offset: chunk.end_offset,
        }
    }

    /// File name without its directory
    pub fn file_name(&self) -> &str {
        Path::new(&self.source_id)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&self.source_id)
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ordinal > 0 {
            write!(
                f,
                "{} (page {}, chars {}..{})",
                self.file_name(),
                self.ordinal,
                self.start_offset,
                self.end_offset
            )
        } else {
            write!(
                f,
                "{} (chars {}..{})",
                self.file_name(),
                self.start_offset,
                self.end_offset
            )
        }
    }
}

/// A retrieved chunk with its similarity score and provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    /// Entry id in the index that produced this hit
    pub entry_id: usize,

    /// Chunk text
    pub text: String,

    /// Similarity score (higher is better)
    pub score: f32,

    /// Provenance information
    pub provenance: Provenance,
}

impl ScoredChunk {
    pub fn from_hit(hit: SearchHit) -> Self {
        let provenance = Provenance::from_chunk(&hit.chunk);
        Self {
            entry_id: hit.entry_id,
            text: hit.chunk.text,
            score: hit.score,
            provenance,
        }
    }

    /// Get a short preview of the text (first N characters)
    pub fn preview(&self, max_chars: usize) -> String {
        match self.text.char_indices().nth(max_chars) {
            None => self.text.clone(),
            Some((cut, _)) => format!("{}...", &self.text[..cut]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored(text: &str, source_id: &str, ordinal: u32) -> ScoredChunk {
        ScoredChunk::from_hit(SearchHit {
            entry_id: 4,
            score: 0.75,
            chunk: Chunk {
                source_id: source_id.to_string(),
                ordinal,
                start_offset: 10,
                end_offset: 10 + text.chars().count(),
                text: text.to_string(),
            },
        })
    }

    #[test]
    fn test_preview_is_char_safe() {
        let chunk = scored("héllo wörld", "a.md", 0);
        assert_eq!(chunk.preview(2), "hé...");
        assert_eq!(chunk.preview(11), "héllo wörld");
        assert_eq!(chunk.preview(50), "héllo wörld");
    }

    #[test]
    fn test_provenance_display() {
        let pdf = scored("x", "data/manuals/guide.pdf", 3);
        assert_eq!(pdf.provenance.file_name(), "guide.pdf");
        assert_eq!(pdf.provenance.to_string(), "guide.pdf (page 3, chars 10..11)");

        let md = scored("xy", "notes.md", 0);
        assert_eq!(md.provenance.to_string(), "notes.md (chars 10..12)");
        assert_eq!(md.entry_id, 4);
    }
}
