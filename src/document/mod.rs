//! Source documents and the chunks cut from them

use serde::{Deserialize, Serialize};

/// A unit of extracted source text
///
/// Produced by a [`Loader`](crate::loader::Loader). Paginated sources yield one
/// document per page; everything else yields one document per file with
/// `ordinal == 0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Stable identifier of the source (file path)
    pub source_id: String,
    /// Page number (1-based) for paginated sources, 0 otherwise
    pub ordinal: u32,
    /// Normalized full text
    pub text: String,
}

impl Document {
    pub fn new(source_id: impl Into<String>, ordinal: u32, text: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            ordinal,
            text: text.into(),
        }
    }

    /// Length of the text in characters
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// A contiguous slice of one document's text
///
/// Offsets count characters (Unicode scalar values), not bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub source_id: String,
    pub ordinal: u32,
    pub start_offset: usize,
    pub end_offset: usize,
    pub text: String,
}

impl Chunk {
    /// Length of the chunk in characters
    pub fn char_len(&self) -> usize {
        self.end_offset - self.start_offset
    }

    /// Short human-readable location, e.g. `manual.pdf#3@1200..2000`
    pub fn locator(&self) -> String {
        format!(
            "{}#{}@{}..{}",
            self.source_id, self.ordinal, self.start_offset, self.end_offset
        )
    }
}
