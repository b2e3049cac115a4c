//! Hierarchical text chunker
//!
//! Splits a document into bounded, overlapping chunks. Split points are taken
//! from a cascade of separators, coarsest first:
//!
//! 1. paragraph break (`"\n\n"`)
//! 2. sentence end (`.`, `!`, `?` followed by whitespace)
//! 3. whitespace
//! 4. single character (hard split)
//!
//! A region is only split at a finer separator when a coarser one cannot
//! produce pieces within the size budget. Adjacent pieces are then merged back
//! up to the budget, and every chunk after the first is prefixed with the
//! trailing `overlap` characters of its predecessor.
//!
//! The first segment may use the whole `max_size`; later segments are
//! budgeted `max_size - overlap` so the overlap prefix never pushes a chunk
//! past `max_size`.

use crate::document::{Chunk, Document};
use std::ops::Range;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChunkerError {
    #[error("max_size must be greater than 0")]
    ZeroMaxSize,

    #[error("overlap ({overlap}) must be smaller than max_size ({max_size})")]
    OverlapTooLarge { overlap: usize, max_size: usize },
}

/// Split points, in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Separator {
    Paragraph,
    Sentence,
    Whitespace,
    Character,
}

const CASCADE: [Separator; 4] = [
    Separator::Paragraph,
    Separator::Sentence,
    Separator::Whitespace,
    Separator::Character,
];

impl Separator {
    /// Cut `range` into pieces that tile it exactly
    ///
    /// The separator stays attached to the end of the piece it terminates.
    fn split(self, chars: &[char], range: Range<usize>) -> Vec<Range<usize>> {
        let end = range.end;
        let mut pieces = Vec::new();
        let mut start = range.start;
        let mut i = range.start;

        while i < end {
            let cut = match self {
                Separator::Paragraph => {
                    (chars[i] == '\n' && i + 1 < end && chars[i + 1] == '\n').then_some(i + 2)
                }
                Separator::Sentence => (matches!(chars[i], '.' | '!' | '?')
                    && i + 1 < end
                    && chars[i + 1].is_whitespace())
                .then_some(i + 2),
                Separator::Whitespace => chars[i].is_whitespace().then_some(i + 1),
                Separator::Character => Some(i + 1),
            };

            match cut {
                Some(cut) => {
                    pieces.push(start..cut);
                    start = cut;
                    i = cut;
                }
                None => i += 1,
            }
        }

        if start < end {
            pieces.push(start..end);
        }
        pieces
    }
}

/// Deterministic overlapping chunker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    max_size: usize,
    overlap: usize,
}

impl Chunker {
    /// Create a chunker
    ///
    /// # Arguments
    /// * `max_size` - Maximum chunk length in characters
    /// * `overlap` - Characters shared between consecutive chunks (`< max_size`)
    pub fn new(max_size: usize, overlap: usize) -> Result<Self, ChunkerError> {
        if max_size == 0 {
            return Err(ChunkerError::ZeroMaxSize);
        }
        if overlap >= max_size {
            return Err(ChunkerError::OverlapTooLarge { overlap, max_size });
        }
        Ok(Self { max_size, overlap })
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split one document into chunks
    ///
    /// An empty document yields no chunks. The result is a pure function of
    /// the document and the chunker parameters.
    pub fn split(&self, document: &Document) -> Vec<Chunk> {
        let chars: Vec<char> = document.text.chars().collect();
        if chars.is_empty() {
            return Vec::new();
        }

        let mut segments = Vec::new();
        self.cascade(&chars, 0..chars.len(), 0, &mut segments);
        self.attach_overlap(document, &chars, &segments)
    }

    /// Split a batch of documents, preserving document order
    pub fn split_all(&self, documents: &[Document]) -> Vec<Chunk> {
        documents.iter().flat_map(|doc| self.split(doc)).collect()
    }

    /// Budget for the segment that will be placed next
    fn budget(&self, placed: &[Range<usize>]) -> usize {
        if placed.is_empty() {
            self.max_size
        } else {
            self.max_size - self.overlap
        }
    }

    fn cascade(
        &self,
        chars: &[char],
        range: Range<usize>,
        level: usize,
        segments: &mut Vec<Range<usize>>,
    ) {
        let separator = CASCADE[level];
        let mut pending: Vec<Range<usize>> = Vec::new();

        for piece in separator.split(chars, range) {
            let limit = if pending.is_empty() {
                self.budget(segments)
            } else {
                self.max_size - self.overlap
            };

            if piece.len() <= limit {
                pending.push(piece);
                continue;
            }

            // Single characters always fit, so this never runs past the last level
            debug_assert!(separator != Separator::Character);
            self.merge(&mut pending, segments);
            self.cascade(chars, piece, level + 1, segments);
        }

        self.merge(&mut pending, segments);
    }

    /// Greedily join adjacent pending pieces into segments
    fn merge(&self, pending: &mut Vec<Range<usize>>, segments: &mut Vec<Range<usize>>) {
        let mut current: Option<Range<usize>> = None;

        for piece in pending.drain(..) {
            current = match current {
                Some(cur) if cur.len() + piece.len() <= self.budget(segments) => {
                    Some(cur.start..piece.end)
                }
                Some(cur) => {
                    segments.push(cur);
                    Some(piece)
                }
                None => Some(piece),
            };
        }

        if let Some(cur) = current {
            segments.push(cur);
        }
    }

    fn attach_overlap(
        &self,
        document: &Document,
        chars: &[char],
        segments: &[Range<usize>],
    ) -> Vec<Chunk> {
        let mut chunks: Vec<Chunk> = Vec::with_capacity(segments.len());

        for segment in segments {
            // Never reach back past the start of the previous chunk
            let start = match chunks.last() {
                Some(prev) => segment
                    .start
                    .saturating_sub(self.overlap)
                    .max(prev.start_offset),
                None => segment.start,
            };

            chunks.push(Chunk {
                source_id: document.source_id.clone(),
                ordinal: document.ordinal,
                start_offset: start,
                end_offset: segment.end,
                text: chars[start..segment.end].iter().collect(),
            });
        }

        chunks
    }
}
