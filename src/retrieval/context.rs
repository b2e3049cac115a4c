/// Context assembly: retrieved chunks into one prompt block
use super::{Provenance, ScoredChunk};

/// Context text plus one citation per contributing chunk, in the same order
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledContext {
    pub text: String,
    pub citations: Vec<Provenance>,
}

/// Join chunk texts in relevance order with `delimiter`
pub fn assemble_context(chunks: &[ScoredChunk], delimiter: &str) -> AssembledContext {
    let text = chunks
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join(delimiter);

    AssembledContext {
        text,
        citations: chunks.iter().map(|c| c.provenance.clone()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(text: &str, source: &str) -> ScoredChunk {
        ScoredChunk {
            entry_id: 0,
            text: text.to_string(),
            score: 1.0,
            provenance: Provenance {
                source_id: source.to_string(),
                ordinal: 0,
                start_offset: 0,
                end_offset: text.len(),
            },
        }
    }

    #[test]
    fn test_joins_in_order() {
        let chunks = vec![chunk("first", "a.md"), chunk("second", "b.md"), chunk("third", "a.md")];
        let ctx = assemble_context(&chunks, "\n\n");
        assert_eq!(ctx.text, "first\n\nsecond\n\nthird");
        let sources: Vec<&str> = ctx.citations.iter().map(|p| p.source_id.as_str()).collect();
        assert_eq!(sources, vec!["a.md", "b.md", "a.md"]);
    }

    #[test]
    fn test_empty() {
        let ctx = assemble_context(&[], "\n\n");
        assert!(ctx.text.is_empty());
        assert!(ctx.citations.is_empty());
    }
}
