/// Prompt template with `{context}` and `{question}` slots
use thiserror::Error;

pub const CONTEXT_SLOT: &str = "{context}";
pub const QUESTION_SLOT: &str = "{question}";

pub const DEFAULT_TEMPLATE: &str = "Answer the question based only on the following context:\n{context}\n\nQuestion: {question}\n\nAnswer:";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PromptError {
    #[error("Prompt template is missing the {0} placeholder")]
    MissingPlaceholder(&'static str),

    #[error("Prompt template contains {0} more than once")]
    DuplicatePlaceholder(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Context,
    Question,
}

/// Template parsed once into literal and slot segments
///
/// Rendering fills slots in a single pass, so braces inside the context or
/// question are copied verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    segments: Vec<Segment>,
}

impl PromptTemplate {
    pub fn parse(template: &str) -> Result<Self, PromptError> {
        let mut segments = Vec::new();
        let mut contexts = 0;
        let mut questions = 0;
        let mut rest = template;

        loop {
            let next = [
                (CONTEXT_SLOT, Segment::Context),
                (QUESTION_SLOT, Segment::Question),
            ]
            .into_iter()
            .filter_map(|(slot, segment)| rest.find(slot).map(|pos| (pos, slot, segment)))
            .min_by_key(|(pos, _, _)| *pos);

            let Some((pos, slot, segment)) = next else {
                if !rest.is_empty() {
                    segments.push(Segment::Literal(rest.to_string()));
                }
                break;
            };

            if pos > 0 {
                segments.push(Segment::Literal(rest[..pos].to_string()));
            }
            match segment {
                Segment::Context => contexts += 1,
                Segment::Question => questions += 1,
                Segment::Literal(_) => {}
            }
            segments.push(segment);
            rest = &rest[pos + slot.len()..];
        }

        for (slot, count) in [(CONTEXT_SLOT, contexts), (QUESTION_SLOT, questions)] {
            match count {
                0 => return Err(PromptError::MissingPlaceholder(slot)),
                1 => {}
                _ => return Err(PromptError::DuplicatePlaceholder(slot)),
            }
        }

        Ok(Self { segments })
    }

    pub fn render(&self, context: &str, question: &str) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Context => out.push_str(context),
                Segment::Question => out.push_str(question),
            }
        }
        out
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            segments: vec![
                Segment::Literal(
                    "Answer the question based only on the following context:\n".to_string(),
                ),
                Segment::Context,
                Segment::Literal("\n\nQuestion: ".to_string()),
                Segment::Question,
                Segment::Literal("\n\nAnswer:".to_string()),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_parsed_default() {
        assert_eq!(PromptTemplate::parse(DEFAULT_TEMPLATE).unwrap(), PromptTemplate::default());
    }

    #[test]
    fn test_render() {
        let template = PromptTemplate::default();
        let prompt = template.render("Paris is the capital.", "What is the capital?");
        assert_eq!(
            prompt,
            "Answer the question based only on the following context:\nParis is the capital.\n\nQuestion: What is the capital?\n\nAnswer:"
        );
    }

    #[test]
    fn test_single_pass_substitution() {
        let template = PromptTemplate::parse("C: {context} Q: {question}").unwrap();
        let prompt = template.render("see {question} and {context}", "why {context}?");
        assert_eq!(prompt, "C: see {question} and {context} Q: why {context}?");
    }

    #[test]
    fn test_question_before_context() {
        let template = PromptTemplate::parse("{question}|{context}").unwrap();
        assert_eq!(template.render("c", "q"), "q|c");
    }

    #[test]
    fn test_rejects_bad_templates() {
        assert_eq!(
            PromptTemplate::parse("Question: {question}"),
            Err(PromptError::MissingPlaceholder(CONTEXT_SLOT))
        );
        assert_eq!(
            PromptTemplate::parse("{context}"),
            Err(PromptError::MissingPlaceholder(QUESTION_SLOT))
        );
        assert_eq!(
            PromptTemplate::parse("{context}{question}{context}"),
            Err(PromptError::DuplicatePlaceholder(CONTEXT_SLOT))
        );
    }
}
