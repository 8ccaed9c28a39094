//! Post-generation memory extraction.
//!
//! After a chat exchange, assistant output that contains a diagnosis or a
//! reported outcome is distilled into a semantic memory: embedded and
//! inserted with full relevance. Detection is heuristic - regex phrases
//! plus explicit markers - and deliberately conservative; storing nothing
//! is better than storing noise.

use std::sync::OnceLock;

use regex::Regex;

use database::MemoryContentType;

/// A segment of assistant output worth remembering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryCandidate {
    pub content: String,
    pub content_type: MemoryContentType,
}

fn diagnosis_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(looks like|appears to be|symptoms? (?:of|suggest)|diagnos\w+|likely (?:has|suffering)|signs? of)\b",
        )
        .expect("static regex compiles")
    })
}

fn outcome_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(recovered|improved|cleared up|new growth|got worse|did not help|worked well)\b")
            .expect("static regex compiles")
    })
}

/// Longest excerpt stored per memory.
const MAX_EXCERPT_CHARS: usize = 500;

/// Scan assistant output for memorable segments.
///
/// Sentences matching the diagnosis heuristics become `diagnosis`
/// memories; outcome phrasing becomes `outcome`. Explicit
/// `[REMEMBER] ...` markers are honored verbatim as `advice`. At most one
/// candidate per category is returned per response.
pub fn extract_memories(assistant_text: &str) -> Vec<MemoryCandidate> {
    let mut candidates = Vec::new();

    // Explicit markers win over heuristics.
    for line in assistant_text.lines() {
        if let Some(rest) = line.trim().strip_prefix("[REMEMBER]") {
            let content = rest.trim();
            if !content.is_empty() {
                candidates.push(MemoryCandidate {
                    content: clip(content),
                    content_type: MemoryContentType::Advice,
                });
            }
        }
    }

    if let Some(sentence) = first_matching_sentence(assistant_text, diagnosis_re()) {
        candidates.push(MemoryCandidate {
            content: clip(&sentence),
            content_type: MemoryContentType::Diagnosis,
        });
    }

    if let Some(sentence) = first_matching_sentence(assistant_text, outcome_re()) {
        candidates.push(MemoryCandidate {
            content: clip(&sentence),
            content_type: MemoryContentType::Outcome,
        });
    }

    candidates
}

fn first_matching_sentence(text: &str, re: &Regex) -> Option<String> {
    text.split_inclusive(['.', '!', '?'])
        .map(str::trim)
        .find(|sentence| !sentence.is_empty() && re.is_match(sentence))
        .map(str::to_string)
}

fn clip(text: &str) -> String {
    if text.chars().count() <= MAX_EXCERPT_CHARS {
        text.to_string()
    } else {
        text.chars().take(MAX_EXCERPT_CHARS).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnosis_sentence_extracted() {
        let text = "Thanks for the photos. This looks like spider mites on the underside. \
                    Rinse the leaves and apply neem oil weekly.";
        let memories = extract_memories(text);

        assert_eq!(memories.len(), 1);
        assert_eq!(memories[0].content_type, MemoryContentType::Diagnosis);
        assert!(memories[0].content.contains("spider mites"));
        // Only the matching sentence, not the whole response.
        assert!(!memories[0].content.contains("neem oil"));
    }

    #[test]
    fn test_outcome_phrase_extracted() {
        let text = "Great news - the fern recovered after you moved it off the radiator!";
        let memories = extract_memories(text);
        assert_eq!(memories.len(), 1);
        assert_eq!(memories[0].content_type, MemoryContentType::Outcome);
    }

    #[test]
    fn test_explicit_marker_extracted() {
        let text = "Sure thing.\n[REMEMBER] The monstera sits two meters from a south window.";
        let memories = extract_memories(text);
        assert_eq!(memories.len(), 1);
        assert_eq!(memories[0].content_type, MemoryContentType::Advice);
        assert_eq!(
            memories[0].content,
            "The monstera sits two meters from a south window."
        );
    }

    #[test]
    fn test_plain_chitchat_extracts_nothing() {
        let text = "Watering once a week sounds fine. Enjoy your weekend!";
        assert!(extract_memories(text).is_empty());
    }

    #[test]
    fn test_diagnosis_and_outcome_both_extracted() {
        let text = "The brown tips appear to be fertilizer burn. \
                    Last month's cutting has new growth, so propagation worked well.";
        let memories = extract_memories(text);
        assert_eq!(memories.len(), 2);
    }

    #[test]
    fn test_long_excerpt_clipped() {
        let long_tail = "x".repeat(1000);
        let text = format!("This looks like root rot {}.", long_tail);
        let memories = extract_memories(&text);
        assert_eq!(memories[0].content.chars().count(), MAX_EXCERPT_CHARS);
    }
}
