//! Extraction of the structured self-explanation block from an assistant
//! reply. The backend hands the block over as free text; the markers inside
//! it have drifted across prompt revisions, so parsing is best-effort and
//! never fails.

use regex::Regex;

/// Sentinel shown for a field whose marker was missing from the text.
pub const NOT_AVAILABLE: &str = "Not available.";

/// The {sources, reasoning, confidence} triple pulled out of an assistant's
/// analysis text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Analysis {
    pub used_sentences: String,
    pub reasoning: String,
    pub confidence: String,
}

/// One recognized set of marker phrases delimiting the three analysis fields.
///
/// Each field's value runs from its marker to the next marker or the end of
/// the text, whichever comes first.
pub struct MarkerSet {
    used_sentences: Regex,
    reasoning: Regex,
    confidence: Regex,
}

impl MarkerSet {
    /// Prose markers, as requested by the default system prompt.
    pub fn plain() -> Self {
        Self {
            used_sentences: field_pattern(
                r"I used the following sentence from the context:",
                Some(r"My reasoning process is as follows:"),
            ),
            reasoning: field_pattern(
                r"My reasoning process is as follows:",
                Some(r"Confidence Level:"),
            ),
            confidence: field_pattern(r"Confidence Level:", None),
        }
    }

    /// Numbered markdown-bold markers, emitted by some model revisions.
    pub fn numbered() -> Self {
        Self {
            used_sentences: field_pattern(
                r"1\.\s*\*\*Sentences used:\*\*",
                Some(r"2\.\s*\*\*Reasoning:\*\*"),
            ),
            reasoning: field_pattern(
                r"2\.\s*\*\*Reasoning:\*\*",
                Some(r"3\.\s*\*\*Confidence Level:\*\*"),
            ),
            confidence: field_pattern(r"3\.\s*\*\*Confidence Level:\*\*", None),
        }
    }

    /// Extract an Analysis from `text`, substituting the sentinel for any
    /// field whose marker is absent.
    pub fn parse(&self, text: &str) -> Analysis {
        self.extract(text).1
    }

    /// Returns how many markers matched alongside the parsed fields.
    fn extract(&self, text: &str) -> (usize, Analysis) {
        let used_sentences = capture_field(&self.used_sentences, text);
        let reasoning = capture_field(&self.reasoning, text);
        let confidence = capture_field(&self.confidence, text);

        let matched = [&used_sentences, &reasoning, &confidence]
            .iter()
            .filter(|f| f.is_some())
            .count();

        let analysis = Analysis {
            used_sentences: used_sentences.unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            reasoning: reasoning.unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            confidence: confidence.unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        };

        (matched, analysis)
    }
}

impl Analysis {
    /// Parse `text` against the recognized marker sets, keeping whichever
    /// matched the most fields. Total: any input yields an Analysis, with
    /// unmatched fields set to the sentinel.
    pub fn parse(text: &str) -> Self {
        let (plain_matched, plain) = MarkerSet::plain().extract(text);
        let (numbered_matched, numbered) = MarkerSet::numbered().extract(text);

        if numbered_matched > plain_matched {
            numbered
        } else {
            plain
        }
    }
}

/// Build the regex for one field: the marker, then a lazy capture running to
/// the next marker or end of input.
fn field_pattern(marker: &str, next_marker: Option<&str>) -> Regex {
    let pattern = match next_marker {
        Some(next) => format!(r"(?s){}\s*(.*?)\s*(?:{}|$)", marker, next),
        None => format!(r"(?s){}\s*(.*)", marker),
    };
    Regex::new(&pattern).expect("marker patterns are fixed and valid")
}

fn capture_field(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .map(|caps| clean(caps.get(1).map_or("", |m| m.as_str())))
}

/// Strip emphasis asterisks the model sometimes leaves around field values.
fn clean(text: &str) -> String {
    text.replace('*', "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_markers() {
        let text = "I used the following sentence from the context: Cooked vegetables are allowed. \
                    My reasoning process is as follows: Direct match. \
                    Confidence Level: High";
        let analysis = Analysis::parse(text);
        assert_eq!(analysis.used_sentences, "Cooked vegetables are allowed.");
        assert_eq!(analysis.reasoning, "Direct match.");
        assert_eq!(analysis.confidence, "High");
    }

    #[test]
    fn test_parse_plain_markers_multiline() {
        let text = "I used the following sentence from the context:\n\
                    Fermented dairy is introduced in stage two.\n\
                    My reasoning process is as follows:\n\
                    The question asks about yogurt, which is fermented dairy.\n\
                    Confidence Level:\nMedium";
        let analysis = Analysis::parse(text);
        assert_eq!(
            analysis.used_sentences,
            "Fermented dairy is introduced in stage two."
        );
        assert_eq!(
            analysis.reasoning,
            "The question asks about yogurt, which is fermented dairy."
        );
        assert_eq!(analysis.confidence, "Medium");
    }

    #[test]
    fn test_parse_numbered_markers() {
        let text = "1. **Sentences used:** Grains are excluded on SCD.\n\
                    2. **Reasoning:** Bread is made from grain.\n\
                    3. **Confidence Level:** High";
        let analysis = Analysis::parse(text);
        assert_eq!(analysis.used_sentences, "Grains are excluded on SCD.");
        assert_eq!(analysis.reasoning, "Bread is made from grain.");
        assert_eq!(analysis.confidence, "High");
    }

    #[test]
    fn test_parse_strips_emphasis_artifacts() {
        let text = "1. **Sentences used:** *Honey is permitted.*\n\
                    2. **Reasoning:** **Stated verbatim.**\n\
                    3. **Confidence Level:** **High**";
        let analysis = Analysis::parse(text);
        assert_eq!(analysis.used_sentences, "Honey is permitted.");
        assert_eq!(analysis.reasoning, "Stated verbatim.");
        assert_eq!(analysis.confidence, "High");
    }

    #[test]
    fn test_parse_empty_input() {
        let analysis = Analysis::parse("");
        assert_eq!(analysis.used_sentences, NOT_AVAILABLE);
        assert_eq!(analysis.reasoning, NOT_AVAILABLE);
        assert_eq!(analysis.confidence, NOT_AVAILABLE);
    }

    #[test]
    fn test_parse_no_markers() {
        let analysis = Analysis::parse("The model forgot to think out loud today.");
        assert_eq!(analysis.used_sentences, NOT_AVAILABLE);
        assert_eq!(analysis.reasoning, NOT_AVAILABLE);
        assert_eq!(analysis.confidence, NOT_AVAILABLE);
    }

    #[test]
    fn test_parse_single_marker() {
        let analysis = Analysis::parse("Confidence Level: Low");
        assert_eq!(analysis.used_sentences, NOT_AVAILABLE);
        assert_eq!(analysis.reasoning, NOT_AVAILABLE);
        assert_eq!(analysis.confidence, "Low");
    }

    #[test]
    fn test_parse_missing_middle_marker() {
        let text = "I used the following sentence from the context: Eggs are allowed. \
                    Confidence Level: Medium";
        let analysis = Analysis::parse(text);
        assert_eq!(analysis.used_sentences, "Eggs are allowed.");
        assert_eq!(analysis.reasoning, NOT_AVAILABLE);
        assert_eq!(analysis.confidence, "Medium");
    }

    #[test]
    fn test_numbered_wins_over_partial_plain_match() {
        // "Confidence Level:" appears inside the numbered marker, so the plain
        // set matches one field where the numbered set matches all three.
        let text = "1. **Sentences used:** Legumes are avoided during elimination.\n\
                    2. **Reasoning:** Lentils are legumes.\n\
                    3. **Confidence Level:** High";
        let analysis = Analysis::parse(text);
        assert_eq!(
            analysis.used_sentences,
            "Legumes are avoided during elimination."
        );
        assert_eq!(analysis.reasoning, "Lentils are legumes.");
        assert_eq!(analysis.confidence, "High");
    }

    #[test]
    fn test_round_trip_arbitrary_fields() {
        let cases = [
            ("X", "Y", "Z"),
            ("two sentences. right here.", "because so", "Low"),
            ("  padded  ", "\nnewlined\n", "High "),
        ];
        for (x, y, z) in cases {
            let text = format!(
                "I used the following sentence from the context: {} \
                 My reasoning process is as follows: {} \
                 Confidence Level: {}",
                x, y, z
            );
            let analysis = Analysis::parse(&text);
            assert_eq!(analysis.used_sentences, x.trim());
            assert_eq!(analysis.reasoning, y.trim());
            assert_eq!(analysis.confidence, z.trim());
        }
    }

    #[test]
    fn test_marker_set_parse_is_total() {
        let markers = MarkerSet::plain();
        let analysis = markers.parse("My reasoning process is as follows: guesswork");
        assert_eq!(analysis.used_sentences, NOT_AVAILABLE);
        assert_eq!(analysis.reasoning, "guesswork");
        assert_eq!(analysis.confidence, NOT_AVAILABLE);
    }
}
