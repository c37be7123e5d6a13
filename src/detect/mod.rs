//! Question detection over transcript text.
//!
//! [`QuestionDetector`] is a deterministic, stateless classifier: the same
//! input always produces the same [`Detection`].  Whether a piece of text is
//! a question is decided by five ordered regex probes; the question *type*
//! (behavioral / technical / general) comes from configurable keyword lists,
//! checked behavioral-first.
//!
//! # Example
//!
//! ```rust
//! use interview_copilot::config::DetectorConfig;
//! use interview_copilot::detect::{QuestionDetector, QuestionKind};
//!
//! let detector = QuestionDetector::new(&DetectorConfig::default()).unwrap();
//! let d = detector.classify("How does the system handle failover?");
//! assert!(d.is_question);
//! assert_eq!(d.kind, Some(QuestionKind::Technical));
//! ```

use regex::Regex;

use crate::config::DetectorConfig;

// ---------------------------------------------------------------------------
// Detection types
// ---------------------------------------------------------------------------

/// Category of a detected question, used to pick prompt instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionKind {
    /// Experience / situation questions ("tell me about a time …").
    Behavioral,
    /// Implementation / design questions ("how does …", "explain …").
    Technical,
    /// Anything else that still reads as a question.
    General,
}

impl QuestionKind {
    /// Stable lowercase tag used in events and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Behavioral => "behavioral",
            Self::Technical => "technical",
            Self::General => "general",
        }
    }
}

/// Classification result for one piece of transcript text.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// Whether the text reads as a question.
    pub is_question: bool,
    /// `min(match_count / 2, 1.0)` when a question, `0.0` otherwise.
    pub confidence: f32,
    /// Question category; `None` when not a question.
    pub kind: Option<QuestionKind>,
}

impl Detection {
    fn not_a_question() -> Self {
        Self {
            is_question: false,
            confidence: 0.0,
            kind: None,
        }
    }
}

/// One transcript segment with an optional speaker label, as consumed by
/// [`QuestionDetector::extract_questions`].
#[derive(Debug, Clone)]
pub struct SpokenSegment {
    /// Speaker label when the transcript carries one.
    pub speaker: Option<String>,
    /// Segment text.
    pub text: String,
}

// ---------------------------------------------------------------------------
// QuestionDetector
// ---------------------------------------------------------------------------

/// Minimum trimmed length, in characters, for text to be considered at all.
const MIN_TEXT_LEN: usize = 5;

/// Stateless question classifier.
pub struct QuestionDetector {
    /// Ordered probes; each contributes at most 1 to the match count.
    probes: Vec<Regex>,
    /// Detects a trailing question mark (also probe #5).
    trailing_mark: Regex,
    behavioral_keywords: Vec<String>,
    technical_keywords: Vec<String>,
}

impl QuestionDetector {
    /// Compile the probes and lowercase the keyword lists.
    pub fn new(config: &DetectorConfig) -> Result<Self, regex::Error> {
        let patterns = [
            r"\b(what|when|where|who|why|how|which)\b",
            r"\b(tell me|describe|explain|discuss|talk about)\b",
            r"\b(can you|could you|would you|will you)\b",
            r"\b(do you|did you|have you|are you|were you)\b",
            r"\?\s*$",
        ];
        let probes = patterns
            .iter()
            .map(|p| Regex::new(p))
            .collect::<Result<Vec<_>, _>>()?;
        let trailing_mark = Regex::new(r"\?\s*$")?;

        Ok(Self {
            probes,
            trailing_mark,
            behavioral_keywords: config
                .behavioral_keywords
                .iter()
                .map(|k| k.to_lowercase())
                .collect(),
            technical_keywords: config
                .technical_keywords
                .iter()
                .map(|k| k.to_lowercase())
                .collect(),
        })
    }

    /// Classify one piece of transcript text.
    pub fn classify(&self, text: &str) -> Detection {
        let trimmed = text.trim();
        if trimmed.chars().count() < MIN_TEXT_LEN {
            return Detection::not_a_question();
        }

        let lower = trimmed.to_lowercase();

        let match_count = self
            .probes
            .iter()
            .filter(|probe| probe.is_match(&lower))
            .count();

        let is_question = match_count >= 1 || self.trailing_mark.is_match(trimmed);
        if !is_question {
            return Detection::not_a_question();
        }

        let confidence = (match_count as f32 / 2.0).min(1.0);

        Detection {
            is_question: true,
            confidence,
            kind: Some(self.kind_of(&lower)),
        }
    }

    /// Keyword containment, behavioral list first; first hit wins.
    fn kind_of(&self, lower: &str) -> QuestionKind {
        if self.behavioral_keywords.iter().any(|k| lower.contains(k)) {
            return QuestionKind::Behavioral;
        }
        if self.technical_keywords.iter().any(|k| lower.contains(k)) {
            return QuestionKind::Technical;
        }
        QuestionKind::General
    }

    /// Scan transcript segments and return the ones that classify as
    /// questions, skipping anything spoken by the candidate themselves.
    ///
    /// Unlabeled segments are kept: the loopback capture path performs no
    /// diarization, so most segments arrive without a speaker and dropping
    /// them would drop every question heard over system audio.
    pub fn extract_questions(&self, segments: &[SpokenSegment]) -> Vec<String> {
        segments
            .iter()
            .filter(|s| s.speaker.as_deref() != Some("candidate"))
            .filter(|s| self.classify(&s.text).is_question)
            .map(|s| s.text.clone())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> QuestionDetector {
        QuestionDetector::new(&DetectorConfig::default()).expect("probes compile")
    }

    // ---- question / not-question rules ------------------------------------

    #[test]
    fn short_text_is_never_a_question() {
        let d = detector();
        for text in ["", "hi", "ok?", "    a?   "] {
            let det = d.classify(text);
            assert!(!det.is_question, "should reject: {text:?}");
            assert_eq!(det.confidence, 0.0);
            assert_eq!(det.kind, None);
        }
    }

    #[test]
    fn short_text_guard_counts_characters_not_bytes() {
        let d = detector();
        // 4 characters but 7 bytes in UTF-8.
        let det = d.classify("что?");
        assert!(!det.is_question);
        assert_eq!(det.kind, None);
    }

    #[test]
    fn statement_is_not_a_question() {
        let det = detector().classify("I worked at a bank for three years.");
        assert!(!det.is_question);
        assert_eq!(det.kind, None);
    }

    #[test]
    fn trailing_question_mark_alone_is_enough() {
        let det = detector().classify("Pizza for lunch?");
        assert!(det.is_question);
        // Single probe hit (trailing mark) → confidence 0.5.
        assert!((det.confidence - 0.5).abs() < 1e-6);
        assert_eq!(det.kind, Some(QuestionKind::General));
    }

    #[test]
    fn interrogative_without_question_mark_is_a_question() {
        let det = detector().classify("What motivates you in your work");
        assert!(det.is_question);
    }

    // ---- confidence --------------------------------------------------------

    #[test]
    fn confidence_scales_with_probe_hits() {
        let d = detector();

        // "what" only → 1 hit → 0.5
        let one = d.classify("what drives the roadmap");
        assert!((one.confidence - 0.5).abs() < 1e-6);

        // "could you" + "describe" + trailing "?" → 3 hits → capped at 1.0
        let three = d.classify("Could you describe your deployment process?");
        assert!((three.confidence - 1.0).abs() < 1e-6);
    }

    #[test]
    fn each_probe_counts_at_most_once() {
        // Two interrogatives hit the same probe → still a single hit.
        let det = detector().classify("what happens and why does it happen");
        assert!(det.is_question);
        assert!((det.confidence - 0.5).abs() < 1e-6);
    }

    // ---- question kind ------------------------------------------------------

    #[test]
    fn technical_question_via_how_does() {
        let det = detector().classify("How does the system handle failover?");
        assert!(det.is_question);
        assert_eq!(det.kind, Some(QuestionKind::Technical));
    }

    #[test]
    fn behavioral_question_via_tell_me_about_a_time() {
        let det = detector().classify("Tell me about a time you faced conflict");
        assert!(det.is_question);
        assert_eq!(det.kind, Some(QuestionKind::Behavioral));
    }

    #[test]
    fn behavioral_wins_over_technical() {
        // Contains both "team" (behavioral) and "code" (technical).
        let det = detector().classify("Describe how your team reviews code?");
        assert_eq!(det.kind, Some(QuestionKind::Behavioral));
    }

    #[test]
    fn general_when_no_keywords_match() {
        let det = detector().classify("Where do you see yourself in five years?");
        assert_eq!(det.kind, Some(QuestionKind::General));
    }

    #[test]
    fn keyword_lists_come_from_configuration() {
        let config = DetectorConfig {
            behavioral_keywords: vec![],
            technical_keywords: vec!["failover".into()],
        };
        let d = QuestionDetector::new(&config).expect("probes compile");
        let det = d.classify("Can you survive a failover event?");
        assert_eq!(det.kind, Some(QuestionKind::Technical));
    }

    // ---- determinism --------------------------------------------------------

    #[test]
    fn classify_is_idempotent() {
        let d = detector();
        let text = "Could you explain your approach to database migrations?";
        let first = d.classify(text);
        let second = d.classify(text);
        assert_eq!(first, second);
    }

    // ---- extract_questions ---------------------------------------------------

    #[test]
    fn extract_questions_filters_speaker_and_statements() {
        let d = detector();
        let segments = vec![
            SpokenSegment {
                speaker: Some("interviewer".into()),
                text: "What is your greatest strength?".into(),
            },
            SpokenSegment {
                speaker: Some("candidate".into()),
                text: "Why do I even ask myself this?".into(),
            },
            SpokenSegment {
                speaker: None,
                text: "Thanks for joining today.".into(),
            },
        ];
        let questions = d.extract_questions(&segments);
        assert_eq!(questions, vec!["What is your greatest strength?"]);
    }

    #[test]
    fn extract_questions_keeps_unlabeled_questions() {
        // Capture produces no speaker labels; those segments must survive.
        let d = detector();
        let segments = vec![
            SpokenSegment {
                speaker: None,
                text: "How would you scale this service?".into(),
            },
            SpokenSegment {
                speaker: Some("candidate".into()),
                text: "Should I start with the cache?".into(),
            },
        ];
        let questions = d.extract_questions(&segments);
        assert_eq!(questions, vec!["How would you scale this service?"]);
    }

    #[test]
    fn kind_tags_are_stable() {
        assert_eq!(QuestionKind::Behavioral.as_str(), "behavioral");
        assert_eq!(QuestionKind::Technical.as_str(), "technical");
        assert_eq!(QuestionKind::General.as_str(), "general");
    }
}
