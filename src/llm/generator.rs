//! Answer generation — ties the prompt builder, the streaming client and
//! the profile's canned fallback together.
//!
//! The generator never surfaces a raw error for a question the user is
//! waiting on: when generation is fully unavailable (both providers failed
//! before producing anything) the profile's canned fallback answer is
//! delivered instead.  A failure after tokens already streamed is terminal
//! and reported as such, with the partial text preserved.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::detect::QuestionKind;
use crate::profile::Profile;
use crate::session::QaPair;

use super::client::StreamingClient;
use super::prompt::PromptBuilder;
use super::provider::{GenError, GenOptions};

// ---------------------------------------------------------------------------
// GeneratedAnswer
// ---------------------------------------------------------------------------

/// How a generation request ended.
#[derive(Debug, Clone, PartialEq)]
pub enum AnswerOutcome {
    /// The stream completed normally.
    Streamed,
    /// The stream was cancelled by the listener; `text` holds what arrived.
    Cancelled,
    /// Generation was unavailable; `text` is the profile's canned answer.
    CannedFallback,
    /// The stream failed after tokens were already delivered; `text` holds
    /// the partial answer.
    Failed(GenError),
}

/// A finished (or abandoned) answer.
#[derive(Debug, Clone)]
pub struct GeneratedAnswer {
    pub text: String,
    /// Word-overlap confidence against the profile context, in [0.5, 0.95].
    pub confidence: f32,
    /// Which context sections fed the prompt ("expertise", "resume", "job",
    /// "history").
    pub context_used: Vec<&'static str>,
    pub outcome: AnswerOutcome,
}

// ---------------------------------------------------------------------------
// AnswerGenerator
// ---------------------------------------------------------------------------

/// Streams personalized answers for detected questions.
pub struct AnswerGenerator {
    client: StreamingClient,
    prompt: PromptBuilder,
    profile: Arc<Profile>,
    opts: GenOptions,
}

impl AnswerGenerator {
    pub fn new(client: StreamingClient, profile: Arc<Profile>, opts: GenOptions) -> Self {
        Self {
            client,
            prompt: PromptBuilder::new(Arc::clone(&profile)),
            profile,
            opts,
        }
    }

    /// Generate an answer for `question`, invoking `on_token` for every
    /// streamed token as it arrives.
    ///
    /// `cancel` is checked once per token by the underlying stream; setting
    /// it ends the answer cleanly with [`AnswerOutcome::Cancelled`].
    pub async fn answer<F>(
        &self,
        question: &str,
        kind: QuestionKind,
        history: &[QaPair],
        cancel: Arc<AtomicBool>,
        mut on_token: F,
    ) -> GeneratedAnswer
    where
        F: FnMut(&str),
    {
        let prompt = self.prompt.build(question, kind, history);
        let mut rx = self
            .client
            .stream_generate(prompt, self.opts.clone(), Arc::clone(&cancel));

        let mut text = String::new();
        let mut error: Option<GenError> = None;

        while let Some(item) = rx.recv().await {
            match item {
                Ok(token) => {
                    on_token(&token);
                    text.push_str(&token);
                }
                Err(err) => {
                    error = Some(err);
                    break;
                }
            }
        }

        let outcome = match error {
            None if cancel.load(Ordering::SeqCst) => AnswerOutcome::Cancelled,
            None => AnswerOutcome::Streamed,
            Some(err) if text.is_empty() => {
                // The user never sees a raw provider error for an unanswered
                // question; the canned profile answer stands in.
                log::warn!("generation unavailable ({err}), using canned answer");
                text = self.profile.fallback_answer.clone();
                on_token(&text);
                AnswerOutcome::CannedFallback
            }
            Some(err) => AnswerOutcome::Failed(err),
        };

        let confidence = answer_confidence(&text, &self.profile.context_text());
        let context_used = self.context_sections(question, history);

        GeneratedAnswer {
            text: text.trim().to_string(),
            confidence,
            context_used,
            outcome,
        }
    }

    /// Names of the profile/session sections the prompt drew on.
    fn context_sections(&self, question: &str, history: &[QaPair]) -> Vec<&'static str> {
        let mut sections = Vec::new();
        if !self.profile.relevant_expertise(question).is_empty() {
            sections.push("expertise");
        }
        if !self.profile.resume_summary().is_empty() {
            sections.push("resume");
        }
        if !self.profile.job_excerpt().is_empty() {
            sections.push("job");
        }
        if !history.is_empty() {
            sections.push("history");
        }
        sections
    }
}

// ---------------------------------------------------------------------------
// Confidence scoring
// ---------------------------------------------------------------------------

/// Ratio of answer words that also appear in the context, clamped to
/// `[0.5, 0.95]` — an answer is never reported as certainly right or
/// certainly wrong.  `0.5` when the answer has no words.
pub fn answer_confidence(answer: &str, context: &str) -> f32 {
    let answer_words: Vec<String> = answer
        .split_whitespace()
        .map(|w| w.to_lowercase())
        .collect();
    if answer_words.is_empty() {
        return 0.5;
    }

    let context_words: HashSet<String> = context
        .split_whitespace()
        .map(|w| w.to_lowercase())
        .collect();

    let overlap = answer_words
        .iter()
        .filter(|w| context_words.contains(*w))
        .count();

    (overlap as f32 / answer_words.len() as f32).clamp(0.5, 0.95)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
