//! Prompt construction for answer generation.
//!
//! A prompt is assembled from the candidate profile and the live session:
//! persona header, background bullets matched to the question, resume and
//! job summaries, the last few Q/A pairs (oldest first), and instructions
//! specific to the detected question type.

use std::sync::Arc;

use crate::detect::QuestionKind;
use crate::profile::Profile;
use crate::session::QaPair;

/// Builds generation prompts from a profile.
pub struct PromptBuilder {
    profile: Arc<Profile>,
}

impl PromptBuilder {
    pub fn new(profile: Arc<Profile>) -> Self {
        Self { profile }
    }

    /// Build the full prompt for one question.
    pub fn build(&self, question: &str, kind: QuestionKind, history: &[QaPair]) -> String {
        let persona = &self.profile.persona;
        let mut prompt = format!(
            "You are {}, a {} with {} years of experience, answering live in a \
             job interview. Speak in the first person, naturally and \
             confidently, in 2-4 short paragraphs. Never mention that you are \
             an assistant or that this answer was prepared.\n",
            persona.name, persona.role, persona.experience_years
        );

        let bullets = self.profile.relevant_expertise(question);
        if !bullets.is_empty() {
            prompt.push_str("\nRelevant background:\n");
            for bullet in &bullets {
                prompt.push_str(&format!("- {bullet}\n"));
            }
        }

        let resume = self.profile.resume_summary();
        if !resume.is_empty() {
            prompt.push_str("\nResume:\n");
            prompt.push_str(&resume);
            prompt.push('\n');
        }

        let job = self.profile.job_excerpt();
        if !job.is_empty() {
            prompt.push_str("\nRole being interviewed for:\n");
            prompt.push_str(&job);
            prompt.push('\n');
        }

        if !history.is_empty() {
            prompt.push_str("\nEarlier in this interview:\n");
            for pair in history {
                prompt.push_str(&format!("Q: {}\nA: {}\n", pair.question, pair.answer));
            }
        }

        prompt.push('\n');
        prompt.push_str(kind_instructions(kind));
        prompt.push_str(&format!("\n\nQuestion: {question}\nAnswer:"));

        prompt
    }
}

/// Question-type-specific answering instructions.
fn kind_instructions(kind: QuestionKind) -> &'static str {
    match kind {
        QuestionKind::Behavioral => {
            "This is a behavioral question. Structure the answer as a brief \
             STAR story: the Situation and Task in one sentence, the Actions \
             you took, and the measurable Result. Draw on the background and \
             resume above rather than inventing details."
        }
        QuestionKind::Technical => {
            "This is a technical question. Lead with the direct answer, then \
             explain the key trade-off or design decision with one concrete \
             example from your background. Avoid textbook definitions."
        }
        QuestionKind::General => {
            "Answer directly and conversationally, connecting your background \
             to what the interviewer is asking. Keep it specific to you."
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
