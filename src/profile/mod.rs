//! Candidate profile — the knowledge base answers are generated from.
//!
//! A profile is a declarative JSON document selected by name from the
//! profiles directory: resume, target job description, speaking persona,
//! expertise rules (keyword → background bullets) and the canned fallback
//! answer.  Profiles are validated on load; a profile that fails validation
//! is rejected outright rather than producing half-empty prompts.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::AppPaths;

// ---------------------------------------------------------------------------
// Profile data
// ---------------------------------------------------------------------------

/// One prior role on the resume.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Experience {
    pub role: String,
    pub company: String,
    #[serde(default)]
    pub duration: String,
    #[serde(default)]
    pub description: String,
}

/// One project on the resume.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Resume section of a profile.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Resume {
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub experience: Vec<Experience>,
    #[serde(default)]
    pub projects: Vec<Project>,
}

/// Target job description section of a profile.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobDescription {
    #[serde(default)]
    pub company_name: String,
    #[serde(default)]
    pub role_name: String,
    #[serde(default)]
    pub required_skills: Vec<String>,
    #[serde(default)]
    pub responsibilities: Vec<String>,
}

/// Speaking persona the answers are written as.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Persona {
    pub name: String,
    pub role: String,
    #[serde(default)]
    pub experience_years: u32,
}

/// One expertise rule: when any keyword appears in the question, the rule's
/// bullets become candidate background material for the prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpertiseRule {
    pub keywords: Vec<String>,
    pub bullets: Vec<String>,
}

/// A complete candidate profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub persona: Persona,
    #[serde(default)]
    pub resume: Resume,
    #[serde(default)]
    pub job: JobDescription,
    #[serde(default)]
    pub expertise: Vec<ExpertiseRule>,
    /// Answer shown when generation is fully unavailable.
    #[serde(default = "default_fallback_answer")]
    pub fallback_answer: String,
}

fn default_fallback_answer() -> String {
    "I have relevant experience with this. Let me elaborate on how I have \
     approached it in my previous roles."
        .to_string()
}

// ---------------------------------------------------------------------------
// ProfileError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("profile not found: {0}")]
    NotFound(String),

    #[error("failed to read profile: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse profile JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid profile: {0}")]
    Invalid(String),
}

// ---------------------------------------------------------------------------
// Loading & validation
// ---------------------------------------------------------------------------

/// Character cap applied to experience descriptions in summaries.
const EXPERIENCE_DESC_CAP: usize = 200;
/// Character cap applied to project descriptions in summaries.
const PROJECT_DESC_CAP: usize = 150;
/// Character cap applied to the whole job-description excerpt in prompts.
pub const JOB_EXCERPT_CAP: usize = 300;
/// Maximum expertise bullets fed into a prompt.
pub const MAX_EXPERTISE_BULLETS: usize = 6;

impl Profile {
    /// Load `<name>.json` from the platform profiles directory.
    pub fn load(name: &str) -> Result<Self, ProfileError> {
        let path = AppPaths::new().profiles_dir.join(format!("{name}.json"));
        if !path.exists() {
            return Err(ProfileError::NotFound(path.display().to_string()));
        }
        Self::load_from(&path)
    }

    /// Load and validate a profile from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self, ProfileError> {
        let content = std::fs::read_to_string(path)?;
        let profile: Self = serde_json::from_str(&content)?;
        profile.validate()?;
        Ok(profile)
    }

    /// Placeholder profile written on first run so the app starts before the
    /// user has filled in their own details.
    pub fn starter() -> Self {
        Self {
            persona: Persona {
                name: "Candidate".into(),
                role: "Software Engineer".into(),
                experience_years: 5,
            },
            resume: Resume::default(),
            job: JobDescription::default(),
            expertise: Vec::new(),
            fallback_answer: default_fallback_answer(),
        }
    }

    /// Save a profile to an explicit path (pretty-printed JSON).
    pub fn save_to(&self, path: &Path) -> Result<(), ProfileError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn validate(&self) -> Result<(), ProfileError> {
        if self.persona.name.trim().is_empty() {
            return Err(ProfileError::Invalid("persona.name is empty".into()));
        }
        if self.persona.role.trim().is_empty() {
            return Err(ProfileError::Invalid("persona.role is empty".into()));
        }
        for (i, rule) in self.expertise.iter().enumerate() {
            if rule.keywords.is_empty() {
                return Err(ProfileError::Invalid(format!(
                    "expertise rule {i} has no keywords"
                )));
            }
            if rule.bullets.is_empty() {
                return Err(ProfileError::Invalid(format!(
                    "expertise rule {i} has no bullets"
                )));
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Context extraction
    // -----------------------------------------------------------------------

    /// Compact resume summary for prompts: top 10 skills, top 2 experiences
    /// (descriptions capped at 200 chars), top 2 projects (capped at 150).
    pub fn resume_summary(&self) -> String {
        let mut out = String::new();

        if !self.resume.skills.is_empty() {
            let skills: Vec<&str> = self
                .resume
                .skills
                .iter()
                .take(10)
                .map(String::as_str)
                .collect();
            out.push_str(&format!("Skills: {}\n", skills.join(", ")));
        }

        for exp in self.resume.experience.iter().take(2) {
            out.push_str(&format!(
                "- {} at {} ({}): {}\n",
                exp.role,
                exp.company,
                exp.duration,
                truncate(&exp.description, EXPERIENCE_DESC_CAP)
            ));
        }

        for project in self.resume.projects.iter().take(2) {
            out.push_str(&format!(
                "- Project {}: {}\n",
                project.name,
                truncate(&project.description, PROJECT_DESC_CAP)
            ));
        }

        out.trim_end().to_string()
    }

    /// Compact job summary: role/company line, top 8 required skills, top 3
    /// responsibilities.
    pub fn job_summary(&self) -> String {
        let mut out = String::new();

        if !self.job.role_name.is_empty() || !self.job.company_name.is_empty() {
            out.push_str(&format!(
                "Target role: {} at {}\n",
                self.job.role_name, self.job.company_name
            ));
        }

        if !self.job.required_skills.is_empty() {
            let skills: Vec<&str> = self
                .job
                .required_skills
                .iter()
                .take(8)
                .map(String::as_str)
                .collect();
            out.push_str(&format!("Required: {}\n", skills.join(", ")));
        }

        for resp in self.job.responsibilities.iter().take(3) {
            out.push_str(&format!("- {resp}\n"));
        }

        out.trim_end().to_string()
    }

    /// Job-description excerpt capped for prompt inclusion.
    pub fn job_excerpt(&self) -> String {
        truncate(&self.job_summary(), JOB_EXCERPT_CAP)
    }

    /// Expertise bullets whose rule keywords appear in `question`
    /// (case-insensitive), capped at [`MAX_EXPERTISE_BULLETS`].
    pub fn relevant_expertise(&self, question: &str) -> Vec<String> {
        let lower = question.to_lowercase();
        let mut bullets = Vec::new();
        for rule in &self.expertise {
            if rule
                .keywords
                .iter()
                .any(|k| lower.contains(&k.to_lowercase()))
            {
                for bullet in &rule.bullets {
                    if bullets.len() >= MAX_EXPERTISE_BULLETS {
                        return bullets;
                    }
                    bullets.push(bullet.clone());
                }
            }
        }
        bullets
    }

    /// All context text used for answer-confidence scoring.
    pub fn context_text(&self) -> String {
        format!("{}\n{}", self.resume_summary(), self.job_summary())
    }
}

fn truncate(text: &str, cap: usize) -> String {
    if text.chars().count() <= cap {
        text.to_string()
    } else {
        text.chars().take(cap).collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
