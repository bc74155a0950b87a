use super::difficulty::Tier;
use crate::parser::TriviaAnswer;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// A validated, de-biased question ready for persistence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriviaQuestionDraft {
    pub topic: String,

    /// Difficulty exactly as requested
    pub difficulty: String,

    pub question: String,

    pub answers: Vec<TriviaAnswer>,

    /// Derived from `answers` after shuffling
    pub correct_answer_index: usize,

    pub metadata: DraftMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftMetadata {
    pub tier: Tier,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_difficulty: Option<String>,

    pub provider: String,

    pub model: String,

    pub requested_answers: usize,

    pub answer_count: usize,

    /// Provider attempts including retries
    pub attempts: u32,

    pub validation_summary: String,

    pub fingerprint: String,

    pub request_id: Uuid,

    pub generated_at: DateTime<Utc>,
}

/// Normalize question text for stable fingerprinting
/// Lowercases and collapses whitespace so cosmetic differences hash the same
fn normalize_question(question: &str) -> String {
    question
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Short deterministic hash of the question for downstream de-duplication
pub fn fingerprint(question: &str) -> String {
    let hash = Sha256::digest(normalize_question(question).as_bytes());
    format!("{:x}", hash)[..12].to_string()
}
