use crate::error::ParserError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const MAX_QUESTION_CHARS: usize = 150;
pub const MAX_ANSWER_CHARS: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriviaAnswer {
    pub text: String,
    pub is_correct: bool,
}

impl TriviaAnswer {
    pub fn new(text: impl Into<String>, is_correct: bool) -> Self {
        Self {
            text: text.into(),
            is_correct,
        }
    }
}

/// Trim the question. An empty result is the "no question" sentinel and is
/// returned as-is; anything else must end with '?' and fit the length limit.
pub fn sanitize_question(raw: &str) -> Result<String, ParserError> {
    let question = raw.trim();
    if question.is_empty() {
        return Ok(String::new());
    }

    if !question.ends_with('?') {
        return Err(ParserError::QuestionMissingMark);
    }

    let len = question.chars().count();
    if len > MAX_QUESTION_CHARS {
        return Err(ParserError::QuestionTooLong {
            len,
            max: MAX_QUESTION_CHARS,
        });
    }

    Ok(question.to_string())
}

/// Trim every answer and enforce non-empty, bounded text. Idempotent.
pub fn sanitize_answers(raw: &[String]) -> Result<Vec<String>, ParserError> {
    raw.iter()
        .enumerate()
        .map(|(index, answer)| {
            let answer = answer.trim();
            if answer.is_empty() {
                return Err(ParserError::EmptyAnswer { index });
            }
            let len = answer.chars().count();
            if len > MAX_ANSWER_CHARS {
                return Err(ParserError::AnswerTooLong {
                    index,
                    len,
                    max: MAX_ANSWER_CHARS,
                });
            }
            Ok(answer.to_string())
        })
        .collect()
}

/// Exact count and case-insensitive uniqueness
pub fn validate_answer_set(answers: &[String], expected: usize) -> Result<(), ParserError> {
    if answers.len() != expected {
        return Err(ParserError::AnswerCount {
            actual: answers.len(),
            expected,
        });
    }

    let mut seen = HashSet::new();
    for answer in answers {
        if !seen.insert(answer.to_lowercase()) {
            return Err(ParserError::DuplicateAnswer(answer.clone()));
        }
    }

    Ok(())
}
