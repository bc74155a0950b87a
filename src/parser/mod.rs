mod answer;
mod json;

pub use answer::{
    sanitize_answers, sanitize_question, TriviaAnswer, MAX_ANSWER_CHARS, MAX_QUESTION_CHARS,
};

use crate::error::ParserError;
use crate::provider::ChatCompletion;
use answer::validate_answer_set;
use json::{answer_strings, normalize_quotes, parse_payload_object};
use tracing::debug;

/// Result of a structurally valid provider payload
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedOutcome {
    Success(ParsedQuestion),
    /// The provider explicitly declined with `{"question":"","answers":[]}`
    Empty { explanation: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedQuestion {
    pub question: String,
    /// Correct answer first, as emitted by the provider
    pub answers: Vec<TriviaAnswer>,
    /// Diagnostic only, e.g. "question=ok, answers=4/4, quotesFixed=1"
    pub summary: String,
}

/// Parse and validate the first choice of a chat completion
pub fn parse_response(
    raw: &ChatCompletion,
    expected_answers: usize,
) -> Result<ParsedOutcome, ParserError> {
    let content = raw.first_content().ok_or(ParserError::InvalidResponse)?;
    parse_content(content, expected_answers)
}

/// Parse and validate raw message content
pub fn parse_content(content: &str, expected_answers: usize) -> Result<ParsedOutcome, ParserError> {
    let (normalized, quotes_fixed) = normalize_quotes(content);
    if quotes_fixed > 0 {
        debug!(quotes_fixed, "Normalized smart quotes in provider output");
    }

    let object = parse_payload_object(&normalized)?;

    let question = match object.get("question") {
        None => return Err(ParserError::MissingField("question")),
        Some(value) => value.as_str().ok_or(ParserError::QuestionNotString)?,
    };
    let question = sanitize_question(question)?;

    let answers = object
        .get("answers")
        .ok_or(ParserError::MissingField("answers"))?;
    let answers = sanitize_answers(&answer_strings(answers)?)?;

    if question.is_empty() {
        if !answers.is_empty() {
            return Err(ParserError::AnswersWithoutQuestion {
                count: answers.len(),
            });
        }
    } else {
        validate_answer_set(&answers, expected_answers)?;
    }

    let summary = format!(
        "question={}, answers={}/{}, quotesFixed={}",
        if question.is_empty() { "empty" } else { "ok" },
        answers.len(),
        expected_answers,
        quotes_fixed
    );
    debug!(summary = %summary, "Validated provider payload");

    if question.is_empty() {
        return Ok(ParsedOutcome::Empty {
            explanation: format!("provider declined to produce a question ({})", summary),
        });
    }

    let answers = answers
        .into_iter()
        .enumerate()
        .map(|(i, text)| TriviaAnswer::new(text, i == 0))
        .collect();

    Ok(ParsedOutcome::Success(ParsedQuestion {
        question,
        answers,
        summary,
    }))
}
