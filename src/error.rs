use crate::runner::Stage;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("No models configured for provider '{0}'")]
    NoModels(String),

    #[error("Invalid answer range {min}..={max} (minimum must be at least 2 and not above maximum)")]
    InvalidAnswerRange { min: usize, max: usize },

    #[error("Default answer count {default} is outside {min}..={max}")]
    DefaultAnswersOutOfRange {
        default: usize,
        min: usize,
        max: usize,
    },

    #[error("Provider timeout must be greater than zero")]
    ZeroTimeout,

    #[error("Generation concurrency must be greater than zero")]
    ZeroConcurrency,

    #[error("API key environment variable '{0}' is not set")]
    MissingApiKey(String),

    #[error("Invalid header '{0}'")]
    InvalidHeader(String),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Classified failure of a single provider request.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Authentication rejected by provider (HTTP {status})")]
    Auth { status: u16 },

    #[error("Rate limited by provider{}", .retry_after.map(|d| format!(" (retry after {}s)", d.as_secs())).unwrap_or_default())]
    RateLimited { retry_after: Option<Duration> },

    #[error("Provider server error (HTTP {status}): {body}")]
    Server { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Unexpected HTTP status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("Failed to decode provider response: {0}")]
    Decode(String),
}

/// Terminal outcome of the retry executor.
#[derive(Error, Debug)]
pub enum RetryError<E>
where
    E: std::error::Error + 'static,
{
    #[error("{source} (after {attempts} attempt(s))")]
    Failed {
        attempts: u32,
        #[source]
        source: E,
    },

    #[error("Cancelled after {attempts} attempt(s)")]
    Cancelled { attempts: u32 },
}

impl<E> RetryError<E>
where
    E: std::error::Error + 'static,
{
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Failed { attempts, .. } | RetryError::Cancelled { attempts } => *attempts,
        }
    }
}

/// A provider payload that violated the question schema.
#[derive(Error, Debug)]
pub enum ParserError {
    #[error("Invalid provider response: no message content in first choice")]
    InvalidResponse,

    #[error("Provider content is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Provider content is not a JSON object")]
    NotAnObject,

    #[error("Unexpected keys in payload: {}", .0.join(", "))]
    UnexpectedKeys(Vec<String>),

    #[error("Missing required field '{0}'")]
    MissingField(&'static str),

    #[error("Field 'question' must be a string")]
    QuestionNotString,

    #[error("Question must end with '?'")]
    QuestionMissingMark,

    #[error("Question is {len} characters (max {max})")]
    QuestionTooLong { len: usize, max: usize },

    #[error("Field 'answers' must be an array")]
    AnswersNotArray,

    #[error("Answer {index} is not a string")]
    AnswerNotString { index: usize },

    #[error("Answer {index} is empty")]
    EmptyAnswer { index: usize },

    #[error("Answer {index} is {len} characters (max {max})")]
    AnswerTooLong { index: usize, len: usize, max: usize },

    #[error("Empty question came with {count} answer(s)")]
    AnswersWithoutQuestion { count: usize },

    #[error("Expected {expected} answers, got {actual}")]
    AnswerCount { actual: usize, expected: usize },

    #[error("Duplicate answer: '{0}'")]
    DuplicateAnswer(String),
}

/// Underlying cause of a failed generation.
#[derive(Error, Debug)]
pub enum GenerationFailure {
    #[error(transparent)]
    Provider(#[from] RetryError<ProviderError>),

    #[error(transparent)]
    Parse(#[from] ParserError),

    #[error("Could not generate question: {0}")]
    EmptyGeneration(String),

    #[error("Invalid question: {0}")]
    Validation(String),

    #[error("Expected exactly one correct answer, found {0}")]
    CorrectAnswerCount(usize),

    #[error("Generation cancelled")]
    Cancelled,
}

/// The single outward-facing error for `generate`.
#[derive(Error, Debug)]
#[error("failed to generate trivia question (stage: {stage})")]
pub struct GenerationError {
    pub stage: Stage,
    #[source]
    pub cause: GenerationFailure,
}

impl GenerationError {
    pub fn new(stage: Stage, cause: impl Into<GenerationFailure>) -> Self {
        Self {
            stage,
            cause: cause.into(),
        }
    }
}
