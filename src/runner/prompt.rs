use super::difficulty::Difficulty;
use super::orchestrator::GenerationRequest;
use crate::config::GenerationConfig;
use crate::error::GenerationFailure;
use crate::parser::{MAX_ANSWER_CHARS, MAX_QUESTION_CHARS};
use regex::{Captures, Regex};

const MAX_TOPIC_CHARS: usize = 200;

const PROMPT_TEMPLATE: &str = "\
Write one multiple-choice trivia question about the topic \"{topic}\".
Difficulty: {difficulty}.{hint}

Rules:
- The question must end with a question mark and be at most {max_question_chars} characters long.
- Provide exactly {answer_count} answers. Each answer is at most {max_answer_chars} characters and no two answers are the same.
- Exactly one answer is correct. List the correct answer FIRST, followed by the wrong answers.
- Wrong answers must be plausible but clearly wrong to someone who knows the fact.

Respond with ONLY a JSON object in this exact shape, with no markdown, code fences or commentary:
{\"question\": \"...?\", \"answers\": [\"correct answer\", \"wrong answer\", ...]}

If you cannot write a question that follows every rule, respond with exactly:
{\"question\": \"\", \"answers\": []}";

/// Prompt text plus the parameters it was rendered with
#[derive(Debug, Clone)]
pub struct RenderedPrompt {
    pub text: String,
    pub answer_count: usize,
    pub difficulty: Difficulty,
}

/// Render the generation prompt, clamping the answer count into the configured range
pub fn build_prompt(
    request: &GenerationRequest,
    limits: &GenerationConfig,
) -> Result<RenderedPrompt, GenerationFailure> {
    let topic = request.topic.trim();
    if topic.is_empty() {
        return Err(GenerationFailure::Validation(
            "topic must not be empty".to_string(),
        ));
    }
    if topic.chars().count() > MAX_TOPIC_CHARS {
        return Err(GenerationFailure::Validation(format!(
            "topic is longer than {} characters",
            MAX_TOPIC_CHARS
        )));
    }

    let answer_count = limits.clamp_answers(request.answer_count);
    let difficulty = Difficulty::parse(&request.difficulty);
    let hint = difficulty
        .hint()
        .map(|h| format!(" {}", h))
        .unwrap_or_default();

    let text = render(
        PROMPT_TEMPLATE,
        &[
            ("topic", topic.to_string()),
            ("difficulty", difficulty.prompt_text()),
            ("hint", hint),
            ("answer_count", answer_count.to_string()),
            ("max_question_chars", MAX_QUESTION_CHARS.to_string()),
            ("max_answer_chars", MAX_ANSWER_CHARS.to_string()),
        ],
    );

    Ok(RenderedPrompt {
        text,
        answer_count,
        difficulty,
    })
}

/// Single-pass `{name}` substitution; substituted values are never rescanned
fn render(template: &str, values: &[(&str, String)]) -> String {
    let Ok(re) = Regex::new(r"\{([a-z_]+)\}") else {
        return template.to_string();
    };
    re.replace_all(template, |caps: &Captures| {
        values
            .iter()
            .find(|(name, _)| *name == &caps[1])
            .map(|(_, value)| value.clone())
            .unwrap_or_else(|| caps[0].to_string())
    })
    .into_owned()
}
