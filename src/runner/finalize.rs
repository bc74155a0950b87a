use crate::error::{GenerationFailure, ParserError};
use crate::parser::{sanitize_answers, sanitize_question, ParsedQuestion, TriviaAnswer};
use rand::seq::SliceRandom;
use rand::Rng;

/// Minimum answers for a playable question
const MIN_ANSWERS: usize = 2;

/// Confirm the parsed question is playable
pub fn validate(parsed: &ParsedQuestion) -> Result<(), GenerationFailure> {
    if parsed.question.trim().is_empty() {
        return Err(GenerationFailure::Validation(
            "question text is empty".to_string(),
        ));
    }
    if parsed.answers.len() < MIN_ANSWERS {
        return Err(GenerationFailure::Validation(format!(
            "expected at least {} answers, got {}",
            MIN_ANSWERS,
            parsed.answers.len()
        )));
    }
    Ok(())
}

/// Re-trim question and answers, keeping each answer's correctness flag
pub fn sanitize(parsed: &ParsedQuestion) -> Result<(String, Vec<TriviaAnswer>), ParserError> {
    let question = sanitize_question(&parsed.question)?;

    let texts: Vec<String> = parsed.answers.iter().map(|a| a.text.clone()).collect();
    let answers = sanitize_answers(&texts)?
        .into_iter()
        .zip(&parsed.answers)
        .map(|(text, original)| TriviaAnswer::new(text, original.is_correct))
        .collect();

    Ok((question, answers))
}

/// Uniform random permutation (Fisher-Yates)
pub fn shuffle_answers<R: Rng + ?Sized>(answers: &mut [TriviaAnswer], rng: &mut R) {
    answers.shuffle(rng);
}

/// Position of the single correct answer
pub fn correct_index(answers: &[TriviaAnswer]) -> Result<usize, GenerationFailure> {
    let flagged: Vec<usize> = answers
        .iter()
        .enumerate()
        .filter(|(_, a)| a.is_correct)
        .map(|(i, _)| i)
        .collect();

    match flagged.as_slice() {
        [index] => Ok(*index),
        other => Err(GenerationFailure::CorrectAnswerCount(other.len())),
    }
}
