use crate::config::GenerationConfig;
use crate::error::{GenerationError, GenerationFailure, RetryError};
use crate::parser::{parse_response, ParsedOutcome};
use crate::provider::CompletionProvider;
use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::draft::{fingerprint, DraftMetadata, TriviaQuestionDraft};
use super::finalize::{correct_index, sanitize, shuffle_answers, validate};
use super::prompt::build_prompt;

/// Pipeline stage; a failure records where it happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    BuildPrompt,
    CallProvider,
    ParseResponse,
    Validate,
    Sanitize,
    Shuffle,
    Done,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::BuildPrompt => write!(f, "build_prompt"),
            Stage::CallProvider => write!(f, "call_provider"),
            Stage::ParseResponse => write!(f, "parse_response"),
            Stage::Validate => write!(f, "validate"),
            Stage::Sanitize => write!(f, "sanitize"),
            Stage::Shuffle => write!(f, "shuffle"),
            Stage::Done => write!(f, "done"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub topic: String,
    pub difficulty: String,
    pub answer_count: usize,
}

/// Drives prompt -> provider -> parser -> de-biased draft
pub struct Generator {
    provider: Arc<dyn CompletionProvider>,
    limits: GenerationConfig,
}

impl Generator {
    pub fn new(provider: Arc<dyn CompletionProvider>, limits: GenerationConfig) -> Self {
        Self { provider, limits }
    }

    /// Generate one question. There is no fallback: every failure is returned.
    pub async fn generate(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<TriviaQuestionDraft, GenerationError> {
        let request_id = Uuid::new_v4();
        let result = self.run_stages(request_id, request, cancel).await;

        match &result {
            Ok(draft) => info!(
                %request_id,
                topic = %draft.topic,
                model = %draft.metadata.model,
                attempts = draft.metadata.attempts,
                "Generated trivia question"
            ),
            Err(e) => warn!(
                %request_id,
                topic = %request.topic,
                stage = %e.stage,
                "Question generation failed: {}",
                e.cause
            ),
        }

        result
    }

    async fn run_stages(
        &self,
        request_id: Uuid,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<TriviaQuestionDraft, GenerationError> {
        let fail = |stage: Stage| move |cause: GenerationFailure| GenerationError::new(stage, cause);

        debug!(%request_id, stage = %Stage::BuildPrompt, "Entering stage");
        let prompt = build_prompt(request, &self.limits).map_err(fail(Stage::BuildPrompt))?;

        debug!(%request_id, stage = %Stage::CallProvider, provider = self.provider.name(), "Entering stage");
        let completion = self
            .provider
            .complete(&prompt.text, cancel)
            .await
            .map_err(|e| {
                debug!(%request_id, attempts = e.attempts(), "Provider gave up");
                match e {
                    RetryError::Cancelled { .. } => GenerationFailure::Cancelled,
                    e => GenerationFailure::Provider(e),
                }
            })
            .map_err(fail(Stage::CallProvider))?;

        debug!(%request_id, stage = %Stage::ParseResponse, model = %completion.model, "Entering stage");
        let parsed = match parse_response(&completion.response, prompt.answer_count)
            .map_err(|e| fail(Stage::ParseResponse)(e.into()))?
        {
            ParsedOutcome::Success(parsed) => parsed,
            ParsedOutcome::Empty { explanation } => {
                return Err(fail(Stage::ParseResponse)(
                    GenerationFailure::EmptyGeneration(explanation),
                ));
            }
        };

        debug!(%request_id, stage = %Stage::Validate, "Entering stage");
        validate(&parsed).map_err(fail(Stage::Validate))?;

        debug!(%request_id, stage = %Stage::Sanitize, "Entering stage");
        let (question, mut answers) =
            sanitize(&parsed).map_err(|e| fail(Stage::Sanitize)(e.into()))?;

        debug!(%request_id, stage = %Stage::Shuffle, "Entering stage");
        {
            let mut rng = rand::thread_rng();
            shuffle_answers(&mut answers, &mut rng);
        }
        let correct_answer_index = correct_index(&answers).map_err(fail(Stage::Shuffle))?;

        let answer_count = answers.len();
        let draft = TriviaQuestionDraft {
            topic: request.topic.trim().to_string(),
            difficulty: request.difficulty.clone(),
            metadata: DraftMetadata {
                tier: prompt.difficulty.tier(),
                custom_difficulty: prompt.difficulty.custom_description().map(str::to_string),
                provider: self.provider.name().to_string(),
                model: completion.model,
                requested_answers: request.answer_count,
                answer_count,
                attempts: completion.attempts,
                validation_summary: parsed.summary,
                fingerprint: fingerprint(&question),
                request_id,
                generated_at: Utc::now(),
            },
            question,
            answers,
            correct_answer_index,
        };

        debug!(%request_id, stage = %Stage::Done, "Entering stage");
        Ok(draft)
    }

    /// Generate `count` independent questions, at most `limits.concurrency` at a time.
    /// Results arrive in completion order; one failure never affects the others.
    pub async fn generate_batch(
        self: &Arc<Self>,
        request: &GenerationRequest,
        count: usize,
        cancel: &CancellationToken,
    ) -> Vec<Result<TriviaQuestionDraft, GenerationError>> {
        let semaphore = Arc::new(Semaphore::new(self.limits.concurrency.max(1)));
        let mut futures = FuturesUnordered::new();

        info!(
            count,
            concurrency = self.limits.concurrency,
            topic = %request.topic,
            "Starting batch generation"
        );

        for _ in 0..count {
            let generator = Arc::clone(self);
            let request = request.clone();
            let cancel = cancel.child_token();
            let semaphore = semaphore.clone();

            futures.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                generator.generate(&request, &cancel).await
            }));
        }

        let mut results = Vec::with_capacity(count);
        while let Some(joined) = futures.next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => warn!("Generation task panicked: {}", e),
            }
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ParserError, ProviderError};
    use crate::provider::{ChatCompletion, Completion};
    use crate::runner::difficulty::Tier;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::error::Error as _;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Replays canned provider results in order, then repeats the last one
    struct ScriptedProvider {
        script: Mutex<VecDeque<Result<String, ProviderError>>>,
        last: Mutex<Option<String>>,
        calls: AtomicUsize,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedProvider {
        fn replying(contents: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(contents.iter().map(|c| Ok(c.to_string())).collect()),
                last: Mutex::new(None),
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn failing(error: ProviderError) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(VecDeque::from([Err(error)])),
                last: Mutex::new(None),
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl CompletionProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(
            &self,
            prompt: &str,
            _cancel: &CancellationToken,
        ) -> Result<Completion, RetryError<ProviderError>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(prompt.to_string());

            let next = self.script.lock().unwrap().pop_front();
            let content = match next {
                Some(Ok(content)) => {
                    *self.last.lock().unwrap() = Some(content.clone());
                    content
                }
                Some(Err(source)) => return Err(RetryError::Failed { attempts: 1, source }),
                None => self.last.lock().unwrap().clone().unwrap_or_default(),
            };

            Ok(Completion {
                model: format!("model-{}", call % 2),
                response: ChatCompletion::from_content(content),
                attempts: 1,
            })
        }
    }

    const CAPITALS: &str = r#"{"question": "What is the capital of Canada?", "answers": ["Ottawa", "Toronto", "Vancouver", "Montreal"]}"#;

    fn request(difficulty: &str, answer_count: usize) -> GenerationRequest {
        GenerationRequest {
            topic: "Capitals".to_string(),
            difficulty: difficulty.to_string(),
            answer_count,
        }
    }

    fn generator(provider: Arc<ScriptedProvider>) -> Generator {
        Generator::new(provider, GenerationConfig::default())
    }

    #[tokio::test]
    async fn test_generate_end_to_end() {
        let provider = ScriptedProvider::replying(&[CAPITALS]);
        let draft = generator(provider.clone())
            .generate(&request("medium", 4), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(draft.answers.len(), 4);
        assert_eq!(draft.answers.iter().filter(|a| a.is_correct).count(), 1);
        assert!(draft.question.ends_with('?'));
        assert!(draft.question.chars().count() <= 150);
        assert_eq!(draft.answers[draft.correct_answer_index].text, "Ottawa");

        assert_eq!(draft.topic, "Capitals");
        assert_eq!(draft.metadata.tier, Tier::Medium);
        assert_eq!(draft.metadata.custom_difficulty, None);
        assert_eq!(draft.metadata.provider, "scripted");
        assert_eq!(draft.metadata.model, "model-0");
        assert_eq!(draft.metadata.answer_count, 4);
        assert_eq!(
            draft.metadata.validation_summary,
            "question=ok, answers=4/4, quotesFixed=0"
        );
        assert_eq!(draft.metadata.fingerprint.len(), 12);

        let prompts = provider.prompts.lock().unwrap();
        assert!(prompts[0].contains("Provide exactly 4 answers"));
    }

    #[tokio::test]
    async fn test_correct_answer_not_pinned_to_first_slot() {
        let provider = ScriptedProvider::replying(&[CAPITALS]);
        let generator = generator(provider);
        let mut positions = std::collections::HashSet::new();

        for _ in 0..200 {
            let draft = generator
                .generate(&request("easy", 4), &CancellationToken::new())
                .await
                .unwrap();
            positions.insert(draft.correct_answer_index);
        }
        assert!(positions.len() > 1, "correct answer never moved");
    }

    #[tokio::test]
    async fn test_custom_difficulty_preserved_in_metadata() {
        let provider = ScriptedProvider::replying(&[CAPITALS]);
        let draft = generator(provider.clone())
            .generate(
                &request("custom: tricky but fair for geography buffs", 4),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(draft.difficulty, "custom: tricky but fair for geography buffs");
        assert_eq!(draft.metadata.tier, Tier::Medium);
        assert_eq!(
            draft.metadata.custom_difficulty.as_deref(),
            Some("tricky but fair for geography buffs")
        );
        let prompts = provider.prompts.lock().unwrap();
        assert!(prompts[0].contains("Difficulty: tricky but fair for geography buffs."));
    }

    #[tokio::test]
    async fn test_hard_difficulty_maps_to_tier() {
        let provider = ScriptedProvider::replying(&[CAPITALS]);
        let draft = generator(provider)
            .generate(&request("HARD", 4), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(draft.metadata.tier, Tier::Hard);
        assert_eq!(draft.difficulty, "HARD");
    }

    #[tokio::test]
    async fn test_answer_count_clamped_before_parsing() {
        let provider = ScriptedProvider::replying(&[
            r#"{"question": "Which is a primary colour?", "answers": ["Red", "Green"]}"#,
        ]);
        let draft = generator(provider)
            .generate(&request("easy", 1), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(draft.answers.len(), 2);
        assert_eq!(draft.metadata.requested_answers, 1);
        assert_eq!(draft.metadata.answer_count, 2);
    }

    #[tokio::test]
    async fn test_sentinel_fails_loudly() {
        let provider = ScriptedProvider::replying(&[r#"{"question":"","answers":[]}"#]);
        let err = generator(provider)
            .generate(&request("medium", 4), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.stage, Stage::ParseResponse);
        assert!(matches!(err.cause, GenerationFailure::EmptyGeneration(_)));
        assert!(err.to_string().starts_with("failed to generate trivia question"));
        assert!(err.source().is_some());
    }

    #[tokio::test]
    async fn test_malformed_payload_is_validation_failure() {
        let provider = ScriptedProvider::replying(&[
            r#"{"question": "What is the capital of Canada?", "answers": ["Ottawa", "Toronto"], "explanation": "..."}"#,
        ]);
        let err = generator(provider)
            .generate(&request("medium", 2), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.stage, Stage::ParseResponse);
        assert!(matches!(
            err.cause,
            GenerationFailure::Parse(ParserError::UnexpectedKeys(_))
        ));
    }

    #[tokio::test]
    async fn test_provider_failure_wrapped() {
        let provider = ScriptedProvider::failing(ProviderError::Auth { status: 401 });
        let err = generator(provider)
            .generate(&request("medium", 4), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.stage, Stage::CallProvider);
        assert!(matches!(
            err.cause,
            GenerationFailure::Provider(RetryError::Failed {
                source: ProviderError::Auth { status: 401 },
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_empty_topic_fails_before_provider() {
        let provider = ScriptedProvider::replying(&[CAPITALS]);
        let err = generator(provider.clone())
            .generate(
                &GenerationRequest {
                    topic: "  ".to_string(),
                    difficulty: "easy".to_string(),
                    answer_count: 4,
                },
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert_eq!(err.stage, Stage::BuildPrompt);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_batch_results_are_independent() {
        let provider = ScriptedProvider::replying(&[
            CAPITALS,
            r#"{"question":"","answers":[]}"#,
            CAPITALS,
        ]);
        let generator = Arc::new(generator(provider.clone()));

        let results = generator
            .generate_batch(&request("medium", 4), 3, &CancellationToken::new())
            .await;

        assert_eq!(results.len(), 3);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 2);
        assert_eq!(results.iter().filter(|r| r.is_err()).count(), 1);
    }
}
