use super::models::ModelSelector;
use super::types::{ChatCompletion, ChatMessage, ChatRequest, Completion};
use super::CompletionProvider;
use crate::config::{ProviderSettings, RetryConfig};
use crate::error::{ConfigError, ProviderError, RetryError};
use crate::runner::retry::{retry_with_backoff, RetryPolicy};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, RETRY_AFTER};
use reqwest::StatusCode;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Longest slice of an error body kept in a `ProviderError`
const MAX_ERROR_BODY: usize = 300;

/// HTTP client for OpenAI-compatible chat-completion endpoints
pub struct ApiClient {
    name: String,
    url: String,
    api_key: String,
    headers: HeaderMap,
    http: reqwest::Client,
    selector: ModelSelector,
    retry: RetryConfig,
    timeout: Duration,
    temperature: f64,
    max_tokens: u32,
    system_prompt: String,
}

impl ApiClient {
    pub fn new(
        settings: &ProviderSettings,
        retry: &RetryConfig,
        api_key: String,
    ) -> Result<Self, ConfigError> {
        let selector = ModelSelector::new(&settings.name, &settings.models)?;

        let mut headers = HeaderMap::new();
        for (name, value) in &settings.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| ConfigError::InvalidHeader(name.clone()))?;
            let header_value =
                HeaderValue::from_str(value).map_err(|_| ConfigError::InvalidHeader(name.clone()))?;
            headers.insert(header_name, header_value);
        }

        let http = reqwest::Client::builder()
            .timeout(settings.timeout())
            .build()?;

        Ok(Self {
            name: settings.name.clone(),
            url: settings.base_url.clone(),
            api_key,
            headers,
            http,
            selector,
            retry: retry.clone(),
            timeout: settings.timeout(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            system_prompt: settings.system_prompt.clone(),
        })
    }

    /// Build a client reading the API key from the configured environment variable
    pub fn from_env(settings: &ProviderSettings, retry: &RetryConfig) -> Result<Self, ConfigError> {
        let api_key = std::env::var(&settings.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingApiKey(settings.api_key_env.clone()))?;
        Self::new(settings, retry, api_key)
    }

    fn build_request(&self, model: &str, prompt: &str) -> ChatRequest {
        ChatRequest {
            model: model.to_string(),
            messages: vec![
                ChatMessage::system(&self.system_prompt),
                ChatMessage::user(prompt),
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }

    /// One HTTP round trip, classified but not retried
    async fn send_once(&self, request: &ChatRequest) -> Result<ChatCompletion, ProviderError> {
        let response = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .headers(self.headers.clone())
            .json(request)
            .send()
            .await
            .map_err(ProviderError::Network)?;

        let status = response.status();
        let retry_after = parse_retry_after(response.headers().get(RETRY_AFTER));
        let body = response.text().await.map_err(ProviderError::Network)?;

        if !status.is_success() {
            return Err(classify_status(status, retry_after, &body));
        }

        let completion: ChatCompletion =
            serde_json::from_str(&body).map_err(|e| ProviderError::Decode(e.to_string()))?;
        debug!(
            response_id = completion.id.as_deref().unwrap_or("-"),
            served_by = completion.model.as_deref().unwrap_or("-"),
            choices = completion.choices.len(),
            "Received chat completion"
        );
        Ok(completion)
    }
}

#[async_trait]
impl CompletionProvider for ApiClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<Completion, RetryError<ProviderError>> {
        let model = self.selector.next().to_string();
        let request = self.build_request(&model, prompt);
        debug!(provider = %self.name, model = %model, "Sending chat completion request");

        let (provider, retry_model) = (self.name.clone(), model.clone());
        let (final_provider, final_model) = (self.name.clone(), model.clone());
        let policy = RetryPolicy::<ProviderError>::from_config(&self.retry, self.timeout)
            .on_retry(move |attempt, error, delay| {
                info!(
                    provider = %provider,
                    model = %retry_model,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying provider request: {}",
                    error
                );
            })
            .on_final_error(move |error, attempts| {
                debug!(
                    provider = %final_provider,
                    model = %final_model,
                    attempts,
                    "Giving up on provider request: {}",
                    error
                );
            });

        let mut attempts = 0u32;
        let response = retry_with_backoff(&policy, cancel, || {
            attempts += 1;
            self.send_once(&request)
        })
        .await?;

        Ok(Completion {
            model,
            response,
            attempts,
        })
    }
}

fn classify_status(status: StatusCode, retry_after: Option<Duration>, body: &str) -> ProviderError {
    let body: String = body.chars().take(MAX_ERROR_BODY).collect();
    match status {
        StatusCode::UNAUTHORIZED => ProviderError::Auth {
            status: status.as_u16(),
        },
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited { retry_after },
        s if s.is_server_error() => ProviderError::Server {
            status: s.as_u16(),
            body,
        },
        s => ProviderError::UnexpectedStatus {
            status: s.as_u16(),
            body,
        },
    }
}

/// Retry-After as a positive whole number of seconds; anything else is ignored
fn parse_retry_after(value: Option<&HeaderValue>) -> Option<Duration> {
    let secs: u64 = value?.to_str().ok()?.trim().parse().ok()?;
    (secs > 0).then(|| Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const CHAT_PATH: &str = "/api/v1/chat/completions";

    fn settings(server: &MockServer, models: &[&str]) -> ProviderSettings {
        let mut settings = ProviderSettings {
            base_url: format!("{}{}", server.uri(), CHAT_PATH),
            models: models.iter().map(|m| m.to_string()).collect(),
            ..ProviderSettings::default()
        };
        settings
            .headers
            .insert("X-Title".to_string(), "triviagen-tests".to_string());
        settings
    }

    fn retry(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            base_delay_ms: 1,
            max_delay_ms: 10,
            jitter: false,
        }
    }

    fn client(server: &MockServer, models: &[&str], max_retries: u32) -> ApiClient {
        ApiClient::new(
            &settings(server, models),
            &retry(max_retries),
            "test-key".to_string(),
        )
        .unwrap()
    }

    fn ok_body(content: &str) -> serde_json::Value {
        json!({
            "id": "gen-1",
            "model": "ignored",
            "choices": [{"message": {"role": "assistant", "content": content}}]
        })
    }

    #[tokio::test]
    async fn test_successful_call_sends_expected_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(CHAT_PATH))
            .and(header("authorization", "Bearer test-key"))
            .and(header("content-type", "application/json"))
            .and(header("x-title", "triviagen-tests"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_body("{}")))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server, &["model-a"], 3);
        let completion = client
            .complete("Ask me about rivers", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(completion.model, "model-a");
        assert_eq!(completion.attempts, 1);
        assert_eq!(completion.response.first_content(), Some("{}"));

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = requests[0].body_json().unwrap();
        assert_eq!(body["model"], "model-a");
        assert_eq!(body["temperature"], 0.7);
        assert_eq!(body["max_tokens"], 512);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"], "Ask me about rivers");
    }

    #[tokio::test]
    async fn test_auth_failure_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .expect(1)
            .mount(&server)
            .await;

        let err = client(&server, &["m"], 5)
            .complete("q", &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            RetryError::Failed {
                attempts: 1,
                source: ProviderError::Auth { status: 401 },
            } => {}
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_rate_limit_then_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_body("ok")))
            .expect(1)
            .mount(&server)
            .await;

        let completion = client(&server, &["m"], 3)
            .complete("q", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(completion.attempts, 3);
        assert_eq!(completion.response.first_content(), Some("ok"));
    }

    #[tokio::test]
    async fn test_retries_reuse_selected_model() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_body("ok")))
            .mount(&server)
            .await;

        let client = client(&server, &["a", "b"], 3);
        let first = client
            .complete("q", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(first.model, "a");
        assert_eq!(first.attempts, 2);

        let second = client
            .complete("q", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(second.model, "b");
        assert_eq!(second.attempts, 1);

        let requests = server.received_requests().await.unwrap();
        let sent: Vec<String> = requests
            .iter()
            .map(|r| r.body_json::<serde_json::Value>().unwrap()["model"].to_string())
            .collect();
        assert_eq!(sent, vec!["\"a\"", "\"a\"", "\"b\""]);
    }

    #[tokio::test]
    async fn test_server_errors_exhaust_retries() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .expect(3)
            .mount(&server)
            .await;

        let err = client(&server, &["m"], 2)
            .complete("q", &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.attempts(), 3);
        match err {
            RetryError::Failed {
                source: ProviderError::Server { status, body },
                ..
            } => {
                assert_eq!(status, 503);
                assert_eq!(body, "overloaded");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_client_error_is_final() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
            .expect(1)
            .mount(&server)
            .await;

        let err = client(&server, &["m"], 3)
            .complete("q", &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            RetryError::Failed {
                attempts: 1,
                source: ProviderError::UnexpectedStatus { status: 400, .. }
            }
        ));
    }

    #[tokio::test]
    async fn test_undecodable_body_is_final() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .expect(1)
            .mount(&server)
            .await;

        let err = client(&server, &["m"], 3)
            .complete("q", &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            RetryError::Failed {
                source: ProviderError::Decode(_),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_connection_refused_is_retried_as_network() {
        let settings = ProviderSettings {
            base_url: "http://127.0.0.1:9/chat".to_string(),
            models: vec!["m".to_string()],
            ..ProviderSettings::default()
        };
        let client = ApiClient::new(&settings, &retry(1), "k".to_string()).unwrap();

        let err = client
            .complete("q", &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.attempts(), 2);
        assert!(matches!(
            err,
            RetryError::Failed {
                source: ProviderError::Network(_),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_calls_rotate_models() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_body("ok")))
            .mount(&server)
            .await;

        let client = client(&server, &["a", "b", "c"], 0);
        let mut used = Vec::new();
        for _ in 0..4 {
            let completion = client
                .complete("q", &CancellationToken::new())
                .await
                .unwrap();
            used.push(completion.model);
        }
        assert_eq!(used, vec!["a", "b", "c", "a"]);

        let requests = server.received_requests().await.unwrap();
        let sent: Vec<String> = requests
            .iter()
            .map(|r| r.body_json::<serde_json::Value>().unwrap()["model"].to_string())
            .collect();
        assert_eq!(sent, vec!["\"a\"", "\"b\"", "\"c\"", "\"a\""]);
    }

    #[test]
    fn test_parse_retry_after() {
        let value = HeaderValue::from_static("12");
        assert_eq!(parse_retry_after(Some(&value)), Some(Duration::from_secs(12)));

        for bad in ["0", "-3", "soon", "Wed, 21 Oct 2015 07:28:00 GMT", ""] {
            let value = HeaderValue::from_static(bad);
            assert_eq!(parse_retry_after(Some(&value)), None, "{bad}");
        }
        assert_eq!(parse_retry_after(None), None);
    }

    #[test]
    fn test_classify_status() {
        assert!(matches!(
            classify_status(StatusCode::UNAUTHORIZED, None, ""),
            ProviderError::Auth { status: 401 }
        ));
        assert!(matches!(
            classify_status(
                StatusCode::TOO_MANY_REQUESTS,
                Some(Duration::from_secs(3)),
                ""
            ),
            ProviderError::RateLimited {
                retry_after: Some(d)
            } if d == Duration::from_secs(3)
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_GATEWAY, None, "x"),
            ProviderError::Server { status: 502, .. }
        ));
        assert!(matches!(
            classify_status(StatusCode::FORBIDDEN, None, "x"),
            ProviderError::UnexpectedStatus { status: 403, .. }
        ));

        let long_body = "e".repeat(1000);
        match classify_status(StatusCode::INTERNAL_SERVER_ERROR, None, &long_body) {
            ProviderError::Server { body, .. } => assert_eq!(body.len(), MAX_ERROR_BODY),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_from_env_requires_key() {
        let settings = ProviderSettings {
            api_key_env: "TRIVIAGEN_TEST_KEY_THAT_IS_NOT_SET".to_string(),
            ..ProviderSettings::default()
        };
        let err = ApiClient::from_env(&settings, &RetryConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, ConfigError::MissingApiKey(name) if name == "TRIVIAGEN_TEST_KEY_THAT_IS_NOT_SET"));
    }
}
