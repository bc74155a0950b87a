use std::path::PathBuf;

pub fn default_config_path() -> PathBuf {
    PathBuf::from("triviagen.yaml")
}

pub fn default_provider_name() -> String {
    "openrouter".to_string()
}

pub fn default_base_url() -> String {
    "https://openrouter.ai/api/v1/chat/completions".to_string()
}

pub fn default_api_key_env() -> String {
    "OPENROUTER_API_KEY".to_string()
}

pub fn default_timeout_ms() -> u64 {
    30_000
}

/// Free-tier rotation, visited round-robin
pub fn default_models() -> Vec<String> {
    vec![
        "meta-llama/llama-3.3-70b-instruct:free".to_string(),
        "mistralai/mistral-small-3.1-24b-instruct:free".to_string(),
        "google/gemma-3-27b-it:free".to_string(),
        "deepseek/deepseek-chat-v3-0324:free".to_string(),
    ]
}

pub fn default_temperature() -> f64 {
    0.7
}

pub fn default_max_tokens() -> u32 {
    512
}

pub fn default_system_prompt() -> String {
    "You write trivia questions for a quiz game. \
     Respond with a single JSON object and nothing else: \
     no markdown, no code fences, no commentary."
        .to_string()
}

pub fn default_max_retries() -> u32 {
    3
}

pub fn default_base_delay_ms() -> u64 {
    1000
}

pub fn default_max_delay_ms() -> u64 {
    30_000
}

pub fn default_min_answers() -> usize {
    2
}

pub fn default_max_answers() -> usize {
    6
}

pub fn default_answers() -> usize {
    4
}

pub fn default_difficulty() -> String {
    "medium".to_string()
}

pub fn default_concurrency() -> usize {
    3
}

pub fn default_true() -> bool {
    true
}
