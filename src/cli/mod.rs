pub mod generate;
pub mod prompt;
pub mod schema;

use crate::config::GenerationConfig;
use crate::runner::GenerationRequest;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "triviagen")]
#[command(
    author,
    version,
    about = "Generate multiple-choice trivia questions with an LLM provider"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose/debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate questions and print them as JSON
    Generate(GenerateArgs),

    /// Print the rendered prompt without calling the provider
    Prompt(PromptArgs),

    /// Print JSON Schema for config validation
    Schema,
}

#[derive(Parser, Clone)]
pub struct QuestionArgs {
    /// Topic to ask about
    #[arg(short, long)]
    pub topic: String,

    /// easy, medium, hard, or free text (prefix with "custom:" to force free text)
    #[arg(short, long)]
    pub difficulty: Option<String>,

    /// Number of answers, clamped to the configured range
    #[arg(short, long)]
    pub answers: Option<usize>,

    /// Path to config file (defaults to ./triviagen.yaml when present)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

#[derive(Parser, Clone)]
pub struct GenerateArgs {
    #[command(flatten)]
    pub question: QuestionArgs,

    /// Number of independent questions to generate
    #[arg(short = 'n', long, default_value_t = 1)]
    pub count: usize,

    /// Override max parallel generations
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Print one JSON document per line instead of pretty output
    #[arg(long)]
    pub compact: bool,
}

#[derive(Parser, Clone)]
pub struct PromptArgs {
    #[command(flatten)]
    pub question: QuestionArgs,
}

impl QuestionArgs {
    /// Resolve flags against configured defaults
    pub fn to_request(&self, limits: &GenerationConfig) -> GenerationRequest {
        GenerationRequest {
            topic: self.topic.clone(),
            difficulty: self
                .difficulty
                .clone()
                .unwrap_or_else(|| limits.default_difficulty.clone()),
            answer_count: self.answers.unwrap_or(limits.default_answers),
        }
    }
}
