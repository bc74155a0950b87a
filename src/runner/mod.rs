mod difficulty;
mod draft;
mod finalize;
mod orchestrator;
mod prompt;
pub(crate) mod retry;

pub use draft::TriviaQuestionDraft;
pub use orchestrator::{GenerationRequest, Generator, Stage};
pub use prompt::build_prompt;
