//! Chat completion backends

mod ollama;
mod openai;

pub use ollama::OllamaCompletion;
pub use openai::OpenAiCompletion;
