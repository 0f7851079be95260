//! Error types for cardbox-core.

use thiserror::Error;

/// Result type alias using ExtractError.
pub type Result<T> = std::result::Result<T, ExtractError>;

/// Errors that can occur during extraction.
///
/// None of these escape [`crate::engine::DegradationEngine::extract`]: the
/// engine converts every failed attempt into a zero-confidence result and
/// keeps walking the cascade.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("template '{name}' failed to compile: {message}")]
    TemplateCompile { name: String, message: String },

    #[error("strategy '{strategy}' failed: {message}")]
    StrategyExecution {
        strategy: &'static str,
        message: String,
    },

    #[error("content is empty or whitespace-only")]
    EmptyContent,
}
