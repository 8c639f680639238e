//! Language model access: client, rate-limit retry, prompts and response parsing.

pub mod client;
pub mod error;
pub mod parser;
pub mod prompts;
pub mod retry;

pub use client::{HttpLlmClient, LanguageModelClient, LlmProvider};
pub use error::LlmError;
pub use parser::{extract_corrected_sql, parse_verdict, sanitize, strip_markdown, RepairResponse, ValidationVerdict};
pub use prompts::PromptError;
pub use retry::RateLimitRetry;
