//! Pull request descriptions from branch differences.
//!
//! - [`issues`]: ClickUp and Jira tasks rendered as issue context
//! - [`prompt`]: builds the system and user prompts
//! - [`provider`]: HTTP clients for OpenAI, Ollama, Gemini, and Open WebUI
//! - [`response`]: recovers a `{title, body}` record from generated text
//! - [`describer`]: ties the three together

pub mod describer;
pub mod issues;
pub mod prompt;
pub mod provider;
pub mod response;

pub use describer::{DescribeRequest, Describer, Generate};
pub use issues::issue_context;
pub use provider::LlmClient;
pub use response::{clean_title, parse_response};
