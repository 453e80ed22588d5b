//! Core types, configuration, and error handling for branchbrief.
//!
//! This crate provides the shared foundation used by the other branchbrief crates:
//! - [`BranchbriefError`]: unified error type using `thiserror`
//! - [`BranchbriefConfig`]: configuration loaded from `.branchbrief.toml`
//! - Shared types: [`CommitRecord`], [`DiffResult`], [`ParsedOutput`],
//!   [`Strategy`], [`OutputFormat`]

mod config;
mod error;
mod types;
pub mod url;

pub use config::{
    split_ids, BranchbriefConfig, GitConfig, IssuesConfig, LlmConfig, OutputConfig, Provider,
    CONFIG_FILE_NAME, DEFAULT_BRANCH_CANDIDATES, ENV_API_KEY, ENV_CLICKUP_TASKS,
    ENV_CLICKUP_TOKEN, ENV_JIRA_API_TOKEN, ENV_JIRA_BASE_URL, ENV_JIRA_ISSUES, ENV_JIRA_USERNAME,
    ENV_LANGUAGE, ENV_MODEL, ENV_PROVIDER, ENV_PROVIDER_BASE_URL,
};
pub use error::BranchbriefError;
pub use types::{
    CommitRecord, DiffResult, OutputFormat, ParsedOutput, Strategy, MAX_UNIQUE_COMMITS,
    SHORT_HASH_LEN,
};

/// A convenience `Result` type for branchbrief operations.
pub type Result<T> = std::result::Result<T, BranchbriefError>;
