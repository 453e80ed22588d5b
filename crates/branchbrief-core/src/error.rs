use std::path::PathBuf;

/// Errors that can occur across branchbrief.
///
/// Library crates use this type directly; the binary converts to
/// `miette::Report` at the boundary.
///
/// # Examples
///
/// ```
/// use branchbrief_core::BranchbriefError;
///
/// let err = BranchbriefError::BranchNotFound {
///     branch: "feature/login".into(),
/// };
/// assert!(err.to_string().contains("feature/login"));
/// ```
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum BranchbriefError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    #[diagnostic(code(branchbrief::io))]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    #[diagnostic(code(branchbrief::config))]
    Config(String),

    /// Local git operation failure outside the differencing engine.
    #[error("git error: {0}")]
    #[diagnostic(code(branchbrief::git))]
    Git(String),

    /// Initialising, fetching from, or talking to the remote failed.
    #[error("remote access failed: {message}")]
    #[diagnostic(
        code(branchbrief::remote_access),
        help("check the repository URL and your credentials")
    )]
    RemoteAccess {
        /// What failed and the underlying transport error.
        message: String,
        /// Captured `git` output, when the native strategy produced any.
        output: Option<String>,
    },

    /// A requested branch does not exist on the remote.
    #[error("branch '{branch}' was not found on the remote")]
    #[diagnostic(code(branchbrief::branch_not_found))]
    BranchNotFound {
        /// Branch name with any `origin/` prefix removed.
        branch: String,
    },

    /// A requested branch exists in the local checkout but was never pushed.
    #[error("branch '{branch}' exists only locally and is missing on the remote")]
    #[diagnostic(
        code(branchbrief::remote_ref_missing),
        help("push it first: git push --set-upstream origin {branch}")
    )]
    RemoteRefMissing {
        /// Branch name with any `origin/` prefix removed.
        branch: String,
    },

    /// The unified diff between the branch tips could not be produced.
    #[error("failed to generate diff: {0}")]
    #[diagnostic(code(branchbrief::diff_generation))]
    DiffGeneration(String),

    /// Commit enumeration failed; callers continue with an empty commit list.
    #[error("commit enumeration degraded: {0}")]
    #[diagnostic(code(branchbrief::commits_degraded), severity(Warning))]
    CommitEnumerationDegraded(String),

    /// The text generator returned nothing but whitespace.
    #[error("empty response from the text generator")]
    #[diagnostic(
        code(branchbrief::empty_response),
        help("try again, or pick a different model")
    )]
    EmptyGeneratedResponse,

    /// Text-generation API or response error.
    #[error("LLM error: {0}")]
    #[diagnostic(code(branchbrief::llm))]
    Llm(String),

    /// ClickUp or Jira request failure.
    #[error("issue tracker error: {0}")]
    #[diagnostic(
        code(branchbrief::issue_tracker),
        help("check the tracker credentials and the task IDs")
    )]
    IssueTracker(String),

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    #[diagnostic(code(branchbrief::serialization))]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    #[diagnostic(code(branchbrief::toml))]
    Toml(#[from] toml::de::Error),

    /// A required file was not found.
    #[error("file not found: {}", .0.display())]
    #[diagnostic(code(branchbrief::file_not_found))]
    FileNotFound(PathBuf),
}

impl BranchbriefError {
    /// Build a [`BranchbriefError::RemoteAccess`] without captured output.
    pub fn remote(message: impl Into<String>) -> Self {
        Self::RemoteAccess {
            message: message.into(),
            output: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: BranchbriefError = io_err.into();
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn config_error_displays_message() {
        let err = BranchbriefError::Config("bad value".into());
        assert_eq!(err.to_string(), "configuration error: bad value");
    }

    #[test]
    fn remote_ref_missing_suggests_push() {
        use miette::Diagnostic;

        let err = BranchbriefError::RemoteRefMissing {
            branch: "feature/x".into(),
        };
        let help = err.help().map(|h| h.to_string()).unwrap_or_default();
        assert_eq!(help, "push it first: git push --set-upstream origin feature/x");
    }

    #[test]
    fn remote_helper_has_no_output() {
        let err = BranchbriefError::remote("connection refused");
        match err {
            BranchbriefError::RemoteAccess { message, output } => {
                assert_eq!(message, "connection refused");
                assert!(output.is_none());
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn file_not_found_shows_path() {
        let err = BranchbriefError::FileNotFound(PathBuf::from("/tmp/missing.md"));
        assert!(err.to_string().contains("/tmp/missing.md"));
    }
}
