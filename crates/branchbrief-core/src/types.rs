use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Maximum number of unique commits reported for a branch pair.
pub const MAX_UNIQUE_COMMITS: usize = 20;

/// Number of hex digits kept in [`CommitRecord::short_hash`].
pub const SHORT_HASH_LEN: usize = 8;

/// A commit that exists on the source branch but not on the target.
///
/// # Examples
///
/// ```
/// use branchbrief_core::CommitRecord;
/// use chrono::DateTime;
///
/// let when = DateTime::parse_from_rfc3339("2024-05-01T10:30:00+02:00").unwrap();
/// let record = CommitRecord::new(
///     "0123456789abcdef0123456789abcdef01234567",
///     "feat: add login",
///     "Alice",
///     "alice@example.com",
///     when,
/// );
/// assert_eq!(record.short_hash, "01234567");
/// assert_eq!(record.subject(), "feat: add login");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitRecord {
    /// Full 40-character object id.
    pub full_hash: String,
    /// First eight characters of the object id.
    pub short_hash: String,
    /// Commit message with surrounding whitespace trimmed.
    pub message: String,
    /// Author name.
    pub author_name: String,
    /// Author email.
    pub author_email: String,
    /// Author timestamp with the author's UTC offset.
    pub author_time: DateTime<FixedOffset>,
}

impl CommitRecord {
    /// Build a record, deriving the short hash and trimming the message.
    pub fn new(
        full_hash: impl Into<String>,
        message: &str,
        author_name: impl Into<String>,
        author_email: impl Into<String>,
        author_time: DateTime<FixedOffset>,
    ) -> Self {
        let full_hash = full_hash.into();
        let short_hash: String = full_hash.chars().take(SHORT_HASH_LEN).collect();
        Self {
            full_hash,
            short_hash,
            message: message.trim().to_string(),
            author_name: author_name.into(),
            author_email: author_email.into(),
            author_time,
        }
    }

    /// First line of the message.
    pub fn subject(&self) -> &str {
        self.message.lines().next().unwrap_or("")
    }
}

/// Output of the branch differencing engine.
///
/// # Examples
///
/// ```
/// use branchbrief_core::DiffResult;
///
/// let result = DiffResult {
///     diff_text: String::new(),
///     commits: vec![],
///     default_branch: "main".into(),
///     commits_degraded: false,
/// };
/// assert!(result.is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffResult {
    /// Unified diff from the target tip to the source tip.
    pub diff_text: String,
    /// Commits unique to the source branch, newest first.
    pub commits: Vec<CommitRecord>,
    /// The remote's default branch.
    pub default_branch: String,
    /// `true` when commit enumeration failed and `commits` was left empty.
    #[serde(default)]
    pub commits_degraded: bool,
}

impl DiffResult {
    /// `true` when the branches have identical content.
    pub fn is_empty(&self) -> bool {
        self.diff_text.trim().is_empty()
    }
}

/// Strict `{title, body}` record recovered from generated text.
///
/// # Examples
///
/// ```
/// use branchbrief_core::ParsedOutput;
///
/// let out = ParsedOutput {
///     title: "Fix bug".into(),
///     body: "Details".into(),
/// };
/// assert_eq!(out.to_markdown(), "# Fix bug\n\nDetails\n");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedOutput {
    /// Title, at most 80 characters.
    pub title: String,
    /// Free-form body.
    pub body: String,
}

impl ParsedOutput {
    /// Render as a markdown document with the title as a top-level heading.
    pub fn to_markdown(&self) -> String {
        format!("# {}\n\n{}\n", self.title, self.body)
    }
}

/// How the differencing engine acquires repository state.
///
/// # Examples
///
/// ```
/// use branchbrief_core::Strategy;
///
/// assert_eq!("fast".parse::<Strategy>().unwrap(), Strategy::Native);
/// assert_eq!(Strategy::default(), Strategy::Library);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Embedded libgit2 via `git2`.
    #[default]
    Library,
    /// Shell out to the `git` binary.
    #[serde(alias = "fast")]
    Native,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Library => write!(f, "library"),
            Strategy::Native => write!(f, "native"),
        }
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "library" | "lib" => Ok(Strategy::Library),
            "native" | "fast" => Ok(Strategy::Native),
            other => Err(format!("unknown strategy: {other}")),
        }
    }
}

/// Output format for CLI subcommands.
///
/// Implements [`FromStr`] so it can be used directly with `clap` argument parsing.
///
/// # Examples
///
/// ```
/// use branchbrief_core::OutputFormat;
///
/// let fmt: OutputFormat = "json".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Json);
///
/// let fmt: OutputFormat = "md".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Markdown);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable summary.
    #[default]
    Text,
    /// Machine-readable JSON.
    Json,
    /// Markdown document.
    Markdown,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}
