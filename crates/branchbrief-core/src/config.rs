use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::BranchbriefError;
use crate::types::Strategy;

/// Name of the per-project configuration file.
pub const CONFIG_FILE_NAME: &str = ".branchbrief.toml";

/// Default-branch names tried, in order, when the remote HEAD is unknown.
pub const DEFAULT_BRANCH_CANDIDATES: &[&str] = &["main", "master", "dev", "develop"];

/// Environment variables consulted between CLI flags and the config file.
pub const ENV_PROVIDER: &str = "BRANCHBRIEF_PROVIDER";
/// Model override.
pub const ENV_MODEL: &str = "BRANCHBRIEF_MODEL";
/// API key override.
pub const ENV_API_KEY: &str = "BRANCHBRIEF_API_KEY";
/// Provider base URL override.
pub const ENV_PROVIDER_BASE_URL: &str = "BRANCHBRIEF_PROVIDER_BASE_URL";
/// Output language override.
pub const ENV_LANGUAGE: &str = "BRANCHBRIEF_LANGUAGE";
/// ClickUp personal access token.
pub const ENV_CLICKUP_TOKEN: &str = "BRANCHBRIEF_CLICKUP_TOKEN";
/// Comma-separated ClickUp task IDs.
pub const ENV_CLICKUP_TASKS: &str = "BRANCHBRIEF_CLICKUP_TASKS";
/// Jira site URL, e.g. `https://acme.atlassian.net`.
pub const ENV_JIRA_BASE_URL: &str = "BRANCHBRIEF_JIRA_BASE_URL";
/// Jira account email.
pub const ENV_JIRA_USERNAME: &str = "BRANCHBRIEF_JIRA_USERNAME";
/// Jira API token.
pub const ENV_JIRA_API_TOKEN: &str = "BRANCHBRIEF_JIRA_API_TOKEN";
/// Comma-separated Jira issue keys.
pub const ENV_JIRA_ISSUES: &str = "BRANCHBRIEF_JIRA_ISSUES";

/// Top-level configuration loaded from `.branchbrief.toml`.
///
/// Supports layered resolution: CLI flags > env vars > config file > defaults.
///
/// # Examples
///
/// ```
/// use branchbrief_core::BranchbriefConfig;
///
/// let config = BranchbriefConfig::default();
/// assert_eq!(config.git.diff_depth, 50);
/// assert_eq!(config.git.history_depth, 100);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BranchbriefConfig {
    /// Repository and differencing settings.
    #[serde(default)]
    pub git: GitConfig,
    /// Text-generation provider settings.
    #[serde(default)]
    pub llm: LlmConfig,
    /// Prompt and output settings.
    #[serde(default)]
    pub output: OutputConfig,
    /// Issue tracker credentials and the tasks to pull in as context.
    #[serde(default)]
    pub issues: IssuesConfig,
}

impl BranchbriefConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`BranchbriefError::FileNotFound`] if the file is missing,
    /// [`BranchbriefError::Io`] if it cannot be read, or
    /// [`BranchbriefError::Toml`] if the content is not valid TOML.
    pub fn from_file(path: &Path) -> Result<Self, BranchbriefError> {
        if !path.exists() {
            return Err(BranchbriefError::FileNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string, expanding `${VAR}` references
    /// in secret-bearing fields from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`BranchbriefError::Toml`] if parsing fails, or
    /// [`BranchbriefError::Config`] if a value is out of range.
    ///
    /// # Examples
    ///
    /// ```
    /// use branchbrief_core::{BranchbriefConfig, Strategy};
    ///
    /// let toml = r#"
    /// [git]
    /// strategy = "native"
    /// "#;
    /// let config = BranchbriefConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.git.strategy, Strategy::Native);
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, BranchbriefError> {
        let mut config: Self = toml::from_str(content)?;
        config.git.validate()?;
        config.expand_env(&|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Find the nearest config file, walking up from `start`.
    ///
    /// Stops after checking the user's home directory or the filesystem root.
    pub fn discover(start: &Path) -> Option<PathBuf> {
        discover_below(start, dirs::home_dir().as_deref())
    }

    /// Load the explicit file when given, else the discovered one, else defaults.
    ///
    /// # Errors
    ///
    /// Propagates [`BranchbriefConfig::from_file`] errors. A missing explicit
    /// file is an error; a missing discovered file is not.
    pub fn load(explicit: Option<&Path>, cwd: &Path) -> Result<Self, BranchbriefError> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => match Self::discover(cwd) {
                Some(path) => Self::from_file(&path),
                None => Ok(Self::default()),
            },
        }
    }

    /// Overlay `BRANCHBRIEF_*` environment values on top of the file values.
    pub fn apply_env(&mut self, lookup: &dyn Fn(&str) -> Option<String>) {
        let get = |name: &str| lookup(name).filter(|v| !v.is_empty());
        if let Some(provider) = get(ENV_PROVIDER) {
            self.llm.provider = provider;
        }
        if let Some(model) = get(ENV_MODEL) {
            self.llm.model = model;
        }
        if let Some(key) = get(ENV_API_KEY) {
            self.llm.api_key = Some(key);
        }
        if let Some(url) = get(ENV_PROVIDER_BASE_URL) {
            self.llm.base_url = Some(url);
        }
        if let Some(language) = get(ENV_LANGUAGE) {
            self.output.language = language;
        }

        let issues = &mut self.issues;
        if let Some(token) = get(ENV_CLICKUP_TOKEN) {
            issues.clickup_token = Some(token);
        }
        if let Some(tasks) = get(ENV_CLICKUP_TASKS) {
            issues.clickup_tasks = split_ids(&tasks);
        }
        if let Some(url) = get(ENV_JIRA_BASE_URL) {
            issues.jira_base_url = Some(url);
        }
        if let Some(username) = get(ENV_JIRA_USERNAME) {
            issues.jira_username = Some(username);
        }
        if let Some(token) = get(ENV_JIRA_API_TOKEN) {
            issues.jira_api_token = Some(token);
        }
        if let Some(keys) = get(ENV_JIRA_ISSUES) {
            issues.jira_issues = split_ids(&keys);
        }
    }

    fn expand_env(&mut self, lookup: &dyn Fn(&str) -> Option<String>) {
        let expand = |value: &mut Option<String>| {
            if let Some(v) = value.as_mut() {
                *v = expand_vars(v, lookup);
            }
            if value.as_deref().is_some_and(str::is_empty) {
                *value = None;
            }
        };
        expand(&mut self.llm.api_key);
        expand(&mut self.llm.base_url);
        expand(&mut self.issues.clickup_token);
        expand(&mut self.issues.jira_base_url);
        expand(&mut self.issues.jira_username);
        expand(&mut self.issues.jira_api_token);
        if let Some(prompt) = self.output.system_prompt.take() {
            let expanded = expand_vars(&prompt.to_string_lossy(), lookup);
            if !expanded.is_empty() {
                self.output.system_prompt = Some(PathBuf::from(expanded));
            }
        }
    }
}

/// Repository and differencing configuration.
///
/// # Examples
///
/// ```
/// use branchbrief_core::GitConfig;
///
/// let config = GitConfig::default();
/// assert_eq!(config.default_branch_candidates, vec!["main", "master", "dev", "develop"]);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitConfig {
    /// Repository location (URL or path).
    pub repo: Option<String>,
    /// Source branch.
    pub source: Option<String>,
    /// Target branch.
    pub target: Option<String>,
    /// Acquisition strategy (default: library).
    #[serde(default)]
    pub strategy: Strategy,
    /// Fetch depth when only the diff is needed (default: 50).
    #[serde(default = "default_diff_depth")]
    pub diff_depth: u32,
    /// Fetch depth when unique commits are enumerated too (default: 100).
    #[serde(default = "default_history_depth")]
    pub history_depth: u32,
    /// Names tried when the remote HEAD is unknown.
    #[serde(default = "default_branch_candidates")]
    pub default_branch_candidates: Vec<String>,
}

fn default_diff_depth() -> u32 {
    50
}

fn default_history_depth() -> u32 {
    100
}

fn default_branch_candidates() -> Vec<String> {
    DEFAULT_BRANCH_CANDIDATES
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl GitConfig {
    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`BranchbriefError::Config`] for a zero fetch depth, which the
    /// two acquisition strategies would treat differently.
    ///
    /// # Examples
    ///
    /// ```
    /// use branchbrief_core::GitConfig;
    ///
    /// let config = GitConfig { diff_depth: 0, ..GitConfig::default() };
    /// assert!(config.validate().is_err());
    /// assert!(GitConfig::default().validate().is_ok());
    /// ```
    pub fn validate(&self) -> Result<(), BranchbriefError> {
        for (name, depth) in [
            ("diff_depth", self.diff_depth),
            ("history_depth", self.history_depth),
        ] {
            if depth == 0 {
                return Err(BranchbriefError::Config(format!(
                    "git.{name} must be at least 1"
                )));
            }
        }
        Ok(())
    }
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            repo: None,
            source: None,
            target: None,
            strategy: Strategy::default(),
            diff_depth: default_diff_depth(),
            history_depth: default_history_depth(),
            default_branch_candidates: default_branch_candidates(),
        }
    }
}

/// Text-generation provider.
///
/// # Examples
///
/// ```
/// use branchbrief_core::Provider;
///
/// let p: Provider = "Ollama".parse().unwrap();
/// assert_eq!(p.default_base_url(), "http://localhost:11434");
/// assert!(!p.requires_api_key());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    /// OpenAI chat completions.
    OpenAi,
    /// Local Ollama server.
    Ollama,
    /// Google Gemini `generateContent`.
    Gemini,
    /// Open WebUI's OpenAI-compatible endpoint.
    OpenWebUi,
}

impl Provider {
    /// Base URL used when none is configured.
    pub fn default_base_url(self) -> &'static str {
        match self {
            Provider::OpenAi => "https://api.openai.com",
            Provider::Ollama => "http://localhost:11434",
            Provider::Gemini => "https://generativelanguage.googleapis.com",
            Provider::OpenWebUi => "http://localhost:3000",
        }
    }

    /// Whether the hosted API refuses anonymous requests.
    pub fn requires_api_key(self) -> bool {
        matches!(self, Provider::OpenAi | Provider::Gemini)
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::OpenAi => write!(f, "openai"),
            Provider::Ollama => write!(f, "ollama"),
            Provider::Gemini => write!(f, "gemini"),
            Provider::OpenWebUi => write!(f, "openwebui"),
        }
    }
}

impl FromStr for Provider {
    type Err = BranchbriefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAi),
            "ollama" => Ok(Provider::Ollama),
            "gemini" => Ok(Provider::Gemini),
            "openwebui" => Ok(Provider::OpenWebUi),
            other => Err(BranchbriefError::Config(format!(
                "unknown provider '{other}' (expected openai, ollama, gemini, or openwebui)"
            ))),
        }
    }
}

/// Text-generation provider configuration.
///
/// # Examples
///
/// ```
/// use branchbrief_core::LlmConfig;
///
/// let config = LlmConfig::default();
/// assert_eq!(config.provider, "openai");
/// assert_eq!(config.model, "gpt-4o");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider name (`openai`, `ollama`, `gemini`, `openwebui`).
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Model identifier.
    #[serde(default = "default_model")]
    pub model: String,
    /// API key for the provider.
    pub api_key: Option<String>,
    /// Custom base URL for API requests.
    pub base_url: Option<String>,
}

fn default_provider() -> String {
    "openai".into()
}

fn default_model() -> String {
    "gpt-4o".into()
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            api_key: None,
            base_url: None,
        }
    }
}

impl LlmConfig {
    /// Parse and check the provider settings.
    ///
    /// # Errors
    ///
    /// Returns [`BranchbriefError::Config`] for an unknown provider, an empty
    /// model, or a missing key for providers that require one.
    pub fn validate(&self) -> Result<Provider, BranchbriefError> {
        let provider: Provider = self.provider.parse()?;
        if self.model.trim().is_empty() {
            return Err(BranchbriefError::Config("model is required".into()));
        }
        if provider.requires_api_key() && self.api_key.as_deref().unwrap_or("").is_empty() {
            return Err(BranchbriefError::Config(format!(
                "an API key is required for provider '{provider}'"
            )));
        }
        Ok(provider)
    }

    /// Configured base URL or the provider default, without a trailing slash.
    pub fn resolved_base_url(&self, provider: Provider) -> String {
        self.base_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .unwrap_or(provider.default_base_url())
            .trim_end_matches('/')
            .to_string()
    }
}

/// Prompt and output configuration.
///
/// # Examples
///
/// ```
/// use branchbrief_core::OutputConfig;
///
/// let config = OutputConfig::default();
/// assert_eq!(config.language, "en");
/// assert!(config.file.is_none());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Language of the generated description (default: `en`).
    #[serde(default = "default_language")]
    pub language: String,
    /// File replacing the embedded base prompt.
    pub system_prompt: Option<PathBuf>,
    /// File the final description is written to.
    pub file: Option<PathBuf>,
}

fn default_language() -> String {
    "en".into()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            language: default_language(),
            system_prompt: None,
            file: None,
        }
    }
}

/// Issue tracker settings (`[issues]`).
///
/// Task IDs usually come from flags, one run per pull request; credentials
/// usually live in the file or the environment.
///
/// # Examples
///
/// ```
/// use branchbrief_core::IssuesConfig;
///
/// let config = IssuesConfig {
///     clickup_tasks: vec!["86a1b2c3".into()],
///     ..IssuesConfig::default()
/// };
/// assert!(config.validate().is_err());
/// assert!(IssuesConfig::default().validate().is_ok());
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IssuesConfig {
    /// ClickUp personal access token.
    pub clickup_token: Option<String>,
    /// ClickUp task IDs to fetch.
    #[serde(default)]
    pub clickup_tasks: Vec<String>,
    /// Jira site URL.
    pub jira_base_url: Option<String>,
    /// Jira account email.
    pub jira_username: Option<String>,
    /// Jira API token.
    pub jira_api_token: Option<String>,
    /// Jira issue keys to fetch.
    #[serde(default)]
    pub jira_issues: Vec<String>,
}

impl IssuesConfig {
    /// Check that requested tasks come with the credentials to fetch them.
    ///
    /// # Errors
    ///
    /// Returns [`BranchbriefError::Config`] naming the first missing setting.
    pub fn validate(&self) -> Result<(), BranchbriefError> {
        let missing = |value: &Option<String>| value.as_deref().map_or(true, str::is_empty);
        if !self.clickup_tasks.is_empty() && missing(&self.clickup_token) {
            return Err(BranchbriefError::Config(
                "ClickUp tasks were requested but no ClickUp token is set".into(),
            ));
        }
        if !self.jira_issues.is_empty() {
            for (name, value) in [
                ("jira_base_url", &self.jira_base_url),
                ("jira_username", &self.jira_username),
                ("jira_api_token", &self.jira_api_token),
            ] {
                if missing(value) {
                    return Err(BranchbriefError::Config(format!(
                        "Jira issues were requested but issues.{name} is not set"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Split a comma-separated ID list, dropping blanks.
///
/// # Examples
///
/// ```
/// use branchbrief_core::split_ids;
///
/// assert_eq!(split_ids(" HIP-1, ,HIP-2 "), vec!["HIP-1", "HIP-2"]);
/// ```
pub fn split_ids(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(String::from)
        .collect()
}

/// Expand `${NAME}` and `$NAME` references; unknown names expand to "".
fn expand_vars(input: &str, lookup: &dyn Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(dollar) = rest.find('$') {
        out.push_str(&rest[..dollar]);
        let after = &rest[dollar + 1..];
        if let Some((name, tail)) = after
            .strip_prefix('{')
            .and_then(|braced| braced.split_once('}'))
        {
            out.push_str(&lookup(name).unwrap_or_default());
            rest = tail;
            continue;
        }
        let len = after
            .find(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '_'))
            .unwrap_or(after.len());
        if len == 0 {
            out.push('$');
        } else {
            out.push_str(&lookup(&after[..len]).unwrap_or_default());
        }
        rest = &after[len..];
    }
    out.push_str(rest);
    out
}

fn discover_below(start: &Path, home: Option<&Path>) -> Option<PathBuf> {
    let mut dir = Some(start);
    while let Some(current) = dir {
        let candidate = current.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            return Some(candidate);
        }
        if home == Some(current) {
            break;
        }
        dir = current.parent();
    }
    None
}
