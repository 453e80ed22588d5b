//! Issue context from ClickUp tasks and Jira issues.
//!
//! Each tracker is asked for the task itself and its comments. A failed
//! comment fetch is logged and skipped; a failed task fetch aborts. The
//! fetched tasks are rendered as markdown and handed to the prompt as the
//! issue context.

use std::time::Duration;

use branchbrief_core::{BranchbriefError, IssuesConfig};
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// ClickUp REST API root.
pub const CLICKUP_API: &str = "https://api.clickup.com/api/v2";

const TIMEOUT: Duration = Duration::from_secs(30);
const RULE_WIDTH: usize = 80;

fn http_client() -> Result<reqwest::Client, BranchbriefError> {
    reqwest::Client::builder()
        .timeout(TIMEOUT)
        .build()
        .map_err(|e| BranchbriefError::IssueTracker(format!("failed to create HTTP client: {e}")))
}

async fn read_json<T: DeserializeOwned>(
    tracker: &str,
    request: reqwest::RequestBuilder,
) -> Result<T, BranchbriefError> {
    let response = request
        .header(reqwest::header::ACCEPT, "application/json")
        .send()
        .await
        .map_err(|e| BranchbriefError::IssueTracker(format!("{tracker} request failed: {e}")))?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(BranchbriefError::IssueTracker(format!(
            "{tracker} API error {status}: {body}"
        )));
    }
    response
        .json()
        .await
        .map_err(|e| BranchbriefError::IssueTracker(format!("failed to parse {tracker} response: {e}")))
}

/// ClickUp API client authenticated with a personal access token.
pub struct ClickUpClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

/// A ClickUp task with its comments.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ClickUpTask {
    /// Task ID.
    pub id: String,
    /// Task name.
    pub name: String,
    /// Markdown description.
    pub description: String,
    /// Plain-text description, used when `description` is empty.
    pub text_content: String,
    /// Workflow status.
    pub status: ClickUpStatus,
    /// Task author.
    pub creator: ClickUpUser,
    /// Link to the task.
    pub url: String,
    /// Comments, each with its replies.
    #[serde(skip)]
    pub comments: Vec<ClickUpComment>,
}

/// ClickUp workflow status.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ClickUpStatus {
    /// Status name.
    pub status: String,
}

/// ClickUp user reference.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ClickUpUser {
    /// Display name.
    pub username: String,
}

/// A ClickUp comment thread entry.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ClickUpComment {
    /// Comment ID.
    pub id: String,
    /// Rich-text blocks making up the comment.
    pub comment: Vec<ClickUpText>,
    /// Author.
    pub user: ClickUpUser,
    /// Creation time as reported by the API (epoch milliseconds).
    pub date_created: String,
    /// Number of replies.
    pub reply_count: u32,
    /// Replies, fetched separately.
    #[serde(skip)]
    pub replies: Vec<ClickUpComment>,
}

/// One rich-text block of a ClickUp comment.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ClickUpText {
    /// Text content.
    pub text: String,
}

#[derive(Deserialize)]
struct ClickUpComments {
    #[serde(default)]
    comments: Vec<ClickUpComment>,
}

impl ClickUpClient {
    /// Client for the public ClickUp API.
    ///
    /// # Errors
    ///
    /// Returns [`BranchbriefError::IssueTracker`] if the HTTP client cannot be built.
    pub fn new(token: impl Into<String>) -> Result<Self, BranchbriefError> {
        Ok(Self {
            client: http_client()?,
            base_url: CLICKUP_API.to_string(),
            token: token.into(),
        })
    }

    /// Point the client at another API root.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Fetch a task, its comments, and the replies to those comments.
    ///
    /// # Errors
    ///
    /// Returns [`BranchbriefError::IssueTracker`] when the task itself cannot
    /// be fetched. Comment failures are logged and leave the list empty.
    pub async fn task(&self, id: &str) -> Result<ClickUpTask, BranchbriefError> {
        let mut task: ClickUpTask = self.get(&format!("task/{id}")).await?;
        if task.description.is_empty() {
            task.description = std::mem::take(&mut task.text_content);
        }
        match self.comments(&format!("task/{id}/comment")).await {
            Ok(mut comments) => {
                for comment in comments.iter_mut().filter(|c| c.reply_count > 0) {
                    match self.comments(&format!("comment/{}/reply", comment.id)).await {
                        Ok(replies) => comment.replies = replies,
                        Err(e) => tracing::warn!(comment = %comment.id, "skipping replies: {e}"),
                    }
                }
                task.comments = comments;
            }
            Err(e) => tracing::warn!(task = id, "skipping comments: {e}"),
        }
        Ok(task)
    }

    async fn comments(&self, path: &str) -> Result<Vec<ClickUpComment>, BranchbriefError> {
        let list: ClickUpComments = self.get(path).await?;
        Ok(list.comments)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, BranchbriefError> {
        let url = format!("{}/{path}", self.base_url);
        tracing::debug!(%url, "fetching from ClickUp");
        let request = self
            .client
            .get(&url)
            .header(reqwest::header::AUTHORIZATION, &self.token);
        read_json("ClickUp", request).await
    }
}

impl ClickUpTask {
    /// Render the task and its comment threads as markdown.
    pub fn to_markdown(&self) -> String {
        let mut out = format!(
            "**ClickUp Task: {}**\n\n\
             **Task ID:** {}\n\
             **Status:** {}\n\
             **Creator:** {}\n\
             **Task URL:** {}\n\n\
             **Description:**\n{}",
            self.name, self.id, self.status.status, self.creator.username, self.url, self.description
        );
        if self.comments.is_empty() {
            return out;
        }
        out.push_str("\n\n**Comments:**\n");
        for (i, comment) in self.comments.iter().enumerate() {
            out.push_str(&format!(
                "\n---\n**Comment {}** (by {} on {}):\n",
                i + 1,
                comment.user.username,
                comment.date_created
            ));
            for block in &comment.comment {
                out.push_str(&block.text);
                out.push('\n');
            }
            if comment.replies.is_empty() {
                continue;
            }
            out.push_str("\n  **Replies:**\n");
            for (j, reply) in comment.replies.iter().enumerate() {
                out.push_str(&format!(
                    "  **Reply {}** (by {} on {}):\n",
                    j + 1,
                    reply.user.username,
                    reply.date_created
                ));
                for block in &reply.comment {
                    out.push_str("    ");
                    out.push_str(&block.text);
                    out.push('\n');
                }
                out.push('\n');
            }
        }
        out
    }
}

/// Jira Cloud client using basic auth with an API token.
pub struct JiraClient {
    client: reqwest::Client,
    base_url: String,
    username: String,
    api_token: String,
}

/// A Jira issue with its comments.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct JiraIssue {
    /// Issue key, e.g. `HIP-1234`.
    pub key: String,
    /// Issue fields.
    pub fields: JiraFields,
    /// Browser link, filled in by the client.
    #[serde(skip)]
    pub url: String,
    /// Comments in creation order.
    #[serde(skip)]
    pub comments: Vec<JiraComment>,
}

/// The subset of Jira issue fields used as context.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct JiraFields {
    /// One-line summary.
    pub summary: String,
    /// Description as plain text or an Atlassian document.
    pub description: serde_json::Value,
    /// Workflow status.
    pub status: JiraNamed,
    /// Issue type.
    #[serde(rename = "issuetype")]
    pub issue_type: JiraNamed,
    /// Author.
    pub creator: Option<JiraPerson>,
    /// Reporter.
    pub reporter: Option<JiraPerson>,
}

/// A named Jira entity (status, issue type).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct JiraNamed {
    /// Display name.
    pub name: String,
}

/// A Jira user reference.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct JiraPerson {
    /// Display name.
    pub display_name: String,
}

/// A Jira comment.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct JiraComment {
    /// Body as plain text or an Atlassian document.
    pub body: serde_json::Value,
    /// Author.
    pub author: Option<JiraPerson>,
    /// Creation timestamp.
    pub created: String,
}

#[derive(Deserialize)]
struct JiraComments {
    #[serde(default)]
    comments: Vec<JiraComment>,
}

impl JiraClient {
    /// Client for the Jira site at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`BranchbriefError::IssueTracker`] if the HTTP client cannot be built.
    pub fn new(
        base_url: &str,
        username: impl Into<String>,
        api_token: impl Into<String>,
    ) -> Result<Self, BranchbriefError> {
        Ok(Self {
            client: http_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            username: username.into(),
            api_token: api_token.into(),
        })
    }

    /// Fetch an issue and its comments.
    ///
    /// # Errors
    ///
    /// Returns [`BranchbriefError::IssueTracker`] when the issue itself cannot
    /// be fetched. A comment failure is logged and leaves the list empty.
    pub async fn issue(&self, key: &str) -> Result<JiraIssue, BranchbriefError> {
        let mut issue: JiraIssue = self.get(&format!("issue/{key}")).await?;
        issue.url = format!("{}/browse/{}", self.base_url, issue.key);
        match self.get::<JiraComments>(&format!("issue/{key}/comment")).await {
            Ok(list) => issue.comments = list.comments,
            Err(e) => tracing::warn!(issue = key, "skipping comments: {e}"),
        }
        Ok(issue)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, BranchbriefError> {
        let url = format!("{}/rest/api/3/{path}", self.base_url);
        tracing::debug!(%url, "fetching from Jira");
        let request = self
            .client
            .get(&url)
            .basic_auth(&self.username, Some(&self.api_token));
        read_json("Jira", request).await
    }
}

impl JiraIssue {
    /// Render the issue and its comments as markdown.
    pub fn to_markdown(&self) -> String {
        let name = |person: &Option<JiraPerson>| {
            person
                .as_ref()
                .map(|p| p.display_name.clone())
                .unwrap_or_default()
        };
        let fields = &self.fields;
        let mut out = format!(
            "**Jira Issue: {summary} - {key}**\n\n\
             **Issue Key:** {key}\n\
             **Issue Type:** {kind}\n\
             **Status:** {status}\n\
             **Creator:** {creator}\n\
             **Reporter:** {reporter}\n\
             **Issue URL:** {url}\n\n\
             **Description:**\n{description}",
            summary = fields.summary,
            key = self.key,
            kind = fields.issue_type.name,
            status = fields.status.name,
            creator = name(&fields.creator),
            reporter = name(&fields.reporter),
            url = self.url,
            description = document_text(&fields.description),
        );
        if self.comments.is_empty() {
            return out;
        }
        out.push_str("\n\n**Comments:**\n");
        for (i, comment) in self.comments.iter().enumerate() {
            out.push_str(&format!(
                "\n---\n**Comment {}** (by {} on {}):\n{}\n",
                i + 1,
                name(&comment.author),
                comment.created,
                document_text(&comment.body)
            ));
        }
        out
    }
}

/// Plain text of a Jira rich-text value: a string, or an Atlassian document
/// whose paragraphs and headings end in newlines.
pub fn document_text(value: &serde_json::Value) -> String {
    fn walk(node: &serde_json::Value, out: &mut String) {
        if let Some(text) = node.get("text").and_then(|t| t.as_str()) {
            out.push_str(text);
        }
        for child in node
            .get("content")
            .and_then(|c| c.as_array())
            .into_iter()
            .flatten()
        {
            walk(child, out);
            if matches!(
                child.get("type").and_then(|t| t.as_str()),
                Some("paragraph" | "heading")
            ) {
                out.push('\n');
            }
        }
    }

    match value {
        serde_json::Value::String(text) => text.clone(),
        serde_json::Value::Object(_) => {
            let mut out = String::new();
            walk(value, &mut out);
            out
        }
        _ => String::new(),
    }
}

/// Join rendered tasks; more than one gets a header and numbered sections.
fn combine(tracker: &str, noun: &str, plural: &str, sections: Vec<String>) -> String {
    if sections.len() == 1 {
        return sections.into_iter().next().unwrap_or_default();
    }
    let total = sections.len();
    let mut out = format!(
        "**Multiple {tracker} {plural} ({total} {})**\n\n{}\n\n",
        plural.to_lowercase(),
        "=".repeat(RULE_WIDTH)
    );
    for (i, section) in sections.iter().enumerate() {
        out.push_str(&format!("### {noun} {} of {total}\n\n{section}", i + 1));
        if i + 1 < total {
            out.push_str(&format!("\n\n{}\n\n", "-".repeat(RULE_WIDTH)));
        }
    }
    out
}

/// Fetch and render ClickUp tasks, in order.
///
/// # Errors
///
/// [`BranchbriefError::Config`] for an empty ID list, otherwise the first
/// failed task fetch.
pub async fn fetch_clickup_tasks(
    client: &ClickUpClient,
    ids: &[String],
) -> Result<String, BranchbriefError> {
    if ids.is_empty() {
        return Err(BranchbriefError::Config("no ClickUp task IDs given".into()));
    }
    let mut sections = Vec::with_capacity(ids.len());
    for id in ids {
        let task = client.task(id).await.map_err(|e| {
            BranchbriefError::IssueTracker(format!("failed to fetch ClickUp task {id}: {e}"))
        })?;
        tracing::debug!(task = %task.id, comments = task.comments.len(), "fetched ClickUp task");
        sections.push(task.to_markdown());
    }
    Ok(combine("ClickUp", "Task", "Tasks", sections))
}

/// Fetch and render Jira issues, in order.
///
/// # Errors
///
/// [`BranchbriefError::Config`] for an empty key list, otherwise the first
/// failed issue fetch.
pub async fn fetch_jira_issues(
    client: &JiraClient,
    keys: &[String],
) -> Result<String, BranchbriefError> {
    if keys.is_empty() {
        return Err(BranchbriefError::Config("no Jira issue keys given".into()));
    }
    let mut sections = Vec::with_capacity(keys.len());
    for key in keys {
        let issue = client.issue(key).await.map_err(|e| {
            BranchbriefError::IssueTracker(format!("failed to fetch Jira issue {key}: {e}"))
        })?;
        tracing::debug!(issue = %issue.key, comments = issue.comments.len(), "fetched Jira issue");
        sections.push(issue.to_markdown());
    }
    Ok(combine("Jira", "Issue", "Issues", sections))
}

/// Issue context for the prompt: requested ClickUp tasks, then Jira issues,
/// then the free-text description, separated by blank lines.
///
/// Returns `None` when none of them is present.
///
/// # Errors
///
/// Configuration errors from [`IssuesConfig::validate`] and tracker failures.
pub async fn issue_context(
    config: &IssuesConfig,
    description: Option<&str>,
) -> Result<Option<String>, BranchbriefError> {
    config.validate()?;
    let mut parts = Vec::new();

    if !config.clickup_tasks.is_empty() {
        let token = config.clickup_token.clone().unwrap_or_default();
        let client = ClickUpClient::new(token)?;
        parts.push(fetch_clickup_tasks(&client, &config.clickup_tasks).await?);
    }
    if !config.jira_issues.is_empty() {
        let client = JiraClient::new(
            config.jira_base_url.as_deref().unwrap_or_default(),
            config.jira_username.clone().unwrap_or_default(),
            config.jira_api_token.clone().unwrap_or_default(),
        )?;
        parts.push(fetch_jira_issues(&client, &config.jira_issues).await?);
    }
    if let Some(text) = description.map(str::trim).filter(|t| !t.is_empty()) {
        parts.push(text.to_string());
    }

    Ok((!parts.is_empty()).then(|| parts.join("\n\n")))
}
