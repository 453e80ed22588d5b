use std::path::Path;

use branchbrief_core::url::display_url;
use branchbrief_core::{BranchbriefError, CommitRecord, DiffResult};

const BASE_PROMPT: &str = "\
You are an experienced software engineer writing a pull request description \
for the branch changes below.

Rules:
- Summarize what changed and why, based only on the diff, commits, and context
- Group related changes; mention breaking changes and migration steps explicitly
- Keep the title short, imperative, and under 80 characters
- Use markdown in the body (headings, bullet lists, code spans)
- Do not invent tickets, links, or behavior you cannot see in the diff

Respond with a JSON object and nothing else:
{
  \"title\": \"Concise pull request title\",
  \"body\": \"Markdown description of the changes\"
}";

const FINAL_INSTRUCTION: &str = "**Analyze the above information and write the pull request \
description in the JSON format specified above.**";

/// Build the system prompt: the base template plus an optional language instruction.
///
/// `template` replaces the built-in base prompt when given.
///
/// # Examples
///
/// ```
/// use branchbrief_describe::prompt::build_system_prompt;
///
/// let prompt = build_system_prompt(None, "en");
/// assert!(prompt.contains("\"title\""));
///
/// let prompt = build_system_prompt(None, "tr");
/// assert!(prompt.contains("Turkish"));
/// ```
pub fn build_system_prompt(template: Option<&str>, language: &str) -> String {
    let mut prompt = template.unwrap_or(BASE_PROMPT).trim_end().to_string();
    if let Some(name) = language_name(language) {
        prompt.push_str(&format!(
            "\n\nWrite the title and body in {name}. Keep the JSON keys in English."
        ));
    }
    prompt
}

/// Read a custom base prompt from disk.
///
/// # Errors
///
/// Returns [`BranchbriefError::FileNotFound`] if the file does not exist, or
/// [`BranchbriefError::Io`] if it cannot be read.
pub fn load_template(path: &Path) -> Result<String, BranchbriefError> {
    if !path.exists() {
        return Err(BranchbriefError::FileNotFound(path.to_path_buf()));
    }
    Ok(std::fs::read_to_string(path)?)
}

/// Build the user prompt: context, commits, diff, and repository sections.
///
/// # Examples
///
/// ```
/// use branchbrief_core::DiffResult;
/// use branchbrief_describe::prompt::build_user_prompt;
///
/// let diff = DiffResult {
///     diff_text: "+new line".into(),
///     commits: vec![],
///     default_branch: "main".into(),
///     commits_degraded: false,
/// };
/// let prompt = build_user_prompt(&diff, Some("Closes the login bug"), Some("git@github.com:o/r.git"));
/// assert!(prompt.contains("```diff\n+new line\n```"));
/// assert!(prompt.contains("**Repository**: https://github.com/o/r"));
/// assert!(prompt.contains("Closes the login bug"));
/// ```
pub fn build_user_prompt(
    diff: &DiffResult,
    issue_context: Option<&str>,
    repo_location: Option<&str>,
) -> String {
    let mut prompt = String::new();

    if let Some(context) = issue_context.map(str::trim).filter(|c| !c.is_empty()) {
        prompt.push_str("## Issue Context\n\n```\n");
        prompt.push_str(context);
        prompt.push_str("\n```\n\n");
    }

    if !diff.commits.is_empty() {
        prompt.push_str("## Commit History\n\n");
        for commit in &diff.commits {
            prompt.push_str(&commit_line(commit));
        }
        prompt.push('\n');
    }

    prompt.push_str("## Changes\n\n```diff\n");
    prompt.push_str(diff.diff_text.trim_end());
    prompt.push_str("\n```\n\n");

    if let Some(url) = repo_location
        .map(display_url)
        .filter(|url| !url.is_empty())
    {
        prompt.push_str(&format!("**Repository**: {url}\n"));
        prompt.push_str(&format!("**Default Branch**: {}\n\n", diff.default_branch));
    }

    prompt.push_str(FINAL_INSTRUCTION);
    prompt
}

fn commit_line(commit: &CommitRecord) -> String {
    format!(
        "- **{}**: {}\n  *By {} on {}*\n",
        commit.short_hash,
        commit.subject(),
        commit.author_name,
        commit.author_time.format("%Y-%m-%d %H:%M"),
    )
}

/// English name for a language code; `None` for English.
fn language_name(code: &str) -> Option<String> {
    let code = code.trim();
    let name = match code.to_lowercase().as_str() {
        "" | "en" | "english" => return None,
        "tr" => "Turkish",
        "de" => "German",
        "fr" => "French",
        "es" => "Spanish",
        "it" => "Italian",
        "pt" => "Portuguese",
        "nl" => "Dutch",
        "ru" => "Russian",
        "ja" => "Japanese",
        "zh" => "Chinese",
        "ko" => "Korean",
        _ => code,
    };
    Some(name.to_string())
}
