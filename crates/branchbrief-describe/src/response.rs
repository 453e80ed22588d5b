//! Normalization of generated text into a `{title, body}` record.
//!
//! Generators do not reliably honour the requested output format, so the
//! parser tries a fixed cascade of strategies and takes the first match.

use branchbrief_core::{BranchbriefError, ParsedOutput};
use serde::Deserialize;

/// Maximum title length in characters, including the ellipsis.
pub const MAX_TITLE_CHARS: usize = 80;

const ELLIPSIS: &str = "...";

/// Prefixes removed from the start of a title, each in turn, longest first
/// where they overlap.
const TITLE_PREFIXES: &[&str] = &[
    "📋 **Title:**",
    "**Title:**",
    "Pull Request Title:",
    "PR Title:",
    "Title:",
    "Başlık:",
    "Titre:",
    "Título:",
    "Titel:",
    "Titolo:",
];

/// A single extraction strategy.
type Extractor = fn(&str) -> Option<ParsedOutput>;

/// Strategies in the order they are tried.
const STRATEGIES: &[(&str, Extractor)] = &[
    ("fenced json", fenced_json),
    ("bare json", bare_json),
    ("markdown heading", markdown_heading),
    ("legacy prefix", legacy_prefix),
    ("first line", first_line),
];

#[derive(Deserialize)]
struct JsonOutput {
    title: String,
    #[serde(default)]
    body: String,
}

/// Parse generated text into a [`ParsedOutput`].
///
/// # Errors
///
/// Returns [`BranchbriefError::EmptyGeneratedResponse`] when `response` has
/// no non-blank content. Every other input yields a result.
///
/// # Examples
///
/// ```
/// use branchbrief_describe::response::parse_response;
///
/// let out = parse_response("```json\n{\"title\":\"Fix bug\",\"body\":\"Details\"}\n```").unwrap();
/// assert_eq!(out.title, "Fix bug");
/// assert_eq!(out.body, "Details");
///
/// let out = parse_response("# Add login\n\nImplements OAuth").unwrap();
/// assert_eq!(out.title, "Add login");
/// assert_eq!(out.body, "Implements OAuth");
/// ```
pub fn parse_response(response: &str) -> Result<ParsedOutput, BranchbriefError> {
    let text = response.trim();
    if text.is_empty() {
        return Err(BranchbriefError::EmptyGeneratedResponse);
    }

    STRATEGIES
        .iter()
        .find_map(|(name, strategy)| {
            let parsed = strategy(text)?;
            tracing::debug!(strategy = *name, "parsed generated response");
            Some(parsed)
        })
        .ok_or(BranchbriefError::EmptyGeneratedResponse)
}

/// Strip known prefixes and bold markers, trim, and truncate to
/// [`MAX_TITLE_CHARS`].
///
/// # Examples
///
/// ```
/// use branchbrief_describe::response::clean_title;
///
/// assert_eq!(clean_title("**Title:** Fix login"), "Fix login");
/// assert_eq!(clean_title("PR Title: **Add cache**"), "Add cache");
/// assert_eq!(clean_title(&"x".repeat(90)).chars().count(), 80);
/// ```
pub fn clean_title(title: &str) -> String {
    let mut title = title.trim();
    for prefix in TITLE_PREFIXES {
        if let Some(rest) = title.strip_prefix(*prefix) {
            title = rest.trim();
        }
    }
    title = title.strip_prefix("**").unwrap_or(title);
    title = title.strip_suffix("**").unwrap_or(title);
    let title = title.trim();

    if title.chars().count() > MAX_TITLE_CHARS {
        let kept: String = title
            .chars()
            .take(MAX_TITLE_CHARS - ELLIPSIS.len())
            .collect();
        format!("{kept}{ELLIPSIS}")
    } else {
        title.to_string()
    }
}

fn build(title: &str, body: &str) -> Option<ParsedOutput> {
    let title = clean_title(title);
    if title.is_empty() {
        return None;
    }
    Some(ParsedOutput {
        title,
        body: body.trim().to_string(),
    })
}

fn decode_json(candidate: &str) -> Option<ParsedOutput> {
    let parsed: JsonOutput = serde_json::from_str(candidate.trim()).ok()?;
    build(&parsed.title, &parsed.body)
}

fn fenced_json(text: &str) -> Option<ParsedOutput> {
    let start = text.find("```json")? + "```json".len();
    let rest = &text[start..];
    let end = rest.find("```")?;
    decode_json(&rest[..end])
}

fn bare_json(text: &str) -> Option<ParsedOutput> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    decode_json(&text[start..=end])
}

fn markdown_heading(text: &str) -> Option<ParsedOutput> {
    let mut lines = text.lines();
    let title = lines
        .by_ref()
        .find_map(|line| line.trim().strip_prefix("# "))?;
    let body = lines.collect::<Vec<_>>().join("\n");
    build(title, &body)
}

fn legacy_prefix(text: &str) -> Option<ParsedOutput> {
    let rest = text.strip_prefix("TITLE:")?;
    let (title, after) = rest.split_once('\n').unwrap_or((rest, ""));
    // The body is the lines after the `BODY:` marker line.
    let body = after
        .lines()
        .skip_while(|line| !line.trim_start().starts_with("BODY:"))
        .skip(1)
        .collect::<Vec<_>>()
        .join("\n");
    build(title, &body)
}

fn first_line(text: &str) -> Option<ParsedOutput> {
    let mut lines = text.lines();
    let title = lines.by_ref().find(|line| !line.trim().is_empty())?;
    let body = lines.collect::<Vec<_>>().join("\n");
    build(title, &body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fenced_json_block() {
        let out = parse_response("```json\n{\"title\":\"Fix bug\",\"body\":\"Details\"}\n```").unwrap();
        assert_eq!(out.title, "Fix bug");
        assert_eq!(out.body, "Details");
    }

    #[test]
    fn fenced_json_surrounded_by_prose() {
        let input = "Here you go:\n```json\n{\"title\": \"Add cache\", \"body\": \"- LRU\\n- TTL\"}\n```\nHope it helps! {not json}";
        let out = parse_response(input).unwrap();
        assert_eq!(out.title, "Add cache");
        assert_eq!(out.body, "- LRU\n- TTL");
    }

    #[test]
    fn bare_json_object_in_prose() {
        let input = "Sure. {\"title\": \"Refactor parser\", \"body\": \"Splits modules\"} Done.";
        let out = parse_response(input).unwrap();
        assert_eq!(out.title, "Refactor parser");
        assert_eq!(out.body, "Splits modules");
    }

    #[test]
    fn json_without_body_defaults_to_empty() {
        let out = parse_response("{\"title\": \"Only a title\"}").unwrap();
        assert_eq!(out.title, "Only a title");
        assert_eq!(out.body, "");
    }

    #[test]
    fn broken_fenced_json_falls_through_to_next_strategy() {
        let input = "```json\n{\"title\": oops}\n```\n# Heading title\nbody text";
        let out = parse_response(input).unwrap();
        assert_eq!(out.title, "Heading title");
        assert_eq!(out.body, "body text");
    }

    #[test]
    fn json_with_non_string_title_is_skipped() {
        let out = parse_response("{\"title\": 42, \"body\": \"x\"}").unwrap();
        assert_eq!(out.title, "{\"title\": 42, \"body\": \"x\"}");
    }

    #[test]
    fn markdown_heading_split() {
        let out = parse_response("# Add login\n\nImplements OAuth").unwrap();
        assert_eq!(out.title, "Add login");
        assert_eq!(out.body, "Implements OAuth");
    }

    #[test]
    fn markdown_heading_after_preamble() {
        let input = "Here is the PR:\n\n  # Improve logging  \n## Changes\n- more spans";
        let out = parse_response(input).unwrap();
        assert_eq!(out.title, "Improve logging");
        assert_eq!(out.body, "## Changes\n- more spans");
    }

    #[test]
    fn subheadings_do_not_count_as_titles() {
        let out = parse_response("## Summary\nstuff").unwrap();
        assert_eq!(out.title, "## Summary");
        assert_eq!(out.body, "stuff");
    }

    #[test]
    fn legacy_title_body_format() {
        let input = "TITLE: Bump deps\nsome noise\nBODY:\nUpdates serde\nand tokio";
        let out = parse_response(input).unwrap();
        assert_eq!(out.title, "Bump deps");
        assert_eq!(out.body, "Updates serde\nand tokio");
    }

    #[test]
    fn legacy_body_starts_below_the_marker_line() {
        let out = parse_response("TITLE: t\nBODY: inline\nreal body\n  - item").unwrap();
        assert_eq!(out.title, "t");
        assert_eq!(out.body, "real body\n  - item");
    }

    #[test]
    fn legacy_format_without_body() {
        let out = parse_response("TITLE: Just a title").unwrap();
        assert_eq!(out.title, "Just a title");
        assert_eq!(out.body, "");
    }

    #[test]
    fn empty_legacy_title_falls_back_to_first_line() {
        let out = parse_response("TITLE:\nBODY: text").unwrap();
        assert_eq!(out.title, "TITLE:");
        assert_eq!(out.body, "BODY: text");
    }

    #[test]
    fn fallback_uses_first_non_blank_line() {
        let out = parse_response("\n\n  Improve error messages  \nMore context in errors.\n\nAnd hints.").unwrap();
        assert_eq!(out.title, "Improve error messages");
        assert_eq!(out.body, "More context in errors.\n\nAnd hints.");
    }

    #[test]
    fn single_line_fallback_has_empty_body() {
        let out = parse_response("Fix typo").unwrap();
        assert_eq!(out.title, "Fix typo");
        assert_eq!(out.body, "");
    }

    #[test]
    fn empty_input_fails() {
        assert!(matches!(
            parse_response(""),
            Err(BranchbriefError::EmptyGeneratedResponse)
        ));
        assert!(matches!(
            parse_response("  \n\t\n "),
            Err(BranchbriefError::EmptyGeneratedResponse)
        ));
    }

    #[test]
    fn long_title_is_truncated_to_eighty() {
        let title = "a".repeat(90);
        let out = parse_response(&format!("{{\"title\":\"{title}\",\"body\":\"b\"}}")).unwrap();
        assert_eq!(out.title.chars().count(), 80);
        assert!(out.title.ends_with("..."));
        assert_eq!(&out.title[..77], &title[..77]);
    }

    #[test]
    fn eighty_char_title_is_kept() {
        let title = "b".repeat(80);
        assert_eq!(clean_title(&title), title);
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let title = "ğ".repeat(85);
        let cleaned = clean_title(&title);
        assert_eq!(cleaned.chars().count(), 80);
        assert!(cleaned.starts_with(&"ğ".repeat(77)));
    }

    #[test]
    fn prefixes_and_bold_are_stripped() {
        assert_eq!(clean_title("📋 **Title:** Ship it"), "Ship it");
        assert_eq!(clean_title("Pull Request Title: Ship it"), "Ship it");
        assert_eq!(clean_title("**Ship it**"), "Ship it");
        assert_eq!(clean_title("Başlık: Giriş ekle"), "Giriş ekle");
        assert_eq!(clean_title("Titre: Ajouter"), "Ajouter");
        assert_eq!(clean_title("  plain  "), "plain");
    }

    #[test]
    fn stacked_prefixes_are_all_stripped() {
        assert_eq!(clean_title("PR Title: Title: x"), "x");
        assert_eq!(clean_title("**Title:** Title: **Bump deps**"), "Bump deps");
    }

    #[test]
    fn prefix_in_json_title_is_cleaned() {
        let out = parse_response("{\"title\":\"Title: **Add search**\",\"body\":\"x\"}").unwrap();
        assert_eq!(out.title, "Add search");
    }

    #[test]
    fn is_deterministic() {
        let input = "noise {\"title\":\"T\",\"body\":\"B\"} noise";
        assert_eq!(parse_response(input).unwrap(), parse_response(input).unwrap());
    }
}
