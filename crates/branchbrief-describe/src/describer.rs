//! End-to-end description generation: prompt, provider call, parse, sign.

use std::future::Future;

use branchbrief_core::{BranchbriefError, DiffResult, ParsedOutput};

use crate::prompt::{build_system_prompt, build_user_prompt};
use crate::provider::LlmClient;
use crate::response::parse_response;

/// Anything that turns a system and user prompt into generated text.
pub trait Generate {
    /// Produce text for the prompts.
    fn generate(
        &self,
        system: &str,
        user: &str,
    ) -> impl Future<Output = Result<String, BranchbriefError>> + Send;

    /// `(provider, model)` shown in the signature footer.
    fn identity(&self) -> (String, String);
}

impl Generate for LlmClient {
    fn generate(
        &self,
        system: &str,
        user: &str,
    ) -> impl Future<Output = Result<String, BranchbriefError>> + Send {
        LlmClient::generate(self, system, user)
    }

    fn identity(&self) -> (String, String) {
        (self.provider().to_string(), self.model().to_string())
    }
}

/// What to describe and how.
#[derive(Debug, Clone, Default)]
pub struct DescribeRequest<'a> {
    /// Free-text issue or task description.
    pub issue_context: Option<&'a str>,
    /// Repository location, shown in credential-free form.
    pub repo_location: Option<&'a str>,
    /// Output language code.
    pub language: &'a str,
    /// Replacement for the built-in base prompt.
    pub template: Option<&'a str>,
}

/// Generates pull request descriptions from branch differences.
pub struct Describer<G> {
    generator: G,
}

impl<G: Generate> Describer<G> {
    /// Wrap a text generator.
    pub fn new(generator: G) -> Self {
        Self { generator }
    }

    /// Generate and parse a description, appending the signature footer.
    ///
    /// # Errors
    ///
    /// Propagates generator errors and
    /// [`BranchbriefError::EmptyGeneratedResponse`] from the parser.
    pub async fn describe(
        &self,
        diff: &DiffResult,
        request: &DescribeRequest<'_>,
    ) -> Result<ParsedOutput, BranchbriefError> {
        let system = build_system_prompt(request.template, request.language);
        let user = build_user_prompt(diff, request.issue_context, request.repo_location);
        tracing::debug!(chars = system.len() + user.len(), "prompt built");

        let response = self.generator.generate(&system, &user).await?;
        tracing::debug!(chars = response.len(), "response received");

        let mut parsed = parse_response(&response)?;
        let (provider, model) = self.generator.identity();
        parsed.body = with_signature(&parsed.body, &provider, &model);
        Ok(parsed)
    }
}

/// Append the generated-by footer to a body.
///
/// # Examples
///
/// ```
/// use branchbrief_describe::describer::with_signature;
///
/// let body = with_signature("Adds login.", "ollama", "llama3");
/// assert!(body.starts_with("Adds login.\n\n---\n\n"));
/// assert!(body.contains("ollama (llama3)"));
/// ```
pub fn with_signature(body: &str, provider: &str, model: &str) -> String {
    format!(
        "{}\n\n---\n\n*Generated by branchbrief using {provider} ({model}).*",
        body.trim_end()
    )
}
