use std::time::Duration;

use branchbrief_core::{BranchbriefError, LlmConfig, Provider};
use serde::{Deserialize, Serialize};

/// A message in a chat conversation with the model.
///
/// # Examples
///
/// ```
/// use branchbrief_describe::provider::{ChatMessage, Role};
///
/// let msg = ChatMessage::user("Describe this diff");
/// assert!(matches!(msg.role, Role::User));
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    /// Role of the message sender.
    pub role: Role,
    /// Text content of the message.
    pub content: String,
}

impl ChatMessage {
    /// System-role message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// User-role message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Role in the chat conversation.
///
/// # Examples
///
/// ```
/// use branchbrief_describe::provider::Role;
///
/// let role = Role::System;
/// assert_eq!(serde_json::to_string(&role).unwrap(), "\"system\"");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System-level instructions.
    System,
    /// User input.
    User,
    /// Assistant response.
    Assistant,
}

/// Text-generation client for the configured provider.
///
/// # Examples
///
/// ```
/// use branchbrief_core::LlmConfig;
/// use branchbrief_describe::provider::LlmClient;
///
/// let config = LlmConfig {
///     api_key: Some("test-key".into()),
///     ..LlmConfig::default()
/// };
/// let client = LlmClient::new(&config).unwrap();
/// assert_eq!(client.model(), "gpt-4o");
/// ```
pub struct LlmClient {
    client: reqwest::Client,
    provider: Provider,
    model: String,
    api_key: Option<String>,
    endpoint: Endpoint,
}

/// Resolved request target, with any URL credentials split out.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Endpoint {
    base_url: String,
    basic_auth: Option<(String, String)>,
}

impl LlmClient {
    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`BranchbriefError::Config`] for invalid provider settings and
    /// [`BranchbriefError::Llm`] if the HTTP client cannot be built.
    pub fn new(config: &LlmConfig) -> Result<Self, BranchbriefError> {
        let provider = config.validate()?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| BranchbriefError::Llm(format!("failed to create HTTP client: {e}")))?;
        let endpoint = split_credentials(&config.resolved_base_url(provider))?;
        Ok(Self {
            client,
            provider,
            model: config.model.clone(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            endpoint,
        })
    }

    /// Return the model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Return the provider.
    pub fn provider(&self) -> Provider {
        self.provider
    }

    /// Send a system and user prompt and return the generated text.
    ///
    /// # Errors
    ///
    /// Returns [`BranchbriefError::Llm`] on HTTP errors or unexpected response shapes.
    pub async fn generate(&self, system: &str, user: &str) -> Result<String, BranchbriefError> {
        let messages = vec![ChatMessage::system(system), ChatMessage::user(user)];
        let url = self.url();
        let body = self.request_body(&messages);
        tracing::debug!(provider = %self.provider, model = %self.model, %url, "sending generation request");

        let mut request = self.client.post(&url).json(&body);
        match self.provider {
            Provider::OpenAi | Provider::OpenWebUi => {
                if let Some(api_key) = &self.api_key {
                    request = request.bearer_auth(api_key);
                }
            }
            Provider::Ollama => {
                if let Some((user, password)) = &self.endpoint.basic_auth {
                    request = request.basic_auth(user, Some(password));
                }
            }
            Provider::Gemini => {
                if let Some(api_key) = &self.api_key {
                    request = request.query(&[("key", api_key)]);
                }
            }
        }

        let response = request
            .send()
            .await
            .map_err(|e| BranchbriefError::Llm(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(BranchbriefError::Llm(format!(
                "{} API error {status}: {body_text}",
                self.provider
            )));
        }

        let response_body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| BranchbriefError::Llm(format!("failed to parse response: {e}")))?;

        extract_content(self.provider, &response_body)
            .map(str::to_string)
            .ok_or_else(|| {
                BranchbriefError::Llm(format!("unexpected response structure: {response_body}"))
            })
    }

    fn url(&self) -> String {
        let base = &self.endpoint.base_url;
        match self.provider {
            Provider::OpenAi => format!("{base}/v1/chat/completions"),
            Provider::OpenWebUi => format!("{base}/api/chat/completions"),
            Provider::Ollama => format!("{base}/api/chat"),
            Provider::Gemini => format!("{base}/v1beta/models/{}:generateContent", self.model),
        }
    }

    fn request_body(&self, messages: &[ChatMessage]) -> serde_json::Value {
        match self.provider {
            Provider::OpenAi | Provider::OpenWebUi => serde_json::json!({
                "model": self.model,
                "messages": messages,
                "temperature": 0.2,
            }),
            Provider::Ollama => serde_json::json!({
                "model": self.model,
                "messages": messages,
                "stream": false,
            }),
            Provider::Gemini => {
                let system: Vec<&str> = messages
                    .iter()
                    .filter(|m| m.role == Role::System)
                    .map(|m| m.content.as_str())
                    .collect();
                let contents: Vec<serde_json::Value> = messages
                    .iter()
                    .filter(|m| m.role != Role::System)
                    .map(|m| {
                        let role = if m.role == Role::Assistant { "model" } else { "user" };
                        serde_json::json!({ "role": role, "parts": [{ "text": m.content }] })
                    })
                    .collect();
                serde_json::json!({
                    "systemInstruction": { "parts": [{ "text": system.join("\n\n") }] },
                    "contents": contents,
                })
            }
        }
    }
}

fn extract_content(provider: Provider, body: &serde_json::Value) -> Option<&str> {
    match provider {
        Provider::OpenAi | Provider::OpenWebUi => body
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str()),
        Provider::Ollama => body
            .get("message")
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str()),
        Provider::Gemini => body
            .get("candidates")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("content"))
            .and_then(|c| c.get("parts"))
            .and_then(|p| p.get(0))
            .and_then(|p| p.get("text"))
            .and_then(|t| t.as_str()),
    }
}

/// Move `user:password@` out of a base URL into basic-auth credentials.
fn split_credentials(base_url: &str) -> Result<Endpoint, BranchbriefError> {
    let mut url = reqwest::Url::parse(base_url)
        .map_err(|e| BranchbriefError::Config(format!("invalid provider URL '{base_url}': {e}")))?;
    let basic_auth = if url.username().is_empty() {
        None
    } else {
        let user = percent_decode(url.username());
        let password = percent_decode(url.password().unwrap_or(""));
        // Both setters only fail for cannot-be-a-base URLs, which have no userinfo.
        let _ = url.set_username("");
        let _ = url.set_password(None);
        Some((user, password))
    };
    Ok(Endpoint {
        base_url: url.as_str().trim_end_matches('/').to_string(),
        basic_auth,
    })
}

fn percent_decode(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}
