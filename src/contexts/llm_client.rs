use std::fmt;
use std::time::Duration;

/// Errors from the model service, distinguishable so the caller can decide
/// between retrying and aborting. No automatic retry happens here.
#[derive(Debug)]
pub enum UpstreamError {
    /// Transport-level failure, including timeouts and missing credentials.
    Request(String),
    /// The service answered with a non-success HTTP status.
    Status { code: u16, detail: String },
    /// The service answered, but the payload had no usable completion.
    Payload(String),
}

impl fmt::Display for UpstreamError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            UpstreamError::Request(detail) => {
                write!(f, "model service request failed: {}", detail)
            }
            UpstreamError::Status { code, detail } => {
                write!(f, "model service returned HTTP {}: {}", code, detail)
            }
            UpstreamError::Payload(detail) => {
                write!(f, "model service response was unusable: {}", detail)
            }
        }
    }
}

impl std::error::Error for UpstreamError {}

/// Narrow seam to the model service so the extraction/validation pipeline
/// can be driven by canned responses in tests.
pub trait LlmClient {
    fn generate(&self, prompt: &str) -> Result<String, UpstreamError>;
}

/// Chat-completions client for an OpenAI-compatible endpoint.
///
/// Blocking by design: one generation request is a single sequential
/// pipeline, and callers running inside an async executor hand the whole
/// pipeline to a blocking task.
pub struct OpenAiChatClient {
    http: reqwest::blocking::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiChatClient {
    pub const DEFAULT_MODEL: &'static str = "gpt-4o";
    pub const DEFAULT_BASE_URL: &'static str = "https://api.openai.com/v1";
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

    pub fn new(
        api_key: String,
        model: Option<String>,
        base_url: Option<String>,
    ) -> Result<Self, UpstreamError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .build()
            .map_err(|e| UpstreamError::Request(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.unwrap_or_else(|| Self::DEFAULT_BASE_URL.to_string()),
            api_key,
            model: model.unwrap_or_else(|| Self::DEFAULT_MODEL.to_string()),
        })
    }

    /// Reads `OPENAI_API_KEY` (required), `PLUGFORGE_MODEL` and
    /// `OPENAI_BASE_URL` (optional) from the environment.
    pub fn from_env() -> Result<Self, UpstreamError> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| UpstreamError::Request("OPENAI_API_KEY is not set".to_string()))?;
        let model = std::env::var("PLUGFORGE_MODEL").ok();
        let base_url = std::env::var("OPENAI_BASE_URL").ok();
        Self::new(api_key, model, base_url)
    }

    /// Checks the environment without constructing a client, so services can
    /// fail fast at startup while still building the client per request.
    pub fn env_is_configured() -> Result<(), UpstreamError> {
        std::env::var("OPENAI_API_KEY")
            .map(|_| ())
            .map_err(|_| UpstreamError::Request("OPENAI_API_KEY is not set".to_string()))
    }
}

impl LlmClient for OpenAiChatClient {
    fn generate(&self, prompt: &str) -> Result<String, UpstreamError> {
        let body = serde_json::json!({
            "model": self.model,
            "temperature": 0.0,
            "messages": [{ "role": "user", "content": prompt }],
        });

        let response = self
            .http
            .post(format!(
                "{}/chat/completions",
                self.base_url.trim_end_matches('/')
            ))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .map_err(|e| UpstreamError::Request(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .map_err(|e| UpstreamError::Request(e.to_string()))?;

        if !status.is_success() {
            return Err(UpstreamError::Status {
                code: status.as_u16(),
                detail: preview(&text),
            });
        }

        let value: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| UpstreamError::Payload(e.to_string()))?;

        value["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| UpstreamError::Payload("no completion content in response".to_string()))
    }
}

/// Keeps error payloads readable in logs.
fn preview(text: &str) -> String {
    const LIMIT: usize = 500;
    if text.chars().count() > LIMIT {
        let head: String = text.chars().take(LIMIT).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}
