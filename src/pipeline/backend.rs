//! Summarisation backends.
//!
//! A backend turns one prompt into one summary. The orchestrator in
//! [`crate::pipeline::dispatch`] owns timeouts and failure markers, so a
//! backend only has to classify what went wrong:
//!
//! * [`HttpBackend`]: the generate protocol, `POST {model, prompt, stream:
//!   false}` → `{response}`, against a local service or a remote URL.
//! * [`ProviderBackend`]: hosted chat providers through `edgequake-llm`.
//! * [`ScriptedBackend`]: deterministic fake for tests and dry runs.

use crate::config::DigestConfig;
use crate::error::{BackendError, DigestError};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info};

/// Something that can summarise a prompt.
#[async_trait]
pub trait SummaryBackend: Send + Sync {
    /// Short label for logs.
    fn name(&self) -> &str;

    async fn summarize(&self, prompt: &str) -> Result<String, BackendError>;
}

// ── HTTP generate protocol ───────────────────────────────────────────────

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

/// Backend speaking the generate protocol over HTTP.
pub struct HttpBackend {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl std::fmt::Debug for HttpBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpBackend")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl HttpBackend {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, DigestError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DigestError::BackendNotConfigured {
                backend: "http".into(),
                hint: e.to_string(),
            })?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            model: model.into(),
            api_key,
            timeout,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn classify(&self, e: reqwest::Error) -> BackendError {
        if e.is_timeout() {
            BackendError::Timeout {
                secs: self.timeout.as_secs(),
            }
        } else {
            BackendError::Transport(e.to_string())
        }
    }
}

#[async_trait]
impl SummaryBackend for HttpBackend {
    fn name(&self) -> &str {
        "http"
    }

    async fn summarize(&self, prompt: &str) -> Result<String, BackendError> {
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
        };
        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| self.classify(e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Transport(format!("HTTP {status}")));
        }

        let text = response.text().await.map_err(|e| self.classify(e))?;
        let value: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| BackendError::Malformed(format!("invalid JSON: {e}")))?;
        match value.get("response").and_then(|r| r.as_str()) {
            Some(summary) => Ok(summary.to_string()),
            None => Err(BackendError::Malformed("no response field".into())),
        }
    }
}

// ── hosted providers ─────────────────────────────────────────────────────

/// Backend routing prompts to a hosted chat provider.
pub struct ProviderBackend {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
}

impl ProviderBackend {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self {
            provider,
            options: CompletionOptions {
                temperature: Some(0.2),
                max_tokens: Some(1024),
                ..Default::default()
            },
        }
    }

    /// Create a provider by name (e.g. "openai"); the API key comes from
    /// the provider's usual environment variable.
    pub fn from_name(provider_name: &str, model: &str) -> Result<Self, DigestError> {
        let provider = ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
            DigestError::BackendNotConfigured {
                backend: provider_name.to_string(),
                hint: format!("{e}"),
            }
        })?;
        Ok(Self::new(provider))
    }
}

#[async_trait]
impl SummaryBackend for ProviderBackend {
    fn name(&self) -> &str {
        "provider"
    }

    async fn summarize(&self, prompt: &str) -> Result<String, BackendError> {
        let messages = vec![ChatMessage::user(prompt)];
        let response = self
            .provider
            .chat(&messages, Some(&self.options))
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        debug!(
            "provider: {} input tokens, {} output tokens",
            response.prompt_tokens, response.completion_tokens
        );
        Ok(response.content)
    }
}

// ── scripted fake ────────────────────────────────────────────────────────

/// What the [`ScriptedBackend`] does for a prompt.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Answer with this text.
    Text(String),
    /// Answer with `summary of: {prompt}`.
    Echo,
    /// Fail with this error.
    Fail(BackendError),
    /// Never answer.
    Hang,
    /// Answer with the text after a delay.
    Delayed(Duration, String),
}

/// Deterministic backend. Rules match on a substring of the prompt; the
/// first matching rule wins, otherwise the default reply applies.
#[derive(Debug)]
pub struct ScriptedBackend {
    rules: Vec<(String, Reply)>,
    default: Reply,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self::new(Reply::Echo)
    }
}

impl ScriptedBackend {
    pub fn new(default: Reply) -> Self {
        Self {
            rules: Vec::new(),
            default,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn on_contains(mut self, needle: impl Into<String>, reply: Reply) -> Self {
        self.rules.push((needle.into(), reply));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Prompts received so far, in arrival order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl SummaryBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn summarize(&self, prompt: &str) -> Result<String, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        let reply = self
            .rules
            .iter()
            .find(|(needle, _)| prompt.contains(needle.as_str()))
            .map(|(_, r)| r.clone())
            .unwrap_or_else(|| self.default.clone());

        match reply {
            Reply::Text(t) => Ok(t),
            Reply::Echo => Ok(format!("summary of: {prompt}")),
            Reply::Fail(e) => Err(e),
            Reply::Hang => {
                std::future::pending::<()>().await;
                Err(BackendError::Transport("unreachable".into()))
            }
            Reply::Delayed(d, t) => {
                tokio::time::sleep(d).await;
                Ok(t)
            }
        }
    }
}

// ── resolution ───────────────────────────────────────────────────────────

/// Resolve the backend, from most-specific to least-specific:
///
/// 1. a pre-built backend on the config;
/// 2. a named hosted provider (`provider_name` + `model`);
/// 3. the generate endpoint (`endpoint` + `model`, optional bearer token).
pub fn resolve_backend(config: &DigestConfig) -> Result<Arc<dyn SummaryBackend>, DigestError> {
    if let Some(ref backend) = config.backend {
        return Ok(Arc::clone(backend));
    }
    if let Some(ref name) = config.provider_name {
        info!("Using hosted provider '{}' with model '{}'", name, config.model);
        return Ok(Arc::new(ProviderBackend::from_name(name, &config.model)?));
    }
    info!("Using generate endpoint {} with model '{}'", config.endpoint, config.model);
    Ok(Arc::new(HttpBackend::new(
        config.endpoint.clone(),
        config.model.clone(),
        config.api_key.clone(),
        config.request_timeout,
    )?))
}
