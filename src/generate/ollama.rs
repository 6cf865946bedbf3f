//! Ollama client used as the generative text collaborator.
//!
//! The model is asked for one structured reply per unknown pair. It is never
//! consulted for pairs the recipe table already knows, and any failure here
//! is absorbed by the fallback rules.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use miette::Diagnostic;
use thiserror::Error;

use crate::element::RecipeOutcome;
use crate::generate::{Generator, SYSTEM_PROMPT, pair_prompt, parse_proposal};

/// Errors from the generative collaborator.
#[derive(Debug, Error, Diagnostic)]
pub enum LlmError {
    #[error("Ollama is not available at {url}")]
    #[diagnostic(
        code(craft::llm::unavailable),
        help("Start Ollama with `ollama serve` or pass --no-llm to use the fallback rules only.")
    )]
    Unavailable { url: String },

    #[error("Ollama request failed: {message}")]
    #[diagnostic(
        code(craft::llm::request_failed),
        help("Check that Ollama is running and the model is pulled.")
    )]
    RequestFailed { message: String },

    #[error("Failed to parse Ollama response: {message}")]
    #[diagnostic(
        code(craft::llm::parse_error),
        help("The model returned an unexpected response format. Smaller models sometimes ignore the JSON instruction.")
    )]
    ParseError { message: String },

    #[error("Ollama request timed out after {timeout_secs}s")]
    #[diagnostic(
        code(craft::llm::timeout),
        help("Increase `generator.timeout_secs` in the config or use a smaller model.")
    )]
    Timeout { timeout_secs: u64 },
}

/// Configuration for the Ollama client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OllamaConfig {
    /// Base URL for the Ollama API.
    pub base_url: String,
    /// Model name to use.
    pub model: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".into(),
            model: "llama3.2".into(),
            timeout_secs: 30,
        }
    }
}

/// Client for the Ollama REST API.
pub struct OllamaGenerator {
    config: OllamaConfig,
    available: AtomicBool,
    /// Models available locally after `check_available()`.
    available_models: RwLock<Vec<String>>,
}

impl OllamaGenerator {
    /// Create a new client. Call [`check_available`](Self::check_available)
    /// before generating.
    pub fn new(config: OllamaConfig) -> Self {
        Self {
            config,
            available: AtomicBool::new(false),
            available_models: RwLock::new(Vec::new()),
        }
    }

    /// Ask the Ollama server whether it is available.
    ///
    /// Sends a lightweight request to the `/api/tags` endpoint and
    /// records the list of locally available models.
    pub fn check_available(&self) -> bool {
        let url = format!("{}/api/tags", self.config.base_url);
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(5))
            .build();

        let models = match agent.get(&url).call() {
            Ok(resp) if resp.status() == 200 => resp
                .into_string()
                .ok()
                .and_then(|body| serde_json::from_str::<serde_json::Value>(&body).ok())
                .map(|json| {
                    json["models"]
                        .as_array()
                        .map(|arr| {
                            arr.iter()
                                .filter_map(|m| m["name"].as_str().map(|s| s.to_string()))
                                .collect()
                        })
                        .unwrap_or_default()
                }),
            _ => None,
        };

        let available = models.is_some();
        self.available.store(available, Ordering::Relaxed);
        if let Ok(mut slot) = self.available_models.write() {
            *slot = models.unwrap_or_default();
        }
        tracing::debug!(url = %self.config.base_url, available, "checked Ollama availability");
        available
    }

    /// Whether the Ollama server answered the last availability check.
    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::Relaxed)
    }

    /// Whether the configured model is locally available.
    pub fn has_model(&self) -> bool {
        let target = &self.config.model;
        self.available_models
            .read()
            .map(|models| {
                models
                    .iter()
                    .any(|m| m == target || m.split(':').next() == Some(target))
            })
            .unwrap_or(false)
    }

    /// Generate a JSON-constrained completion from a prompt.
    pub fn generate(&self, prompt: &str, system: Option<&str>) -> Result<String, LlmError> {
        if !self.is_available() {
            return Err(LlmError::Unavailable {
                url: self.config.base_url.clone(),
            });
        }

        let url = format!("{}/api/generate", self.config.base_url);
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .build();

        let mut body = serde_json::json!({
            "model": self.config.model,
            "prompt": prompt,
            "format": "json",
            "stream": false,
        });

        if let Some(sys) = system {
            body["system"] = serde_json::Value::String(sys.to_string());
        }

        let body_str = serde_json::to_string(&body).map_err(|e| LlmError::RequestFailed {
            message: format!("JSON serialize error: {e}"),
        })?;

        let resp = agent
            .post(&url)
            .set("Content-Type", "application/json")
            .send_string(&body_str)
            .map_err(|e: ureq::Error| {
                let message = e.to_string();
                if message.contains("timed out") {
                    LlmError::Timeout {
                        timeout_secs: self.config.timeout_secs,
                    }
                } else {
                    LlmError::RequestFailed { message }
                }
            })?;

        let resp_str = resp.into_string().map_err(|e| LlmError::ParseError {
            message: e.to_string(),
        })?;

        let json: serde_json::Value =
            serde_json::from_str(&resp_str).map_err(|e| LlmError::ParseError {
                message: e.to_string(),
            })?;

        json["response"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| LlmError::ParseError {
                message: "missing 'response' field".into(),
            })
    }

    /// Get the model name being used.
    pub fn model(&self) -> &str {
        &self.config.model
    }
}

impl Generator for OllamaGenerator {
    fn propose(&self, first: &str, second: &str) -> Result<RecipeOutcome, LlmError> {
        let reply = self.generate(&pair_prompt(first, second), Some(SYSTEM_PROMPT))?;
        parse_proposal(&reply)
    }

    fn name(&self) -> String {
        format!("ollama:{}", self.config.model)
    }
}

impl std::fmt::Debug for OllamaGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OllamaGenerator")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .field("available", &self.is_available())
            .finish()
    }
}
