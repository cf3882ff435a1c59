//! Chat-completion clients.
//!
//! One bounded request per tier, no retry: a failed call aborts the run.

use serde_json::{Value, json};

use crate::core::config::BenchmarkConfig;
use crate::core::errors::{GvaError, Result};

/// Model reply: the message content plus the payload kept for provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    /// Message content of the first choice.
    pub content: String,
    /// Full response payload.
    pub raw: Value,
}

/// Anything that can answer a benchmark prompt.
pub trait ModelClient {
    /// Send one system and user prompt pair and return the reply.
    fn complete(&self, system: &str, prompt: &str) -> Result<Completion>;
}

/// Offline client returning the same placeholder for every tier.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunClient;

impl ModelClient for DryRunClient {
    fn complete(&self, _system: &str, _prompt: &str) -> Result<Completion> {
        let placeholder = json!({
            "tier": "unknown",
            "score": null,
            "confidence": "low",
            "analysis": "dry run placeholder",
            "evidence": [],
        });
        Ok(Completion {
            content: serde_json::to_string_pretty(&placeholder)?,
            raw: json!({"dry_run": true, "placeholder": placeholder}),
        })
    }
}

/// Request body for `POST <api_base>/chat/completions`.
#[must_use]
pub fn request_body(cfg: &BenchmarkConfig, system: &str, prompt: &str) -> Value {
    json!({
        "model": cfg.model,
        "temperature": cfg.temperature,
        "top_p": cfg.top_p,
        "max_tokens": cfg.max_tokens,
        "messages": [
            {"role": "system", "content": system},
            {"role": "user", "content": prompt},
        ],
    })
}

/// `choices[0].message.content` of a completion payload.
pub fn extract_content(payload: &Value) -> Result<String> {
    payload
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| GvaError::Network {
            details: format!("unexpected API response schema: {payload}"),
        })
}

/// `<api_base>/chat/completions`, tolerating a trailing slash.
#[must_use]
pub fn completions_url(api_base: &str) -> String {
    format!("{}/chat/completions", api_base.trim_end_matches('/'))
}

/// Blocking HTTP client against an OpenAI-compatible endpoint.
#[cfg(feature = "benchmark")]
pub struct HttpModelClient {
    http: reqwest::blocking::Client,
    url: String,
    api_key: String,
    cfg: BenchmarkConfig,
}

#[cfg(feature = "benchmark")]
impl HttpModelClient {
    /// Client with the configured timeout and bearer key.
    pub fn new(cfg: &BenchmarkConfig, api_key: String) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|e| GvaError::Network {
                details: format!("client setup: {e}"),
            })?;
        Ok(Self {
            http,
            url: completions_url(&cfg.api_base),
            api_key,
            cfg: cfg.clone(),
        })
    }
}

#[cfg(feature = "benchmark")]
impl ModelClient for HttpModelClient {
    fn complete(&self, system: &str, prompt: &str) -> Result<Completion> {
        let response = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&request_body(&self.cfg, system, prompt))
            .send()
            .map_err(|e| GvaError::Network {
                details: format!("request failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(GvaError::Network {
                details: format!("API request failed with status {status}: {body}"),
            });
        }

        let raw: Value = response.json().map_err(|e| GvaError::Network {
            details: format!("response was not JSON: {e}"),
        })?;
        Ok(Completion {
            content: extract_content(&raw)?,
            raw,
        })
    }
}

/// Placeholder when the crate is built without the `benchmark` feature.
#[cfg(not(feature = "benchmark"))]
pub struct HttpModelClient;

#[cfg(not(feature = "benchmark"))]
impl HttpModelClient {
    /// Always fails; live runs need the `benchmark` feature.
    pub fn new(_cfg: &BenchmarkConfig, _api_key: String) -> Result<Self> {
        Err(GvaError::Runtime {
            details: "live benchmark runs need the `benchmark` feature; use --dry-run".to_string(),
        })
    }
}

#[cfg(not(feature = "benchmark"))]
impl ModelClient for HttpModelClient {
    fn complete(&self, _system: &str, _prompt: &str) -> Result<Completion> {
        Err(GvaError::Runtime {
            details: "built without the `benchmark` feature".to_string(),
        })
    }
}
