//! AI provider adapter.
//!
//! One capability (prompt in, text out) over three wire formats.
//! `Provider` is a closed enum and every variant-specific decision is a
//! match on it, so adding a provider walks through each site that needs
//! an answer: wire format, auth header, defaults, credential policy.

pub mod breakdown;
pub mod models;
pub mod pricing;
mod providers;

use crate::db::Database;
use crate::error::ApiError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Supported AI backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Gemini,
    OpenAi,
    Anthropic,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
        }
    }

    pub fn from_str(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "gemini" => Some(Self::Gemini),
            "openai" => Some(Self::OpenAi),
            "anthropic" => Some(Self::Anthropic),
            _ => None,
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::Gemini => "https://generativelanguage.googleapis.com/v1beta",
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Anthropic => "https://api.anthropic.com",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini-2.0-flash",
            Self::OpenAi => "gpt-4o-mini",
            Self::Anthropic => "claude-3-5-haiku-latest",
        }
    }

    /// Environment variable consulted when no key is supplied.
    pub fn env_key(&self) -> &'static str {
        match self {
            Self::Gemini => "GEMINI_API_KEY",
            Self::OpenAi => "OPENAI_API_KEY",
            Self::Anthropic => "ANTHROPIC_API_KEY",
        }
    }

    /// Whether the variant tolerates a missing credential. Gemini requests
    /// go out unauthenticated and the upstream rejects them itself; the
    /// other variants refuse locally before any network traffic.
    pub fn key_optional(&self) -> bool {
        matches!(self, Self::Gemini)
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared AI client: one `reqwest` client plus access to stored provider
/// overrides and the call log.
pub struct AiClient {
    http: reqwest::Client,
    db: Arc<Database>,
    log_calls: bool,
}

impl AiClient {
    /// Create a client. No request timeout is configured: a hung upstream
    /// holds its caller's request open. Known gap.
    pub fn new(db: Arc<Database>, log_calls: bool) -> Self {
        Self {
            http: reqwest::Client::new(),
            db,
            log_calls,
        }
    }

    /// Run one chat completion and return the raw response text.
    ///
    /// `endpoint` labels the call in the AI call log ("breakdown",
    /// "pricing"). Logging is best-effort: a failed insert is warned and
    /// the result still returned.
    pub async fn generate(
        &self,
        provider: Provider,
        endpoint: &str,
        prompt: &str,
        api_key: Option<String>,
    ) -> Result<String> {
        let api_key = self.resolve_credential(provider, api_key)?;
        let (base_url, model) = self.resolved_target(provider)?;

        let started = Instant::now();
        let result = providers::chat(
            &self.http,
            provider,
            &base_url,
            &model,
            api_key.as_deref(),
            prompt,
        )
        .await;
        let duration_ms = started.elapsed().as_millis() as i64;

        if self.log_calls {
            let error = result.as_ref().err().map(|e| e.to_string());
            if let Err(log_err) = self.db.log_ai_call(
                provider.as_str(),
                &model,
                endpoint,
                prompt,
                result.as_deref().ok(),
                error.as_deref(),
                duration_ms,
            ) {
                tracing::warn!("Failed to log AI call: {}", log_err);
            }
        }

        result
    }

    /// Pick the credential for a call: request-supplied key first, then
    /// the provider's environment variable, else refuse unless the
    /// variant works unauthenticated.
    fn resolve_credential(
        &self,
        provider: Provider,
        api_key: Option<String>,
    ) -> Result<Option<String>> {
        let supplied = api_key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());
        if supplied.is_some() {
            return Ok(supplied);
        }

        if let Ok(key) = std::env::var(provider.env_key()) {
            let key = key.trim().to_string();
            if !key.is_empty() {
                return Ok(Some(key));
            }
        }

        if provider.key_optional() {
            Ok(None)
        } else {
            Err(ApiError::no_credential(provider.as_str()).into())
        }
    }

    /// Resolve base URL and model: the stored provider_config row wins,
    /// variant defaults otherwise. Absence of a row is not an error.
    fn resolved_target(&self, provider: Provider) -> Result<(String, String)> {
        let stored = self.db.get_provider_config(provider.as_str())?;

        let base_url = stored
            .as_ref()
            .and_then(|c| c.base_url.clone())
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| provider.default_base_url().to_string());
        let model = stored
            .as_ref()
            .and_then(|c| c.model.clone())
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| provider.default_model().to_string());

        Ok((base_url.trim_end_matches('/').to_string(), model))
    }
}
