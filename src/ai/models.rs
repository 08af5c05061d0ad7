//! Provider model discovery with curated filtering.

use anyhow::Result;
use serde::Deserialize;

use super::providers::{send_checked, with_auth};
use super::{AiClient, Provider};
use crate::error::ApiError;

/// Hand-curated admission rules for one provider's model listing.
///
/// Upstream listings mix chat models with embeddings, audio, image and
/// dated snapshot variants. These tables keep only current general-purpose
/// chat models; keeping them aligned with upstream naming is an accepted
/// maintenance cost.
struct FilterRules {
    allowed_prefixes: &'static [&'static str],
    blocked_substrings: &'static [&'static str],
    drop_dated: bool,
}

fn filter_rules(provider: Provider) -> FilterRules {
    match provider {
        Provider::Gemini => FilterRules {
            allowed_prefixes: &["gemini-"],
            blocked_substrings: &[
                "embedding",
                "vision",
                "audio",
                "image",
                "tts",
                "live",
                "exp",
                "thinking",
                "aqa",
                "preview",
            ],
            drop_dated: false,
        },
        Provider::OpenAi => FilterRules {
            allowed_prefixes: &["gpt-", "o1", "o3", "o4"],
            blocked_substrings: &[
                "audio",
                "realtime",
                "search",
                "transcribe",
                "tts",
                "image",
                "instruct",
                "moderation",
                "embedding",
                "preview",
            ],
            drop_dated: true,
        },
        Provider::Anthropic => FilterRules {
            allowed_prefixes: &["claude-"],
            blocked_substrings: &[],
            drop_dated: false,
        },
    }
}

/// Keep ids that pass the provider's admission rules, preserving the
/// upstream listing order.
pub(crate) fn filter_models(provider: Provider, ids: Vec<String>) -> Vec<String> {
    let rules = filter_rules(provider);
    let dated = regex_lite::Regex::new(r"\d{4}-\d{2}-\d{2}").ok();

    ids.into_iter()
        .filter(|id| {
            let lower = id.to_ascii_lowercase();
            if !rules.allowed_prefixes.iter().any(|p| lower.starts_with(p)) {
                return false;
            }
            if rules.blocked_substrings.iter().any(|b| lower.contains(b)) {
                return false;
            }
            if rules.drop_dated && dated.as_ref().is_some_and(|re| re.is_match(&lower)) {
                return false;
            }
            true
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct GeminiModelList {
    #[serde(default)]
    models: Vec<GeminiModelEntry>,
}

#[derive(Debug, Deserialize)]
struct GeminiModelEntry {
    name: String,
}

/// Listing shape shared by the OpenAI and Anthropic endpoints.
#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

impl AiClient {
    /// List the provider's currently usable chat models.
    ///
    /// Calls the native listing endpoint, then filters through the curated
    /// rule table. Gemini ids arrive as `models/<id>` and are stripped to
    /// the bare id.
    pub async fn list_models(
        &self,
        provider: Provider,
        api_key: Option<String>,
    ) -> Result<Vec<String>> {
        let api_key = self.resolve_credential(provider, api_key)?;
        let (base_url, _) = self.resolved_target(provider)?;

        let url = match provider {
            Provider::Gemini | Provider::OpenAi => format!("{}/models", base_url),
            Provider::Anthropic => format!("{}/v1/models", base_url),
        };

        let request = with_auth(self.http.get(&url), provider, api_key.as_deref())?;
        let response = send_checked(provider, request).await?;

        let ids: Vec<String> = match provider {
            Provider::Gemini => {
                let parsed: GeminiModelList = response.json().await.map_err(|e| {
                    ApiError::bad_upstream(format!("Unparseable gemini model list: {}", e))
                })?;
                parsed
                    .models
                    .into_iter()
                    .map(|m| m.name.trim_start_matches("models/").to_string())
                    .collect()
            }
            Provider::OpenAi | Provider::Anthropic => {
                let parsed: ModelList = response.json().await.map_err(|e| {
                    ApiError::bad_upstream(format!("Unparseable {} model list: {}", provider, e))
                })?;
                parsed.data.into_iter().map(|m| m.id).collect()
            }
        };

        Ok(filter_models(provider, ids))
    }
}
