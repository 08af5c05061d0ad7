//! Wire formats for the provider variants.
//!
//! Each variant speaks its native chat-completion shape; nothing is
//! normalized onto a common envelope on the wire, only the extracted text
//! comes back. Response structs model just the fields that are read.

use crate::error::{ApiError, ErrorCode};
use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::Provider;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic requires an explicit completion budget on every request.
const ANTHROPIC_MAX_TOKENS: u32 = 1024;

pub(crate) async fn chat(
    http: &reqwest::Client,
    provider: Provider,
    base_url: &str,
    model: &str,
    api_key: Option<&str>,
    prompt: &str,
) -> Result<String> {
    match provider {
        Provider::Gemini => gemini_chat(http, base_url, model, api_key, prompt).await,
        Provider::OpenAi => openai_chat(http, base_url, model, api_key, prompt).await,
        Provider::Anthropic => anthropic_chat(http, base_url, model, api_key, prompt).await,
    }
}

/// Attach the variant's auth headers. Gemini goes out bare when no key is
/// present; the other variants refuse to build an unauthenticated request.
pub(crate) fn with_auth(
    request: reqwest::RequestBuilder,
    provider: Provider,
    api_key: Option<&str>,
) -> Result<reqwest::RequestBuilder> {
    match provider {
        Provider::Gemini => Ok(match api_key {
            Some(key) => request.header("x-goog-api-key", key),
            None => request,
        }),
        Provider::OpenAi => {
            let key = api_key.ok_or_else(|| ApiError::no_credential(provider.as_str()))?;
            Ok(request.header("Authorization", format!("Bearer {}", key)))
        }
        Provider::Anthropic => {
            let key = api_key.ok_or_else(|| ApiError::no_credential(provider.as_str()))?;
            Ok(request
                .header("x-api-key", key)
                .header("anthropic-version", ANTHROPIC_VERSION))
        }
    }
}

/// Send a request and normalize failures: transport errors and non-2xx
/// statuses both become UpstreamError, with the response body truncated
/// into the error details.
pub(crate) async fn send_checked(
    provider: Provider,
    request: reqwest::RequestBuilder,
) -> Result<reqwest::Response> {
    let response = request.send().await.map_err(|e| {
        ApiError::new(
            ErrorCode::UpstreamError,
            format!("{} request failed: {}", provider, e),
        )
    })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError::upstream(provider.as_str(), status.as_u16(), &body).into());
    }

    Ok(response)
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

// ---- Gemini ----

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

async fn gemini_chat(
    http: &reqwest::Client,
    base_url: &str,
    model: &str,
    api_key: Option<&str>,
    prompt: &str,
) -> Result<String> {
    let url = format!("{}/models/{}:generateContent", base_url, model);
    let body = GeminiRequest {
        contents: vec![GeminiContent {
            parts: vec![GeminiPart {
                text: prompt.to_string(),
            }],
        }],
    };

    let request = with_auth(http.post(&url).json(&body), Provider::Gemini, api_key)?;
    let response = send_checked(Provider::Gemini, request).await?;

    let parsed: GeminiResponse = response
        .json()
        .await
        .map_err(|e| ApiError::bad_upstream(format!("Unparseable gemini response: {}", e)))?;

    parsed
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|c| c.parts.into_iter().next())
        .map(|p| p.text)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::bad_upstream("gemini response contained no text").into())
}

// ---- OpenAI-compatible ----

#[derive(Debug, Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: Option<OpenAiMessage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiMessage {
    content: Option<String>,
}

async fn openai_chat(
    http: &reqwest::Client,
    base_url: &str,
    model: &str,
    api_key: Option<&str>,
    prompt: &str,
) -> Result<String> {
    let url = format!("{}/chat/completions", base_url);
    let body = OpenAiRequest {
        model,
        messages: vec![ChatMessage {
            role: "user",
            content: prompt,
        }],
    };

    let request = with_auth(http.post(&url).json(&body), Provider::OpenAi, api_key)?;
    let response = send_checked(Provider::OpenAi, request).await?;

    let parsed: OpenAiResponse = response
        .json()
        .await
        .map_err(|e| ApiError::bad_upstream(format!("Unparseable openai response: {}", e)))?;

    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::bad_upstream("openai response contained no text").into())
}

// ---- Anthropic ----

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<AnthropicBlock>,
}

#[derive(Debug, Deserialize)]
struct AnthropicBlock {
    text: Option<String>,
}

async fn anthropic_chat(
    http: &reqwest::Client,
    base_url: &str,
    model: &str,
    api_key: Option<&str>,
    prompt: &str,
) -> Result<String> {
    let url = format!("{}/v1/messages", base_url);
    let body = AnthropicRequest {
        model,
        max_tokens: ANTHROPIC_MAX_TOKENS,
        messages: vec![ChatMessage {
            role: "user",
            content: prompt,
        }],
    };

    let request = with_auth(http.post(&url).json(&body), Provider::Anthropic, api_key)?;
    let response = send_checked(Provider::Anthropic, request).await?;

    let parsed: AnthropicResponse = response
        .json()
        .await
        .map_err(|e| ApiError::bad_upstream(format!("Unparseable anthropic response: {}", e)))?;

    parsed
        .content
        .into_iter()
        .next()
        .and_then(|b| b.text)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::bad_upstream("anthropic response contained no text").into())
}
