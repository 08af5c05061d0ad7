//! Grounded pricing extraction from provider documentation pages.
//!
//! Model pricing changes faster than model training data, so asking a
//! model "what does gpt-4o cost" from memory returns stale numbers. The
//! refresh instead fetches the provider's public pricing page, flattens
//! the HTML to plain text, and asks the extraction model to read prices
//! out of that text for a known candidate list.

use std::collections::BTreeMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{AiClient, Provider};
use crate::error::{ApiError, ErrorCode};

/// USD per million tokens.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPrice {
    pub input: f64,
    pub output: f64,
}

/// Outcome of one pricing refresh.
#[derive(Debug, Clone, Serialize)]
pub struct PricingRefresh {
    pub prices: BTreeMap<String, ModelPrice>,
    pub models_discovered: usize,
    pub models_priced: usize,
}

fn pricing_page_url(provider: Provider) -> &'static str {
    match provider {
        Provider::Gemini => "https://ai.google.dev/gemini-api/docs/pricing",
        Provider::OpenAi => "https://platform.openai.com/docs/pricing",
        Provider::Anthropic => "https://docs.anthropic.com/en/docs/about-claude/pricing",
    }
}

/// Reduce an HTML document to readable plain text.
///
/// Tables survive as one line per row with cells separated by single
/// spaces, which is enough structure for a model to read prices off.
pub(crate) fn flatten_html(html: &str) -> String {
    let mut text = html.to_string();

    for pattern in [
        r"(?is)<script\b[^>]*>.*?</script>",
        r"(?is)<style\b[^>]*>.*?</style>",
    ] {
        if let Ok(re) = regex_lite::Regex::new(pattern) {
            text = re.replace_all(&text, " ").into_owned();
        }
    }

    // Block-level boundaries become line breaks so table rows stay distinct.
    if let Ok(re) = regex_lite::Regex::new(
        r"(?i)</?(p|div|tr|br|li|h[1-6]|table|thead|tbody|section|article)\b[^>]*>",
    ) {
        text = re.replace_all(&text, "\n").into_owned();
    }

    // Remaining tags (td, span, a, ...) separate inline content.
    if let Ok(re) = regex_lite::Regex::new(r"(?s)<[^>]+>") {
        text = re.replace_all(&text, " ").into_owned();
    }

    // &amp; decodes last so "&amp;lt;" stays a literal "&lt;".
    let text = text
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&");

    let mut lines: Vec<String> = Vec::new();
    for line in text.lines() {
        let collapsed = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            if lines.last().is_none_or(|l| l.is_empty()) {
                continue;
            }
            lines.push(String::new());
        } else {
            lines.push(collapsed);
        }
    }
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines.join("\n")
}

fn pricing_prompt(provider: Provider, page_text: &str, candidates: &[String]) -> String {
    format!(
        "Below is the plain-text rendering of the official {} pricing page, \
         followed by a list of model ids.\n\n\
         --- PRICING PAGE ---\n{}\n--- END PRICING PAGE ---\n\n\
         Models: {}\n\n\
         Using only the page text above, respond with a JSON object and nothing \
         else, mapping each model id to its prices in USD per million tokens, \
         shaped like {{\"model-id\": {{\"input\": 1.25, \"output\": 5.0}}}}. \
         Omit models whose prices do not appear on the page.",
        provider,
        page_text,
        candidates.join(", ")
    )
}

/// First `{...}` span in the response, braces included.
fn extract_json_object(text: &str) -> Option<&str> {
    let re = regex_lite::Regex::new(r"(?s)\{.*\}").ok()?;
    re.find(text).map(|m| m.as_str())
}

/// Accept a bare number or a string with an optional leading `$`.
fn parse_price(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_start_matches('$').trim().parse().ok(),
        _ => None,
    }
}

fn parse_pricing_response(text: &str) -> Result<BTreeMap<String, ModelPrice>> {
    let span = extract_json_object(text)
        .ok_or_else(|| ApiError::bad_upstream("Response contained no JSON object"))?;
    let parsed: Value = serde_json::from_str(span).map_err(|e| {
        ApiError::bad_upstream(format!("Response JSON object did not parse: {}", e))
    })?;
    let Value::Object(entries) = parsed else {
        return Err(ApiError::bad_upstream("Response JSON was not an object").into());
    };

    let mut prices = BTreeMap::new();
    for (model, entry) in entries {
        let input = entry.get("input").and_then(parse_price);
        let output = entry.get("output").and_then(parse_price);
        if let (Some(input), Some(output)) = (input, output) {
            prices.insert(model, ModelPrice { input, output });
        }
    }
    Ok(prices)
}

impl AiClient {
    /// Refresh pricing for `provider`'s curated model list.
    ///
    /// `extractor` picks which provider's model reads the page text; it
    /// defaults to `provider` itself.
    pub async fn refresh_pricing(
        &self,
        provider: Provider,
        api_key: Option<String>,
        extractor: Option<Provider>,
    ) -> Result<PricingRefresh> {
        self.refresh_pricing_from(provider, api_key, extractor, pricing_page_url(provider))
            .await
    }

    /// Like [`AiClient::refresh_pricing`] but against an explicit pricing
    /// page URL.
    pub async fn refresh_pricing_from(
        &self,
        provider: Provider,
        api_key: Option<String>,
        extractor: Option<Provider>,
        page_url: &str,
    ) -> Result<PricingRefresh> {
        let candidates = self.list_models(provider, api_key.clone()).await?;

        let page = self.fetch_pricing_page(provider, page_url).await?;
        let page_text = flatten_html(&page);

        let extractor = extractor.unwrap_or(provider);
        // A key supplied for `provider` must not leak to a different
        // extraction provider; that one resolves from its own env var.
        let extractor_key = if extractor == provider { api_key } else { None };

        let prompt = pricing_prompt(provider, &page_text, &candidates);
        let response = self
            .generate(extractor, "pricing", &prompt, extractor_key)
            .await?;

        let prices = parse_pricing_response(&response)?;
        Ok(PricingRefresh {
            models_discovered: candidates.len(),
            models_priced: prices.len(),
            prices,
        })
    }

    /// Pricing pages are public documentation; no auth is attached.
    async fn fetch_pricing_page(&self, provider: Provider, url: &str) -> Result<String> {
        let response = self.http.get(url).send().await.map_err(|e| {
            ApiError::new(
                ErrorCode::UpstreamError,
                format!("{} pricing page fetch failed: {}", provider, e),
            )
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::upstream(
                &format!("{} pricing page", provider),
                status.as_u16(),
                &body,
            )
            .into());
        }

        response.text().await.map_err(|e| {
            ApiError::new(
                ErrorCode::UpstreamError,
                format!("{} pricing page read failed: {}", provider, e),
            )
            .into()
        })
    }
}
