//! AI-assisted task breakdown.

use anyhow::Result;

use super::{AiClient, Provider};
use crate::error::ApiError;

impl AiClient {
    /// Ask a provider to split a task into subtask labels.
    ///
    /// `context` is the free-text AI context of the owning project, passed
    /// through verbatim when present.
    pub async fn breakdown(
        &self,
        provider: Provider,
        label: &str,
        context: Option<&str>,
        api_key: Option<String>,
    ) -> Result<Vec<String>> {
        let prompt = breakdown_prompt(label, context);
        let text = self
            .generate(provider, "breakdown", &prompt, api_key)
            .await?;
        parse_breakdown(&text)
    }
}

fn breakdown_prompt(label: &str, context: Option<&str>) -> String {
    let mut prompt = format!(
        "Break down the following task into 3-7 concrete subtasks.\n\nTask: {}\n",
        label
    );
    if let Some(context) = context.filter(|c| !c.trim().is_empty()) {
        prompt.push_str(&format!("Context: {}\n", context.trim()));
    }
    prompt.push_str(
        "\nRespond with a JSON array of short subtask labels and nothing else. \
         Example: [\"First step\", \"Second step\"]",
    );
    prompt
}

/// Pull the subtask list out of a model response.
///
/// Models wrap JSON in prose and code fences, so the first bracketed span
/// (greedy, dotall) is taken and parsed strictly after that. No span or a
/// failed parse means the upstream answered in an unusable shape.
fn parse_breakdown(text: &str) -> Result<Vec<String>> {
    let span = extract_json_array(text)
        .ok_or_else(|| ApiError::bad_upstream("Response contained no JSON array"))?;

    let items: Vec<String> = serde_json::from_str(span).map_err(|e| {
        ApiError::bad_upstream(format!("Response JSON array did not parse: {}", e))
    })?;

    Ok(items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}

fn extract_json_array(text: &str) -> Option<&str> {
    let re = regex_lite::Regex::new(r"(?s)\[.*\]").ok()?;
    re.find(text).map(|m| m.as_str())
}
