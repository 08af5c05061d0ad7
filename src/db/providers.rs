//! Provider configuration overrides and the AI call log.

use super::{Database, now_ms};
use crate::types::ProviderConfig;
use anyhow::Result;
use rusqlite::{Row, params};

pub(crate) fn parse_provider_config_row(row: &Row) -> rusqlite::Result<ProviderConfig> {
    Ok(ProviderConfig {
        provider: row.get(0)?,
        base_url: row.get(1)?,
        model: row.get(2)?,
        updated_at: row.get(3)?,
    })
}

impl Database {
    /// Get the stored override row for a provider, if any.
    pub fn get_provider_config(&self, provider: &str) -> Result<Option<ProviderConfig>> {
        self.with_conn(|conn| {
            match conn.query_row(
                "SELECT provider, base_url, model, updated_at
                 FROM provider_config WHERE provider = ?1",
                params![provider],
                parse_provider_config_row,
            ) {
                Ok(config) => Ok(Some(config)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }

    /// Upsert a provider's override row. The write is a full replace of
    /// both fields: passing None clears a previously stored value.
    pub fn put_provider_config(
        &self,
        provider: &str,
        base_url: Option<String>,
        model: Option<String>,
    ) -> Result<ProviderConfig> {
        let config = ProviderConfig {
            provider: provider.to_string(),
            base_url,
            model,
            updated_at: now_ms(),
        };

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO provider_config (provider, base_url, model, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(provider) DO UPDATE SET
                     base_url = excluded.base_url,
                     model = excluded.model,
                     updated_at = excluded.updated_at",
                params![
                    config.provider,
                    config.base_url,
                    config.model,
                    config.updated_at,
                ],
            )?;
            Ok(config)
        })
    }

    /// Append one row to the AI call log. Exactly one of `response` and
    /// `error` is expected to be present.
    #[allow(clippy::too_many_arguments)]
    pub fn log_ai_call(
        &self,
        provider: &str,
        model: &str,
        endpoint: &str,
        prompt: &str,
        response: Option<&str>,
        error: Option<&str>,
        duration_ms: i64,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO ai_call_log (provider, model, endpoint, prompt, response, error,
                                          duration_ms, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    provider,
                    model,
                    endpoint,
                    prompt,
                    response,
                    error,
                    duration_ms,
                    now_ms(),
                ],
            )?;
            Ok(())
        })
    }
}
