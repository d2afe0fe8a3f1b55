//! PostgREST-backed attribution store.

use super::{AttributionRecord, AttributionStore, ImageTask};
use crate::config::StoreConfig;
use crate::constants::STORE_TIMEOUT;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Deserialize;
use std::collections::HashSet;
use tracing::debug;

/// Store implementation speaking the PostgREST wire protocol
/// (Supabase-compatible).
pub struct RestStore {
    base_url: String,
    images_table: String,
    attributions_table: String,
    http: reqwest::Client,
    key: String,
}

impl RestStore {
    /// Create a store client from validated configuration.
    ///
    /// Call after [`crate::config::validate_config`]; missing URL or key is
    /// a configuration fault, not a runtime one.
    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        let base_url = config
            .url
            .clone()
            .ok_or_else(|| Error::ConfigValidation {
                message: "store.url is required".to_string(),
            })?
            .trim_end_matches('/')
            .to_string();
        let key = config.key.clone().ok_or_else(|| Error::ConfigValidation {
            message: "store.key is required".to_string(),
        })?;

        let http = reqwest::Client::builder()
            .timeout(STORE_TIMEOUT)
            .build()
            .map_err(|e| Error::Internal {
                message: format!("failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            base_url,
            images_table: config.images_table.clone(),
            attributions_table: config.attributions_table.clone(),
            http,
            key,
        })
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        let api_key = HeaderValue::from_str(&self.key).map_err(|e| Error::Internal {
            message: format!("invalid store key: {e}"),
        })?;
        let bearer =
            HeaderValue::from_str(&format!("Bearer {}", self.key)).map_err(|e| Error::Internal {
                message: format!("invalid store key: {e}"),
            })?;
        headers.insert("apikey", api_key);
        headers.insert(AUTHORIZATION, bearer);
        Ok(headers)
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    async fn fetch_attributed_ids(&self, ids: &[&str]) -> Result<HashSet<String>> {
        let quoted: Vec<String> = ids.iter().map(|id| format!("\"{id}\"")).collect();
        let filter = format!("in.({})", quoted.join(","));

        let response = self
            .http
            .get(self.table_url(&self.attributions_table))
            .headers(self.headers()?)
            .query(&[("select", "image_id"), ("image_id", filter.as_str())])
            .send()
            .await
            .map_err(|e| Error::StoreRequest { source: e })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::StoreResponse {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let rows: Vec<AttributedRow> = response
            .json()
            .await
            .map_err(|e| Error::StoreRequest { source: e })?;

        Ok(rows.into_iter().map(|r| r.image_id).collect())
    }
}

#[async_trait]
impl AttributionStore for RestStore {
    async fn fetch_unattributed(&self, limit: usize) -> Result<Vec<ImageTask>> {
        // Over-fetch candidates, then exclude already-attributed images
        // client side; PostgREST has no cheap anti-join here.
        let candidate_limit = limit.saturating_mul(2).to_string();

        let response = self
            .http
            .get(self.table_url(&self.images_table))
            .headers(self.headers()?)
            .query(&[
                ("select", "id,image_url,taken_on"),
                ("order", "taken_on.desc"),
                ("limit", candidate_limit.as_str()),
            ])
            .send()
            .await
            .map_err(|e| Error::StoreRequest { source: e })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::StoreResponse {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let candidates: Vec<ImageTask> = response
            .json()
            .await
            .map_err(|e| Error::StoreRequest { source: e })?;

        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<&str> = candidates.iter().map(|c| c.id.as_str()).collect();
        let attributed = self.fetch_attributed_ids(&ids).await?;

        debug!(
            "{} candidate image(s), {} already attributed",
            candidates.len(),
            attributed.len()
        );

        Ok(candidates
            .into_iter()
            .filter(|c| !attributed.contains(&c.id) && !c.image_url.is_empty())
            .take(limit)
            .collect())
    }

    async fn upsert(&self, record: &AttributionRecord) -> Result<()> {
        let mut headers = self.headers()?;
        headers.insert(
            "Prefer",
            HeaderValue::from_static("resolution=merge-duplicates"),
        );

        let response = self
            .http
            .post(self.table_url(&self.attributions_table))
            .headers(headers)
            .query(&[("on_conflict", "image_id,species,model_version")])
            .json(&[record])
            .send()
            .await
            .map_err(|e| Error::StoreRequest { source: e })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::StoreResponse {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct AttributedRow {
    image_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_config() -> StoreConfig {
        StoreConfig {
            url: Some("https://example.supabase.co/".to_string()),
            key: Some("anon-key".to_string()),
            ..StoreConfig::default()
        }
    }

    #[test]
    fn test_from_config_trims_trailing_slash() {
        let store = RestStore::from_config(&store_config()).ok().map(|s| s.base_url);
        assert_eq!(store.as_deref(), Some("https://example.supabase.co"));
    }

    #[test]
    fn test_from_config_requires_url() {
        let mut config = store_config();
        config.url = None;
        assert!(RestStore::from_config(&config).is_err());
    }

    #[test]
    fn test_query_parameters_serialize_onto_url() {
        let store = RestStore::from_config(&store_config()).ok();
        let request = store.and_then(|s| {
            s.http
                .get(s.table_url(&s.images_table))
                .query(&[("select", "id,image_url,taken_on"), ("limit", "100")])
                .build()
                .ok()
        });

        let url = request.map(|r| r.url().to_string());
        assert_eq!(
            url.as_deref(),
            Some(
                "https://example.supabase.co/rest/v1/images?select=id%2Cimage_url%2Ctaken_on&limit=100"
            )
        );
    }

    #[test]
    fn test_table_url() {
        let store = RestStore::from_config(&store_config()).ok();
        let url = store.map(|s| s.table_url("attributions"));
        assert_eq!(
            url.as_deref(),
            Some("https://example.supabase.co/rest/v1/attributions")
        );
    }
}
