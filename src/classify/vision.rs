//! Fallback classifier backed by an OpenAI-style vision chat model.

use super::{FallbackClassifier, RawEntry};
use crate::config::FallbackConfig;
use crate::constants::{FALLBACK_MAX_CANDIDATES, FALLBACK_TIMEOUT};
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Vision-model fallback invoked when the primary classifier stays generic.
pub struct VisionFallback {
    api_key: String,
    model: String,
    base_url: String,
    http: reqwest::Client,
}

impl VisionFallback {
    /// Create a fallback client from configuration.
    ///
    /// Returns `None` when no API key is configured; the pipeline then
    /// terminates generic images with zero attributions instead.
    pub fn from_config(config: &FallbackConfig) -> Option<Self> {
        let api_key = config.api_key.clone().filter(|k| !k.is_empty())?;
        Some(Self {
            api_key,
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        })
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.api_key)).map_err(|e| {
            Error::Internal {
                message: format!("invalid fallback API key: {e}"),
            }
        })?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }
}

#[async_trait]
impl FallbackClassifier for VisionFallback {
    async fn identify(&self, image_url: &str, region_name: &str) -> Result<Vec<RawEntry>> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model: self.model.clone(),
            max_tokens: 500,
            messages: vec![Message {
                role: "user".to_string(),
                content: vec![
                    ContentPart::Text {
                        text: build_prompt(region_name),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: image_url.to_string(),
                        },
                    },
                ],
            }],
        };

        debug!(model = %self.model, "Vision fallback request");

        let response = self
            .http
            .post(&url)
            .headers(self.headers()?)
            .timeout(FALLBACK_TIMEOUT)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::FallbackRequest { source: e })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::FallbackRateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::FallbackResponse {
                status: status.as_u16(),
                body,
            });
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::FallbackRequest { source: e })?;

        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::FallbackParse {
                reason: "empty completion".to_string(),
            })?;

        parse_candidates(&content)
    }
}

/// Build the region-constrained identification prompt.
fn build_prompt(region_name: &str) -> String {
    format!(
        "Identify the bird species in this image. These images are taken in {region_name}. \
         Please only suggest species found in that region. Return ONLY a JSON array with up to \
         {FALLBACK_MAX_CANDIDATES} possible species, each with 'name' (common name) and \
         'confidence' (0-1). If no bird or unsure, return empty array []."
    )
}

/// Extract the JSON array of candidates from the completion text.
///
/// Models wrap the array in prose or code fences often enough that a
/// bracket scan is more robust than parsing the whole completion.
fn parse_candidates(content: &str) -> Result<Vec<RawEntry>> {
    let Some(start) = content.find('[') else {
        return Ok(Vec::new());
    };
    let Some(end) = content.rfind(']') else {
        return Ok(Vec::new());
    };
    if end < start {
        return Ok(Vec::new());
    }

    let candidates: Vec<Candidate> =
        serde_json::from_str(&content[start..=end]).map_err(|e| Error::FallbackParse {
            reason: e.to_string(),
        })?;

    Ok(candidates
        .into_iter()
        .take(FALLBACK_MAX_CANDIDATES)
        .map(|c| RawEntry {
            species: c.name,
            confidence: c.confidence,
            detail: None,
        })
        .collect())
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: Vec<ContentPart>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    name: Option<String>,
    confidence: Option<f64>,
}
