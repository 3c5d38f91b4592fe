use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::error::ProviderError;

pub const FAL_API_BASE: &str = "https://fal.run";
pub const FAL_EDIT_MODEL: &str = "fal-ai/flux-pro/kontext";
pub const GUIDANCE_SCALE: f64 = 3.5;
const PROVIDER: &str = "fal";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub url: String,
}

/// Image editing provider: applies a natural-language instruction to a
/// source image and returns where the result lives.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn edit(&self, image_url: &str, prompt: &str) -> Result<GeneratedImage, ProviderError>;
}

#[derive(Clone, Debug)]
pub struct FalClient {
    client: Client,
    api_base: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct EditResponse {
    images: Option<Vec<OutputImage>>,
}

#[derive(Debug, Deserialize)]
struct OutputImage {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FalErrorResponse {
    detail: Option<serde_json::Value>,
}

impl FalClient {
    pub fn new(client: Client, api_base: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }
}

async fn assert_ok_response(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<FalErrorResponse>(&text)
        .ok()
        .and_then(|payload| payload.detail)
    {
        Some(serde_json::Value::String(detail)) => detail,
        Some(detail) => detail.to_string(),
        None => format!("fal request failed: {status} {text}"),
    };
    Err(ProviderError::Api {
        provider: PROVIDER,
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl ImageGenerator for FalClient {
    async fn edit(&self, image_url: &str, prompt: &str) -> Result<GeneratedImage, ProviderError> {
        debug!(model = FAL_EDIT_MODEL, prompt, "calling image editor");
        let response = self
            .client
            .post(format!("{}/{FAL_EDIT_MODEL}", self.api_base))
            .header(reqwest::header::AUTHORIZATION, format!("Key {}", self.api_key))
            .json(&json!({
                "prompt": prompt,
                "image_url": image_url,
                "guidance_scale": GUIDANCE_SCALE,
            }))
            .send()
            .await
            .map_err(ProviderError::transport(PROVIDER))?;

        let response = assert_ok_response(response).await?;
        let payload: EditResponse = response
            .json()
            .await
            .map_err(|err| ProviderError::malformed(PROVIDER, err.to_string()))?;
        let url = payload
            .images
            .and_then(|images| images.into_iter().next())
            .and_then(|image| image.url)
            .ok_or_else(|| ProviderError::malformed(PROVIDER, "No image URL returned from Fal.ai"))?;
        info!(model = FAL_EDIT_MODEL, "image edit finished");
        Ok(GeneratedImage { url })
    }
}
