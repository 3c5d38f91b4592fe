use url::Url;

use crate::error::ApiError;

pub fn validate_http_url(raw: &str) -> Result<Url, ApiError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ApiError::bad_request("Image URL is required"));
    }
    let parsed = Url::parse(trimmed)
        .map_err(|err| ApiError::bad_request(format!("invalid image URL: {err}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        scheme => Err(ApiError::bad_request(format!(
            "only http and https image URLs are allowed, got {scheme}"
        ))),
    }
}

/// Accepts the references the image editor can read: http(s) URLs and
/// inline `data:image/...` URIs.
pub fn validate_image_reference(raw: &str) -> Result<String, ApiError> {
    let trimmed = raw.trim();
    if trimmed.starts_with("data:image/") {
        return Ok(trimmed.to_string());
    }
    validate_http_url(trimmed).map(|url| url.to_string())
}

/// Checkout session ids are opaque tokens like `cs_test_a1B2c3`. Anything
/// else would end up in the provider's URL path.
pub fn validate_session_id(raw: &str) -> Result<&str, ApiError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ApiError::bad_request("sessionId is required"));
    }
    if !trimmed
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
    {
        return Err(ApiError::bad_request("Invalid sessionId"));
    }
    Ok(trimmed)
}
