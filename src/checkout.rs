use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{info, warn};

use crate::error::ApiError;
use crate::payments::{CheckoutRequest, LineItem};
use crate::reducer::{self, ImageSource, Reduction, ReducerOptions, TRUNCATION_MARKER};
use crate::styles::{ProductType, Style};

pub const META_IMAGE_URL: &str = "imageUrl";
pub const META_STYLE: &str = "style";
pub const META_PRODUCT_TYPE: &str = "productType";
pub const META_TIMESTAMP: &str = "timestamp";

pub const IMAGE_TOO_LARGE: &str =
    "Image is too large to attach to checkout. Upload it with /api/upload and use the returned URL";

/// The bag attached to a checkout session and read back after payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutMetadata {
    pub image_url: String,
    pub style: Style,
    pub product_type: ProductType,
    pub timestamp: String,
}

impl CheckoutMetadata {
    pub fn to_map(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (META_IMAGE_URL.to_string(), self.image_url.clone()),
            (META_STYLE.to_string(), self.style.to_string()),
            (META_PRODUCT_TYPE.to_string(), self.product_type.to_string()),
            (META_TIMESTAMP.to_string(), self.timestamp.clone()),
        ])
    }

    pub fn from_map(metadata: &BTreeMap<String, String>) -> Result<Self, ApiError> {
        let field = |name: &str| {
            metadata
                .get(name)
                .map(|value| value.trim())
                .filter(|value| !value.is_empty())
                .ok_or_else(|| ApiError::bad_request(format!("session metadata is missing {name}")))
        };
        let image_url = field(META_IMAGE_URL)?;
        if image_url.ends_with(TRUNCATION_MARKER) {
            return Err(ApiError::bad_request(
                "session image reference was truncated and cannot be used",
            ));
        }
        let image_url = image_url.to_string();
        let style = field(META_STYLE)?
            .parse::<Style>()
            .map_err(|err| ApiError::bad_request(err.to_string()))?;
        let product_type = field(META_PRODUCT_TYPE)?
            .parse::<ProductType>()
            .map_err(|err| ApiError::bad_request(err.to_string()))?;
        let timestamp = metadata.get(META_TIMESTAMP).cloned().unwrap_or_default();
        Ok(Self {
            image_url,
            style,
            product_type,
            timestamp,
        })
    }
}

#[derive(Debug, Clone)]
pub struct CheckoutUrls {
    pub success_url: String,
    pub cancel_url: String,
}

impl CheckoutUrls {
    pub fn for_site(site_url: &str) -> Self {
        let base = site_url.trim().trim_end_matches('/');
        Self {
            success_url: format!("{base}/success?session_id={{CHECKOUT_SESSION_ID}}"),
            cancel_url: format!("{base}/pet-styles.html"),
        }
    }
}

/// Validates the storefront's checkout form and prepares the payment
/// provider request. The image reference is shrunk to fit the metadata
/// value limit. A reference that only fits once truncated is refused, since
/// fulfillment could never generate from it.
pub fn build_checkout_request(
    image_url: &str,
    style: &str,
    product_type: &str,
    urls: &CheckoutUrls,
    reducer_options: &ReducerOptions,
    now: DateTime<Utc>,
) -> Result<(CheckoutRequest, Reduction), ApiError> {
    if image_url.trim().is_empty() || style.trim().is_empty() || product_type.trim().is_empty() {
        return Err(ApiError::bad_request(
            "imageUrl, style, and productType are required",
        ));
    }
    let style: Style = style
        .parse()
        .map_err(|err: crate::styles::UnknownStyle| ApiError::bad_request(err.to_string()))?;
    let product_type: ProductType = product_type
        .parse()
        .map_err(|err: crate::styles::UnknownProductType| ApiError::bad_request(err.to_string()))?;

    let reduction = reducer::reduce(ImageSource::Reference(image_url.trim()), reducer_options);
    if reduction.is_lossy() {
        warn!(
            max_len = reducer_options.max_len,
            "image reference does not fit checkout metadata"
        );
        return Err(ApiError::bad_request(IMAGE_TOO_LARGE));
    }
    info!(kind = reduction.kind(), "image reference prepared for checkout");

    let metadata = CheckoutMetadata {
        image_url: reduction.as_str().to_string(),
        style,
        product_type,
        timestamp: now.to_rfc3339_opts(SecondsFormat::Millis, true),
    };
    let product = product_type.product();
    let request = CheckoutRequest {
        line_item: LineItem {
            name: product.name.to_string(),
            description: product.description.to_string(),
            unit_amount: product.unit_amount,
            currency: product.currency.to_string(),
            quantity: 1,
        },
        success_url: urls.success_url.clone(),
        cancel_url: urls.cancel_url.clone(),
        metadata: metadata.to_map(),
    };
    Ok((request, reduction))
}
