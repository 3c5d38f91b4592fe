use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, FromRequest, Multipart, Request, State, rejection::JsonRejection},
    routing::{get, post},
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::checkout::{CheckoutMetadata, CheckoutUrls, build_checkout_request};
use crate::error::ApiError;
use crate::fulfillment::{self, GeneratedPortrait};
use crate::generation::{FAL_EDIT_MODEL, GUIDANCE_SCALE, ImageGenerator};
use crate::image_processing;
use crate::payments::PaymentGateway;
use crate::reducer::ReducerOptions;
use crate::settings::{self, PromptBook, SiteContent};
use crate::store::ConfigStore;
use crate::styles::{ProductType, Style};
use crate::uploads::{UPLOAD_ROUTE, UploadStorage, sniff_upload};
use crate::validation::{validate_http_url, validate_image_reference, validate_session_id};

pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ConfigStore>,
    pub payments: Arc<dyn PaymentGateway>,
    pub generator: Arc<dyn ImageGenerator>,
    pub uploads: Arc<UploadStorage>,
    pub http: reqwest::Client,
    pub checkout_urls: CheckoutUrls,
    pub reducer: ReducerOptions,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let uploads_dir = state.uploads.base_dir().to_path_buf();

    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/checkout", post(checkout_handler))
        .route("/api/get-session", post(get_session_handler))
        .route("/api/edit-image", post(edit_image_handler))
        .route("/api/fulfill", post(fulfill_handler))
        .route(
            "/api/admin/prompts",
            get(admin_get_handler).post(admin_post_handler),
        )
        .route("/api/prepare-for-print", post(prepare_for_print_handler))
        .route(
            "/api/upload",
            post(upload_handler).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .nest_service(UPLOAD_ROUTE, ServeDir::new(uploads_dir))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// `Json` whose rejections are reported in the API's own error shape.
pub struct ApiJson<T>(pub T);

impl<T, S> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

fn required(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

// ============================================================================
// Health
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// ============================================================================
// Checkout
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutBody {
    pub image_url: Option<String>,
    pub style: Option<String>,
    pub product_type: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckoutResponse {
    status: &'static str,
    session_id: String,
    url: Option<String>,
}

async fn checkout_handler(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CheckoutBody>,
) -> Result<Json<CheckoutResponse>, ApiError> {
    let (request, _) = build_checkout_request(
        body.image_url.as_deref().unwrap_or_default(),
        body.style.as_deref().unwrap_or_default(),
        body.product_type.as_deref().unwrap_or_default(),
        &state.checkout_urls,
        &state.reducer,
        Utc::now(),
    )?;
    let session = state.payments.create_checkout(&request).await?;
    Ok(Json(CheckoutResponse {
        status: "success",
        session_id: session.id,
        url: session.url,
    }))
}

// ============================================================================
// Session lookup
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionBody {
    pub session_id: Option<String>,
}

#[derive(Serialize)]
struct SessionView {
    id: String,
    payment_status: String,
    metadata: BTreeMap<String, String>,
}

#[derive(Serialize)]
struct SessionResponse {
    status: &'static str,
    session: SessionView,
}

async fn get_session_handler(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<SessionBody>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session_id = validate_session_id(body.session_id.as_deref().unwrap_or_default())?;
    let session = state.payments.retrieve_session(session_id).await?;
    Ok(Json(SessionResponse {
        status: "success",
        session: SessionView {
            id: session.id,
            payment_status: session.payment_status,
            metadata: session.metadata,
        },
    }))
}

// ============================================================================
// Single image edit
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditImageBody {
    pub image_url: Option<String>,
    pub style: Option<String>,
}

#[derive(Serialize)]
struct EditSettings {
    guidance_scale: f64,
    prompt: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EditImageResponse {
    status: &'static str,
    image_url: String,
    method: &'static str,
    model_used: &'static str,
    style: Style,
    settings: EditSettings,
}

async fn edit_image_handler(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<EditImageBody>,
) -> Result<Json<EditImageResponse>, ApiError> {
    let (Some(image_url), Some(style)) = (
        required(body.image_url.as_deref()),
        required(body.style.as_deref()),
    ) else {
        return Err(ApiError::bad_request("imageUrl and style are required"));
    };
    let style: Style = style
        .parse()
        .map_err(|err: crate::styles::UnknownStyle| ApiError::bad_request(err.to_string()))?;
    let image_url = validate_image_reference(image_url)?;

    let prompts = settings::load_prompts(state.store.as_ref()).await?;
    let portrait =
        fulfillment::generate_portrait(state.generator.as_ref(), &prompts, &image_url, style)
            .await?;
    Ok(Json(EditImageResponse {
        status: "success",
        image_url: portrait.image_url,
        method: FAL_EDIT_MODEL,
        model_used: FAL_EDIT_MODEL,
        style,
        settings: EditSettings {
            guidance_scale: GUIDANCE_SCALE,
            prompt: prompts.prompt_for(style).to_string(),
        },
    }))
}

// ============================================================================
// Post-payment fulfillment
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FulfillResponse {
    status: &'static str,
    session_id: String,
    product_type: ProductType,
    images: Vec<GeneratedPortrait>,
}

async fn fulfill_handler(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<SessionBody>,
) -> Result<Json<FulfillResponse>, ApiError> {
    let session_id = validate_session_id(body.session_id.as_deref().unwrap_or_default())?;
    let session = state.payments.retrieve_session(session_id).await?;
    if !session.is_paid() {
        return Err(ApiError::PaymentRequired(format!(
            "payment not completed (status: {})",
            session.payment_status
        )));
    }
    let metadata = CheckoutMetadata::from_map(&session.metadata)?;
    let prompts = settings::load_prompts(state.store.as_ref()).await?;
    let images = fulfillment::fulfill(state.generator.as_ref(), &prompts, &metadata).await?;
    info!(session_id = %session.id, count = images.len(), "portraits delivered");
    Ok(Json(FulfillResponse {
        status: "success",
        session_id: session.id,
        product_type: metadata.product_type,
        images,
    }))
}

// ============================================================================
// Admin settings
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AdminSettingsResponse {
    prompts: PromptBook,
    site_content: SiteContent,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminUpdateBody {
    pub prompts: Option<BTreeMap<String, String>>,
    pub site_content: Option<SiteContent>,
}

#[derive(Serialize)]
struct AdminUpdateResponse {
    success: bool,
}

async fn admin_get_handler(
    State(state): State<AppState>,
) -> Result<Json<AdminSettingsResponse>, ApiError> {
    let prompts = settings::load_prompts(state.store.as_ref()).await?;
    let site_content = settings::load_site_content(state.store.as_ref()).await?;
    Ok(Json(AdminSettingsResponse {
        prompts,
        site_content,
    }))
}

async fn admin_post_handler(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<AdminUpdateBody>,
) -> Result<Json<AdminUpdateResponse>, ApiError> {
    let prompts = body
        .prompts
        .map(PromptBook::from_entries)
        .transpose()
        .map_err(|err| ApiError::bad_request(err.to_string()))?;
    if let Some(prompts) = prompts {
        settings::save_prompts(state.store.as_ref(), &prompts).await?;
        info!(count = prompts.len(), "prompts updated");
    }
    if let Some(site_content) = body.site_content {
        settings::save_site_content(state.store.as_ref(), &site_content).await?;
        info!("site content updated");
    }
    Ok(Json(AdminUpdateResponse { success: true }))
}

// ============================================================================
// Print preparation
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintBody {
    pub image_url: Option<String>,
    pub orientation: Option<String>,
}

#[derive(Serialize)]
struct PrintDimensions {
    width: u32,
    height: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PrintResponse {
    success: bool,
    processed_image_url: String,
    dimensions: PrintDimensions,
    orientation: String,
}

async fn prepare_for_print_handler(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<PrintBody>,
) -> Result<Json<PrintResponse>, ApiError> {
    let image_url = required(body.image_url.as_deref())
        .ok_or_else(|| ApiError::bad_request("Image URL is required"))?;
    let landscape = match required(body.orientation.as_deref()) {
        Some("portrait") => false,
        Some("landscape") => true,
        _ => {
            return Err(ApiError::bad_request(
                "Orientation must be \"portrait\" or \"landscape\"",
            ));
        }
    };
    let url = validate_http_url(image_url)?;

    let response = state
        .http
        .get(url)
        .send()
        .await
        .map_err(|_| ApiError::bad_request("Failed to download image"))?;
    if !response.status().is_success() {
        return Err(ApiError::bad_request("Failed to download image"));
    }
    let bytes = response
        .bytes()
        .await
        .map_err(|_| ApiError::bad_request("Failed to download image"))?;

    let (width, height) = image_processing::print_dimensions(landscape);
    let processed = tokio::task::spawn_blocking(move || {
        image_processing::prepare_for_print(&bytes, width, height)
    })
    .await
    .map_err(|err| ApiError::Internal(err.to_string()))?
    .map_err(|err| {
        warn!(error = %err, "print preparation failed");
        ApiError::Internal("Failed to process image for printing".to_string())
    })?;

    Ok(Json(PrintResponse {
        success: true,
        processed_image_url: format!("data:image/jpeg;base64,{}", STANDARD.encode(processed)),
        dimensions: PrintDimensions { width, height },
        orientation: if landscape { "landscape" } else { "portrait" }.to_string(),
    }))
}

// ============================================================================
// Uploads
// ============================================================================

#[derive(Serialize)]
struct UploadResponse {
    url: String,
    key: String,
}

async fn upload_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::bad_request(format!("failed to read form: {err}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let content_type = field.content_type().map(str::to_string);
        let file_name = field.file_name().unwrap_or("").to_string();
        let data = field
            .bytes()
            .await
            .map_err(|err| ApiError::bad_request(format!("failed to read file: {err}")))?;
        upload = Some((file_name, content_type, data));
        break;
    }

    let (file_name, content_type, data) =
        upload.ok_or_else(|| ApiError::bad_request("no file uploaded"))?;
    if let Some(content_type) = content_type.as_deref() {
        if !content_type.starts_with("image/") {
            return Err(ApiError::bad_request("unsupported file type"));
        }
    }
    if data.is_empty() {
        return Err(ApiError::bad_request("uploaded file is empty"));
    }
    if sniff_upload(&data).is_none() {
        return Err(ApiError::bad_request(
            "uploaded file is not a PNG, JPEG, GIF, WebP or BMP image",
        ));
    }

    let stored = state
        .uploads
        .save(&file_name, data.as_ref())
        .await
        .map_err(|err| ApiError::Internal(format!("failed to save file: {err}")))?;
    info!(key = %stored.key, size = data.len(), "upload stored");
    Ok(Json(UploadResponse {
        url: stored.url,
        key: stored.key,
    }))
}
