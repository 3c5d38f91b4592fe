use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use artzyful::{
    checkout::CheckoutUrls,
    config::AppConfig,
    generation::FalClient,
    logging,
    payments::StripeClient,
    routes::{AppState, build_router},
    store::FileConfigStore,
    uploads::UploadStorage,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    logging::init();
    let config = AppConfig::from_env()?;

    let http = reqwest::Client::new();
    let state = AppState {
        store: Arc::new(FileConfigStore::new(config.settings_dir())),
        payments: Arc::new(StripeClient::new(
            http.clone(),
            config.stripe_api_base.clone(),
            config.stripe_secret_key.clone(),
        )),
        generator: Arc::new(FalClient::new(
            http.clone(),
            config.fal_api_base.clone(),
            config.fal_key.clone(),
        )),
        uploads: Arc::new(UploadStorage::new(
            config.uploads_dir(),
            config.public_base_url.clone(),
        )),
        http,
        checkout_urls: CheckoutUrls::for_site(&config.site_url),
        reducer: config.reducer,
    };
    let router = build_router(state);
    let tcp_listener = tokio::net::TcpListener::bind(&config.bind_address).await?;

    info!(
        address = %config.bind_address,
        data_dir = %config.data_dir.display(),
        "artzyful server started"
    );

    axum::serve(tcp_listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}
