use anyhow::Result;
use axum::Router;
use std::{io::ErrorKind, path::Path, sync::Arc, time::Duration};
use tokio::{fs, net::TcpListener};
use tracing_subscriber::EnvFilter;

mod config;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;

use config::{AppConfig, FILE_FIELD, MAX_FILES, ProviderKind};
use services::{
    cloudinary_provider::CloudinaryProvider, gateway_service::GatewayService,
    memory_provider::MemoryProvider, provider::ImageProvider, staging::UploadPolicy,
};

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Load .env, then parse config ---
    if let Err(err) = dotenvy::dotenv() {
        tracing::debug!("No .env file loaded: {}", err);
    }
    let cfg = AppConfig::from_env_and_args()?;

    tracing::info!("Starting image-gateway with config: {:?}", cfg);

    // --- Ensure upload directory exists ---
    if !Path::new(&cfg.upload_dir).exists() {
        fs::create_dir_all(&cfg.upload_dir).await?;
        tracing::info!("Created upload directory at {}", cfg.upload_dir);
    }

    // --- Initialize provider ---
    let provider = build_provider(&cfg)?;
    tracing::info!(
        "Using {} provider, namespace `{}`",
        provider.name(),
        cfg.namespace
    );

    // --- Initialize core service ---
    let policy = UploadPolicy::new(&cfg.upload_dir, FILE_FIELD)
        .with_limits(MAX_FILES, cfg.max_file_size);
    let body_limit = policy.body_limit();
    let gateway = GatewayService::new(provider, policy, cfg.namespace.clone(), cfg.tag.clone());

    // --- Build router ---
    let app: Router = routes::routes::routes(body_limit).with_state(gateway);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server is running on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_provider(cfg: &AppConfig) -> Result<Arc<dyn ImageProvider>> {
    let provider: Arc<dyn ImageProvider> = match (cfg.provider, &cfg.cloudinary) {
        (ProviderKind::Cloudinary, Some(cloudinary)) => Arc::new(CloudinaryProvider::new(
            cloudinary.clone(),
            Duration::from_secs(cfg.provider_timeout_secs),
        )?),
        (ProviderKind::Cloudinary, None) => {
            anyhow::bail!("cloudinary provider selected without credentials")
        }
        (ProviderKind::Memory, _) => {
            tracing::warn!("Memory provider selected; images are lost on restart");
            Arc::new(MemoryProvider::new())
        }
    };
    Ok(provider)
}
