//! poolprobe -- concurrent upload load tester.
//!
//! Fires N simultaneous multipart uploads of one artifact at a fixed
//! endpoint and keeps a live, race-free account of how they settle.

pub mod aggregate;
pub mod api;
pub mod artifact;
pub mod config;
pub mod dispatch;
pub mod model;
pub mod report;
pub mod tester;

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::PoolprobeConfig;
use crate::dispatch::http::HttpUploader;
use crate::tester::LoadTester;

/// Build a load tester wired to the configured upload endpoint.
pub fn http_tester(config: &PoolprobeConfig) -> Result<LoadTester> {
    let uploader = HttpUploader::from_config(&config.target).context("Failed to build HTTP client")?;
    tracing::debug!(endpoint = %uploader.endpoint(), "upload target configured");
    Ok(LoadTester::new(Arc::new(uploader)))
}

/// Start the HTTP control API.
pub async fn serve(bind: &str, config: &PoolprobeConfig) -> Result<()> {
    let tester = http_tester(config)?;
    let state = api::state::AppState::new(tester, config.limits.clone());
    let app = api::router(state);

    let addr: std::net::SocketAddr = bind.parse().with_context(|| format!("invalid bind address: {}", bind))?;
    tracing::info!(%addr, endpoint = %config.target.endpoint, "poolprobe API listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
