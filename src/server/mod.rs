//! Browser-facing HTTP server.
//!
//! Endpoints:
//! - `GET  /`                              - Upload page
//! - `GET  /health`                        - Health check
//! - `POST /api/convert`                   - Run the pipeline on a raw JPEG/PNG body
//! - `GET  /api/artifacts/{id}/model.obj`  - Download a generated mesh

pub mod artifacts;
pub mod page;
pub mod response;
pub mod routes;

use std::convert::Infallible;
use std::sync::Arc;

use anyhow::{Context, Result};
use hyper::service::{make_service_fn, service_fn};
use hyper::Server;
use tracing::info;

use crate::config::AppConfig;
use crate::remote::build_http_client;
pub use artifacts::ArtifactRegistry;

/// State shared by every request.
pub struct AppState {
    pub config: AppConfig,
    pub http: reqwest::Client,
    pub artifacts: ArtifactRegistry,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(config: AppConfig) -> Result<Self> {
        let http =
            build_http_client(config.http.timeout()).context("Failed to build HTTP client")?;
        let artifacts = ArtifactRegistry::new(config.server.artifact_ttl());
        Ok(Self {
            config,
            http,
            artifacts,
        })
    }
}

/// Serve until the process is stopped.
pub async fn serve(config: AppConfig) -> Result<()> {
    let addr = config.server.bind;
    let state: SharedState = Arc::new(AppState::new(config)?);

    let make_svc = make_service_fn(move |_conn| {
        let state = state.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |req| {
                routes::handle_request(req, state.clone())
            }))
        }
    });

    let server = Server::try_bind(&addr)
        .with_context(|| format!("Failed to bind {}", addr))?
        .serve(make_svc);

    info!("toonmesh listening on http://{}", addr);
    server.await.context("HTTP server error")?;
    Ok(())
}
