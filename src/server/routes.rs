// Route handlers

use std::convert::Infallible;

use hyper::body::HttpBody;
use hyper::{header, Body, Request, Response, StatusCode};
use serde::Serialize;
use tracing::{info, warn};

use super::page::INDEX_HTML;
use super::response::{attachment, cors_preflight, html_response, json_error, json_raw, json_response};
use super::SharedState;
use crate::error::PipelineError;
use crate::imaging::{
    decode_upload, format_for_content_type, png_base64_blocking, ACCEPTED_CONTENT_TYPES,
};
use crate::mesh::artifact::{DOWNLOAD_FILE_NAME, DOWNLOAD_MIME};
use crate::mesh::render_obj_viewer;
use crate::pipeline::{Pipeline, PipelineOutput, Progress, RunOutcome};

/// Body of `POST /api/convert`.
#[derive(Debug, Serialize)]
pub struct ConvertResponse {
    pub success: bool,
    pub status: String,
    pub progress: Vec<Progress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stylized_png_base64: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewer_html: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
}

impl ConvertResponse {
    fn failed(status: String, progress: Vec<Progress>) -> Self {
        Self {
            success: false,
            status,
            progress,
            stylized_png_base64: None,
            viewer_html: None,
            download_url: None,
        }
    }
}

pub async fn handle_request(
    req: Request<Body>,
    state: SharedState,
) -> Result<Response<Body>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = match (method.as_str(), path.as_str()) {
        ("OPTIONS", _) => cors_preflight(),
        ("GET", "/") | ("GET", "/index.html") => html_response(INDEX_HTML),
        ("GET", "/health") => json_raw(
            StatusCode::OK,
            r#"{"status":"ok","service":"toonmesh"}"#.to_string(),
        ),
        ("POST", "/api/convert") => handle_convert(req, &state).await,
        ("GET", p) if p.starts_with("/api/artifacts/") => handle_download(p, &state).await,
        _ => json_error(StatusCode::NOT_FOUND, "Not found"),
    };

    info!("{} {} -> {}", method, path, response.status().as_u16());
    Ok(response)
}

async fn handle_convert(req: Request<Body>, state: &SharedState) -> Response<Body> {
    let content_type = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    if format_for_content_type(&content_type).is_none() {
        return json_error(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            &format!(
                "Unsupported content type '{}'. Accepted: {}",
                content_type,
                ACCEPTED_CONTENT_TYPES.join(", ")
            ),
        );
    }

    let limit = state.config.server.max_upload_bytes;
    let declared = req
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    if declared.map_or(false, |len| len > limit as u64) {
        return upload_too_large(limit);
    }

    let body_bytes = match read_capped(req.into_body(), limit).await {
        Ok(bytes) => bytes,
        Err(response) => return response,
    };
    let decoded = tokio::task::spawn_blocking(move || decode_upload(&body_bytes)).await;
    let source = match decoded {
        Ok(Ok(img)) => img,
        Ok(Err(msg)) => return json_error(StatusCode::BAD_REQUEST, &msg),
        Err(e) => {
            warn!("Decode task failed: {}", e);
            return json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to decode upload");
        }
    };

    let pipeline = match Pipeline::connect(&state.config, &state.http) {
        Ok(p) => p,
        Err(e) => {
            let body = ConvertResponse::failed(format!("An error occurred: {}", e), Vec::new());
            return json_response(StatusCode::OK, &body);
        }
    };

    let mut progress: Vec<Progress> = Vec::new();
    let body = match pipeline.run_reported(&source, &mut progress).await {
        RunOutcome::Success { output, status } => match present(output, state).await {
            Ok((stylized, viewer, download_url)) => ConvertResponse {
                success: true,
                status,
                progress,
                stylized_png_base64: Some(stylized),
                viewer_html: Some(viewer),
                download_url: Some(download_url),
            },
            Err(e) => ConvertResponse::failed(format!("An error occurred: {}", e), progress),
        },
        RunOutcome::Failed { status } => ConvertResponse::failed(status, progress),
    };

    json_response(StatusCode::OK, &body)
}

/// Read a request body, giving up once it grows past `limit` bytes.
async fn read_capped(mut body: Body, limit: usize) -> Result<Vec<u8>, Response<Body>> {
    let mut buffer = Vec::new();
    while let Some(chunk) = body.data().await {
        let chunk = chunk.map_err(|e| {
            warn!("Failed to read upload body: {}", e);
            json_error(StatusCode::BAD_REQUEST, "Failed to read request body")
        })?;
        if buffer.len() + chunk.len() > limit {
            return Err(upload_too_large(limit));
        }
        buffer.extend_from_slice(&chunk);
    }
    Ok(buffer)
}

fn upload_too_large(limit: usize) -> Response<Body> {
    json_error(
        StatusCode::PAYLOAD_TOO_LARGE,
        &format!("Upload exceeds the {} byte limit", limit),
    )
}

/// Hand a finished run to the page: inline image, viewer markup, download link.
async fn present(
    output: PipelineOutput,
    state: &SharedState,
) -> Result<(String, String, String), PipelineError> {
    let PipelineOutput { stylized, artifact } = output;
    let stylized = png_base64_blocking(stylized).await?;
    let viewer = render_obj_viewer(artifact.path()).await?;
    let id = state.artifacts.register(artifact.path().to_path_buf());
    Ok((stylized, viewer, download_path(&id)))
}

pub fn download_path(id: &str) -> String {
    format!("/api/artifacts/{}/{}", id, DOWNLOAD_FILE_NAME)
}

async fn handle_download(path: &str, state: &SharedState) -> Response<Body> {
    let id = path
        .trim_start_matches("/api/artifacts/")
        .strip_suffix(&format!("/{}", DOWNLOAD_FILE_NAME))
        .filter(|id| !id.is_empty() && !id.contains('/'));
    let Some(id) = id else {
        return json_error(StatusCode::NOT_FOUND, "Not found");
    };

    let Some(artifact) = state.artifacts.get(id) else {
        return json_error(StatusCode::NOT_FOUND, "Unknown artifact");
    };

    match tokio::fs::read(&artifact.path).await {
        Ok(bytes) => attachment(bytes, DOWNLOAD_MIME, DOWNLOAD_FILE_NAME),
        Err(e) => {
            warn!("Artifact {} at {:?} unreadable: {}", id, artifact.path, e);
            json_error(
                StatusCode::NOT_FOUND,
                &format!(
                    "Unable to read the generated OBJ file: {}",
                    artifact.path.display()
                ),
            )
        }
    }
}
