//! HTTP client for one session against a hosted Gradio Space.
//!
//! Each `SpaceClient` carries its own random session hash, so every call
//! made through one instance lands in the same remote session state.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::space::{api_route, resolve_root};
use super::sse::{outcome, parse_events, StreamOutcome};
use super::types::{Prediction, RemoteFile};
use super::InferenceEndpoint;
use crate::config::HttpConfig;
use crate::error::RpcError;

const USER_AGENT: &str = "toonmesh/0.1";

/// Build the shared HTTP client used by every Space session.
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
}

/// Generate a session hash: 12 lowercase hex chars.
pub fn generate_session_hash() -> String {
    let bytes: [u8; 6] = rand::random();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[derive(Debug, Deserialize)]
struct CallStarted {
    event_id: String,
}

pub struct SpaceClient {
    http: reqwest::Client,
    root: String,
    session_hash: String,
    token: Option<String>,
    download_dir: PathBuf,
}

impl SpaceClient {
    /// Open a new session against `space`.
    ///
    /// No network traffic happens here; the session exists remotely once the
    /// first call is made.
    pub fn connect(
        http: reqwest::Client,
        space: &str,
        api_prefix: &str,
        config: &HttpConfig,
    ) -> Result<Self, RpcError> {
        let root = resolve_root(space, api_prefix).map_err(|detail| RpcError::Protocol {
            endpoint: space.to_string(),
            detail,
        })?;
        let session_hash = generate_session_hash();
        info!("Opened session {} against {}", session_hash, root);

        Ok(Self {
            http,
            root,
            session_hash,
            token: config.hf_token.clone(),
            download_dir: config.download_dir(),
        })
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn session_hash(&self) -> &str {
        &self.session_hash
    }

    fn url(&self, tail: &str) -> String {
        format!("{}/{}", self.root, tail.trim_start_matches('/'))
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Send a request and return the body text of a 2xx response.
    async fn send_text(
        &self,
        request: reqwest::RequestBuilder,
        endpoint: &str,
    ) -> Result<String, RpcError> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|source| RpcError::Transport {
                endpoint: endpoint.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read body>".to_string());
            let body = if body.len() > 1024 {
                format!("{}...", truncate_on_char(&body, 1024))
            } else {
                body
            };
            return Err(RpcError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        response.text().await.map_err(|source| RpcError::Transport {
            endpoint: endpoint.to_string(),
            source,
        })
    }

    /// Queue a call and return its event id.
    async fn start_call(&self, route: &str, args: &[Value]) -> Result<String, RpcError> {
        let endpoint = format!("/{}", route);
        let body = serde_json::json!({
            "data": args,
            "session_hash": self.session_hash,
        });
        let text = self
            .send_text(self.http.post(self.url(&format!("call/{}", route))).json(&body), &endpoint)
            .await?;

        let started: CallStarted = serde_json::from_str(&text).map_err(|e| RpcError::Protocol {
            endpoint: endpoint.clone(),
            detail: format!("no event id in call response ({}): {}", e, text),
        })?;
        debug!("{} queued as event {}", endpoint, started.event_id);
        Ok(started.event_id)
    }

    /// Wait for the result stream of a queued call.
    async fn await_result(&self, route: &str, event_id: &str) -> Result<Vec<Value>, RpcError> {
        let endpoint = format!("/{}", route);
        let text = self
            .send_text(
                self.http.get(self.url(&format!("call/{}/{}", route, event_id))),
                &endpoint,
            )
            .await?;

        let events = parse_events(&text);
        match outcome(&events) {
            Ok(StreamOutcome::Complete(outputs)) => Ok(outputs),
            Ok(StreamOutcome::Failed(message)) => Err(RpcError::Remote {
                endpoint,
                message: message.unwrap_or_else(|| "the Space reported an error".to_string()),
            }),
            Err(detail) => Err(RpcError::Protocol { endpoint, detail }),
        }
    }

    /// Replace remote file payloads in `outputs` with local paths.
    async fn localize_outputs(&self, outputs: Vec<Value>) -> Result<Vec<Value>, RpcError> {
        let mut localized = Vec::with_capacity(outputs.len());
        for value in outputs {
            match RemoteFile::from_output(&value) {
                Some(file) => {
                    let local = self.download(&file).await?;
                    localized.push(Value::String(local.to_string_lossy().into_owned()));
                }
                None => localized.push(value),
            }
        }
        Ok(localized)
    }

    /// Download a remote output file into the download directory.
    ///
    /// Each file lands in its own fresh subdirectory so outputs that share a
    /// name never overwrite each other. The copy is kept after this call.
    pub async fn download(&self, file: &RemoteFile) -> Result<PathBuf, RpcError> {
        let url = match &file.url {
            Some(url) => url.clone(),
            None => self.url(&format!("file={}", urlencoding::encode(&file.path))),
        };
        let endpoint = "/file".to_string();

        let response = self
            .authorized(self.http.get(&url))
            .send()
            .await
            .map_err(|source| RpcError::Transport {
                endpoint: endpoint.clone(),
                source,
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(RpcError::Status {
                endpoint,
                status: status.as_u16(),
                body: format!("download of {} failed", url),
            });
        }
        let bytes = response.bytes().await.map_err(|source| RpcError::Transport {
            endpoint: endpoint.clone(),
            source,
        })?;

        let target_dir = self.fresh_download_dir().await?;
        let target = target_dir.join(file.file_name());
        tokio::fs::write(&target, &bytes)
            .await
            .map_err(|source| RpcError::File {
                path: target.clone(),
                source,
            })?;

        info!("Downloaded {} ({} bytes) to {:?}", file.path, bytes.len(), target);
        Ok(target)
    }

    async fn fresh_download_dir(&self) -> Result<PathBuf, RpcError> {
        let root = self.download_dir.clone();
        let file_error = |source: std::io::Error| RpcError::File {
            path: root.clone(),
            source,
        };
        tokio::fs::create_dir_all(&root).await.map_err(file_error)?;

        let parent = root.clone();
        tokio::task::spawn_blocking(move || {
            tempfile::Builder::new()
                .prefix("out-")
                .tempdir_in(&parent)
                .map(|dir| dir.keep())
        })
        .await
        .map_err(|e| file_error(std::io::Error::other(e)))?
        .map_err(file_error)
    }
}

impl InferenceEndpoint for SpaceClient {
    async fn upload(&self, path: &Path) -> Result<RemoteFile, RpcError> {
        let endpoint = "/upload".to_string();
        let bytes = tokio::fs::read(path).await.map_err(|source| RpcError::File {
            path: path.to_path_buf(),
            source,
        })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.png".to_string());

        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name);
        let form = reqwest::multipart::Form::new().part("files", part);
        let text = self
            .send_text(self.http.post(self.url("upload")).multipart(form), &endpoint)
            .await?;

        let paths: Vec<String> = serde_json::from_str(&text).map_err(|e| RpcError::Protocol {
            endpoint: endpoint.clone(),
            detail: format!("upload response is not a list of paths ({}): {}", e, text),
        })?;
        let remote_path = paths.into_iter().next().ok_or_else(|| RpcError::Protocol {
            endpoint: endpoint.clone(),
            detail: "upload response listed no files".to_string(),
        })?;

        debug!("Uploaded {:?} as {}", path, remote_path);
        Ok(RemoteFile::uploaded(remote_path))
    }

    async fn predict(&self, api_name: &str, args: Vec<Value>) -> Result<Prediction, RpcError> {
        let route = api_route(api_name);
        info!("Calling /{} on {} ({} args)", route, self.root, args.len());

        let event_id = self.start_call(route, &args).await?;
        let outputs = self.await_result(route, &event_id).await?;
        if outputs.is_empty() {
            warn!("/{} completed with no outputs", route);
        }
        let outputs = self.localize_outputs(outputs).await?;
        Ok(Prediction::from_outputs(outputs))
    }
}

/// Cut `s` to at most `max` bytes without splitting a character.
fn truncate_on_char(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
