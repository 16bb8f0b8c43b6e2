//! `SpaceClient` against a local fake Gradio server.

use std::convert::Infallible;
use std::io::Cursor;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response, Server, StatusCode};
use image::{DynamicImage, ImageFormat};
use serde_json::{json, Value};
use tempfile::TempDir;

use toonmesh::config::{default_config, HttpConfig};
use toonmesh::mesh::{MeshGenerator, MeshParams};
use toonmesh::remote::{build_http_client, InferenceEndpoint, SpaceClient};
use toonmesh::stylizer::{StyleParams, Stylizer};
use toonmesh::{PipelineError, RpcError};

const PREFIX: &str = "/gradio_api";
const UPLOADED_PATH: &str = "/tmp/gradio/abc123/input.png";
const MESH_OBJ: &str = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";

#[derive(Debug, Clone)]
struct Recorded {
    method: String,
    path: String,
    authorization: Option<String>,
    content_type: Option<String>,
    body: Vec<u8>,
}

impl Recorded {
    fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

/// Just enough of the Gradio HTTP API for one Space.
#[derive(Default)]
struct FakeSpace {
    requests: Mutex<Vec<Recorded>>,
    /// API whose result stream reports an error
    failing_api: Option<&'static str>,
    styled_png: Vec<u8>,
}

impl FakeSpace {
    fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    fn call_posts(&self) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == "POST" && r.path.starts_with(&format!("{}/call/", PREFIX)))
            .collect()
    }

    fn result_stream(&self, api: &str) -> String {
        if self.failing_api == Some(api) {
            return "event: error\ndata: \"Input image rejected\"\n\n".to_string();
        }
        let outputs = match api {
            "get_random_value" => json!([777]),
            "predict" => json!([file_data("/tmp/gradio/out/styled.png", "styled.png")]),
            "make3d" => json!([
                file_data("/tmp/gradio/out/mesh.obj", "mesh.obj"),
                file_data("/tmp/gradio/out/mesh.glb", "mesh.glb"),
            ]),
            _ => json!([null]),
        };
        format!(
            "event: heartbeat\ndata: null\n\nevent: complete\ndata: {}\n\n",
            outputs
        )
    }

    fn file_bytes(&self, remote_path: &str) -> Vec<u8> {
        if remote_path.ends_with(".png") {
            self.styled_png.clone()
        } else if remote_path.ends_with(".obj") {
            MESH_OBJ.as_bytes().to_vec()
        } else {
            b"glTF".to_vec()
        }
    }
}

fn file_data(path: &str, orig_name: &str) -> Value {
    json!({
        "path": path,
        "orig_name": orig_name,
        "size": 10,
        "meta": {"_type": "gradio.FileData"}
    })
}

fn respond(status: StatusCode, body: impl Into<Body>) -> Response<Body> {
    let mut resp = Response::new(body.into());
    *resp.status_mut() = status;
    resp
}

async fn handle(req: Request<Body>, space: Arc<FakeSpace>) -> Result<Response<Body>, Infallible> {
    let (parts, body) = req.into_parts();
    let header = |name: &str| {
        parts
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let mut recorded = Recorded {
        method: parts.method.to_string(),
        path: parts.uri.path().to_string(),
        authorization: header("authorization"),
        content_type: header("content-type"),
        body: Vec::new(),
    };
    recorded.body = hyper::body::to_bytes(body)
        .await
        .map(|b| b.to_vec())
        .unwrap_or_default();
    space.requests.lock().unwrap().push(recorded.clone());

    let Some(route) = recorded.path.strip_prefix(PREFIX) else {
        return Ok(respond(StatusCode::NOT_FOUND, "Not Found"));
    };
    let segments: Vec<&str> = route.trim_start_matches('/').split('/').collect();

    let resp = match (recorded.method.as_str(), segments.as_slice()) {
        ("POST", ["upload"]) => respond(StatusCode::OK, json!([UPLOADED_PATH]).to_string()),
        ("POST", ["call", api]) => respond(
            StatusCode::OK,
            json!({ "event_id": format!("ev-{}", api) }).to_string(),
        ),
        ("GET", ["call", api, _event_id]) => respond(StatusCode::OK, space.result_stream(api)),
        ("GET", [file, ..]) if file.starts_with("file=") => {
            let remote = urlencoding::decode(route.trim_start_matches("/file="))
                .map(|p| p.into_owned())
                .unwrap_or_default();
            respond(StatusCode::OK, space.file_bytes(&remote))
        }
        _ => respond(StatusCode::NOT_FOUND, "Not Found"),
    };
    Ok(resp)
}

async fn start(space: Arc<FakeSpace>) -> SocketAddr {
    let make_svc = make_service_fn(move |_conn| {
        let space = space.clone();
        async move { Ok::<_, Infallible>(service_fn(move |req| handle(req, space.clone()))) }
    });
    let server = Server::bind(&([127, 0, 0, 1], 0).into()).serve(make_svc);
    let addr = server.local_addr();
    tokio::spawn(server);
    addr
}

fn http_config(download_dir: &TempDir, token: Option<&str>) -> HttpConfig {
    HttpConfig {
        timeout_secs: 30,
        hf_token: token.map(str::to_string),
        download_dir: Some(download_dir.path().to_path_buf()),
    }
}

fn connect(addr: SocketAddr, prefix: &str, config: &HttpConfig) -> SpaceClient {
    let http = build_http_client(config.timeout()).unwrap();
    SpaceClient::connect(http, &format!("http://{}", addr), prefix, config).unwrap()
}

fn input_png(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("input.png");
    DynamicImage::new_rgb8(32, 32).save(&path).unwrap();
    path
}

#[tokio::test]
async fn test_mesh_steps_share_one_session_and_download_mesh() {
    let space = Arc::new(FakeSpace::default());
    let addr = start(space.clone()).await;
    let dir = TempDir::new().unwrap();
    let config = http_config(&dir, None);

    let client = connect(addr, "gradio_api", &config);
    let session_hash = client.session_hash().to_string();
    let generator = MeshGenerator::new(client, MeshParams::from(&default_config().mesh));

    let artifact = generator.generate(&input_png(&dir)).await.unwrap();

    let calls = space.call_posts();
    let paths: Vec<&str> = calls.iter().map(|r| r.path.as_str()).collect();
    assert_eq!(
        paths,
        vec![
            "/gradio_api/call/check_input_image",
            "/gradio_api/call/preprocess",
            "/gradio_api/call/generate_mvs",
            "/gradio_api/call/make3d",
        ]
    );
    for call in &calls {
        assert_eq!(call.json()["session_hash"], session_hash.as_str(), "{}", call.path);
    }

    let bodies: Vec<Value> = calls.iter().map(Recorded::json).collect();
    assert_eq!(bodies[0]["data"][0]["path"], UPLOADED_PATH);
    assert_eq!(bodies[1]["data"][1], json!(true));
    assert_eq!(bodies[2]["data"][1], json!(75));
    assert_eq!(bodies[2]["data"][2], json!(42));
    assert_eq!(bodies[3]["data"], json!([]));

    let uploads: Vec<Recorded> = space
        .requests()
        .into_iter()
        .filter(|r| r.path == "/gradio_api/upload")
        .collect();
    assert_eq!(uploads.len(), 1);
    assert!(uploads[0]
        .content_type
        .as_deref()
        .unwrap()
        .starts_with("multipart/form-data"));

    assert!(space
        .requests()
        .iter()
        .any(|r| r.method == "GET" && r.path == "/gradio_api/call/make3d/ev-make3d"));

    assert!(artifact.path().starts_with(dir.path()));
    assert_eq!(artifact.path().file_name().unwrap(), "mesh.obj");
    assert_eq!(std::fs::read_to_string(artifact.path()).unwrap(), MESH_OBJ);
}

#[tokio::test]
async fn test_stylizer_downloads_styled_image() {
    let mut png = Cursor::new(Vec::new());
    DynamicImage::new_rgb8(64, 48)
        .write_to(&mut png, ImageFormat::Png)
        .unwrap();
    let space = Arc::new(FakeSpace {
        styled_png: png.into_inner(),
        ..FakeSpace::default()
    });
    let addr = start(space.clone()).await;
    let dir = TempDir::new().unwrap();
    let config = http_config(&dir, None);

    let stylizer = Stylizer::new(
        connect(addr, "gradio_api", &config),
        StyleParams::from(&default_config().stylizer),
    );
    let styled = stylizer
        .stylize(&DynamicImage::new_rgb8(100, 100))
        .await
        .unwrap();
    assert_eq!((styled.width(), styled.height()), (64, 48));

    let calls = space.call_posts();
    assert_eq!(calls.len(), 2);
    let transform = calls[1].json();
    assert_eq!(calls[1].path, "/gradio_api/call/predict");
    assert_eq!(transform["data"][3], json!(777));
    assert_eq!(transform["session_hash"], calls[0].json()["session_hash"]);
}

#[tokio::test]
async fn test_remote_error_stops_at_failing_step() {
    let space = Arc::new(FakeSpace {
        failing_api: Some("preprocess"),
        ..FakeSpace::default()
    });
    let addr = start(space.clone()).await;
    let dir = TempDir::new().unwrap();
    let config = http_config(&dir, None);
    let generator = MeshGenerator::new(
        connect(addr, "gradio_api", &config),
        MeshParams::from(&default_config().mesh),
    );

    let err = generator.generate(&input_png(&dir)).await.unwrap_err();
    match err {
        PipelineError::MeshGeneration {
            step,
            source: RpcError::Remote { message, .. },
        } => {
            assert_eq!(step, "preprocess");
            assert_eq!(message, "Input image rejected");
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(space.call_posts().len(), 2);
}

#[tokio::test]
async fn test_token_sent_as_bearer() {
    let space = Arc::new(FakeSpace::default());
    let addr = start(space.clone()).await;
    let dir = TempDir::new().unwrap();
    let config = http_config(&dir, Some("hf_test"));

    let client = connect(addr, "gradio_api", &config);
    client.predict("/check_input_image", vec![]).await.unwrap();

    let requests = space.requests();
    assert_eq!(requests.len(), 2);
    for r in requests {
        assert_eq!(r.authorization.as_deref(), Some("Bearer hf_test"), "{}", r.path);
    }
}

#[tokio::test]
async fn test_http_error_status_is_reported() {
    let space = Arc::new(FakeSpace::default());
    let addr = start(space.clone()).await;
    let dir = TempDir::new().unwrap();
    let config = http_config(&dir, None);

    // Without the route prefix every path is unknown to the fake server.
    let client = connect(addr, "", &config);
    let err = client.predict("/make3d", vec![]).await.unwrap_err();
    assert!(matches!(err, RpcError::Status { status: 404, .. }), "{}", err);
}
