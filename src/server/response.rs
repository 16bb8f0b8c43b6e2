// HTTP response helpers shared by the route handlers

use hyper::http::response::Builder;
use hyper::{Body, Response, StatusCode};
use serde::Serialize;

/// Standard CORS headers
const CORS_ORIGIN: &str = "*";
const CORS_METHODS: &str = "GET, POST, OPTIONS";
const CORS_HEADERS: &str = "content-type";

fn with_cors(builder: Builder) -> Builder {
    builder
        .header("access-control-allow-origin", CORS_ORIGIN)
        .header("access-control-allow-methods", CORS_METHODS)
        .header("access-control-allow-headers", CORS_HEADERS)
}

/// Finish a builder, falling back to a bare 500 if a header was invalid.
fn finish(builder: Builder, body: Body) -> Response<Body> {
    builder.body(body).unwrap_or_else(|_| {
        let mut fallback = Response::new(Body::from("Internal Server Error"));
        *fallback.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        fallback
    })
}

/// Build a JSON response with CORS headers
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Body> {
    let json = serde_json::to_string(body)
        .unwrap_or_else(|_| r#"{"error":"Serialization failed"}"#.to_string());
    json_raw(status, json)
}

/// Build a JSON error response
pub fn json_error(status: StatusCode, message: &str) -> Response<Body> {
    json_response(status, &serde_json::json!({ "error": message }))
}

/// Build a raw JSON string response
pub fn json_raw(status: StatusCode, json: String) -> Response<Body> {
    finish(
        with_cors(Response::builder().status(status)).header("content-type", "application/json"),
        Body::from(json),
    )
}

pub fn html_response(html: &'static str) -> Response<Body> {
    finish(
        Response::builder()
            .status(StatusCode::OK)
            .header("content-type", "text/html; charset=utf-8"),
        Body::from(html),
    )
}

/// File download with an attachment disposition
pub fn attachment(bytes: Vec<u8>, mime: &str, file_name: &str) -> Response<Body> {
    finish(
        with_cors(Response::builder().status(StatusCode::OK))
            .header("content-type", mime)
            .header(
                "content-disposition",
                format!("attachment; filename=\"{}\"", file_name),
            ),
        Body::from(bytes),
    )
}

/// CORS preflight response
pub fn cors_preflight() -> Response<Body> {
    finish(with_cors(Response::builder().status(StatusCode::OK)), Body::empty())
}
