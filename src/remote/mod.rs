//! Client side of the hosted model Spaces.
//!
//! The pipeline only talks to remote services through `InferenceEndpoint`,
//! so tests can swap in scripted endpoints.

pub mod client;
pub mod space;
pub mod sse;
pub mod types;

use std::future::Future;
use std::path::Path;

use serde_json::Value;

use crate::error::RpcError;

pub use client::{build_http_client, SpaceClient};
pub use types::{describe_shape, Prediction, RemoteFile};

/// One remote session on a model-inference service.
///
/// Calls made through the same value share the remote session state, so
/// callers that depend on that state must keep using one value.
pub trait InferenceEndpoint: Send + Sync {
    /// Upload a local file and return a reference usable as a call argument.
    fn upload(&self, path: &Path) -> impl Future<Output = Result<RemoteFile, RpcError>> + Send;

    /// Call the named API operation with positional arguments.
    fn predict(
        &self,
        api_name: &str,
        args: Vec<Value>,
    ) -> impl Future<Output = Result<Prediction, RpcError>> + Send;
}
