//! Mesh artifact handling: result-shape normalization and readability checks.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::warn;

use crate::error::PipelineError;
use crate::remote::{describe_shape, Prediction};

/// File name offered for download.
pub const DOWNLOAD_FILE_NAME: &str = "model.obj";
/// MIME type offered for download.
pub const DOWNLOAD_MIME: &str = "model/obj";

/// A mesh file produced by reconstruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeshArtifact {
    path: PathBuf,
}

impl MeshArtifact {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check that the artifact is a regular file we can open for reading.
    pub async fn verify_readable(&self) -> Result<(), PipelineError> {
        let unreadable = || PipelineError::ArtifactUnreadable {
            path: self.path.clone(),
        };
        let is_file = tokio::fs::metadata(&self.path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);
        if !is_file {
            warn!("Mesh artifact {:?} is not a file", self.path);
            return Err(unreadable());
        }
        tokio::fs::File::open(&self.path).await.map_err(|e| {
            warn!("Mesh artifact {:?} cannot be opened: {}", self.path, e);
            unreadable()
        })?;
        Ok(())
    }
}

/// Normalize a reconstruct result to the mesh path.
///
/// A tuple yields its first element and a bare value is used as-is. Anything
/// that is not a string at that point is a type mismatch.
pub fn extract_artifact_path(result: Prediction) -> Result<PathBuf, PipelineError> {
    let value = match result {
        Prediction::Single(value) => value,
        Prediction::Tuple(values) => match values.into_iter().next() {
            Some(first) => first,
            None => {
                return Err(PipelineError::UnexpectedShape {
                    found: "empty tuple".to_string(),
                })
            }
        },
    };

    match value {
        Value::String(path) if !path.is_empty() => Ok(PathBuf::from(path)),
        Value::String(_) => Err(PipelineError::UnexpectedShape {
            found: "empty string".to_string(),
        }),
        other => Err(PipelineError::UnexpectedShape {
            found: describe_shape(&other).to_string(),
        }),
    }
}
