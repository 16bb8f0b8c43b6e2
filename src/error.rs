use std::path::PathBuf;

use thiserror::Error;

/// Failure talking to a remote Space.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("Request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{endpoint} returned HTTP {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("Unexpected response from {endpoint}: {detail}")]
    Protocol { endpoint: String, detail: String },

    #[error("Remote error from {endpoint}: {message}")]
    Remote { endpoint: String, message: String },

    #[error("Failed to handle file {path:?}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Everything that can end a conversion run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Stylizer failed: {0}")]
    Stylizer(#[source] RpcError),

    #[error("Mesh generation failed at {step}: {source}")]
    MeshGeneration {
        step: &'static str,
        #[source]
        source: RpcError,
    },

    #[error("Type mismatch: expected a file path from reconstruction, but got {found}")]
    UnexpectedShape { found: String },

    #[error("Unable to read the generated OBJ file: {}", path.display())]
    ArtifactUnreadable { path: PathBuf },

    #[error("Failed to stage image: {0}")]
    Staging(#[source] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Background task failed: {0}")]
    Task(String),
}

impl From<PipelineError> for String {
    fn from(err: PipelineError) -> Self {
        err.to_string()
    }
}
