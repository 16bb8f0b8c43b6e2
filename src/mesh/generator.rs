//! Four-step image-to-3D generation against one remote session.
//!
//! The steps run in a fixed order: validate, preprocess, generate views,
//! reconstruct. The remote side keeps intermediate state between them, so
//! every step goes through the same endpoint value and none is skipped.

use std::path::Path;

use serde_json::{json, Value};
use tracing::info;

use super::artifact::{extract_artifact_path, MeshArtifact};
use crate::config::MeshConfig;
use crate::error::{PipelineError, RpcError};
use crate::remote::{InferenceEndpoint, Prediction};

/// A step of the remote generation protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshStep {
    Validate,
    Preprocess,
    GenerateViews,
    Reconstruct,
}

impl MeshStep {
    /// Every step, in the order it must run.
    pub const ORDER: [MeshStep; 4] = [
        MeshStep::Validate,
        MeshStep::Preprocess,
        MeshStep::GenerateViews,
        MeshStep::Reconstruct,
    ];

    pub fn api_name(self) -> &'static str {
        match self {
            MeshStep::Validate => "/check_input_image",
            MeshStep::Preprocess => "/preprocess",
            MeshStep::GenerateViews => "/generate_mvs",
            MeshStep::Reconstruct => "/make3d",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MeshStep::Validate => "validate",
            MeshStep::Preprocess => "preprocess",
            MeshStep::GenerateViews => "generate-views",
            MeshStep::Reconstruct => "reconstruct",
        }
    }
}

/// Fixed request parameters for the mesh generator.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshParams {
    pub remove_background: bool,
    pub sample_steps: u32,
    pub sample_seed: i64,
}

impl From<&MeshConfig> for MeshParams {
    fn from(config: &MeshConfig) -> Self {
        Self {
            remove_background: config.remove_background,
            sample_steps: config.sample_steps,
            sample_seed: config.sample_seed,
        }
    }
}

pub struct MeshGenerator<E> {
    endpoint: E,
    params: MeshParams,
}

impl<E: InferenceEndpoint> MeshGenerator<E> {
    pub fn new(endpoint: E, params: MeshParams) -> Self {
        Self { endpoint, params }
    }

    /// Turn a staged image file into a mesh artifact.
    ///
    /// A failing step aborts the remaining ones. Return values of the first
    /// three steps are not inspected.
    pub async fn generate(&self, image_path: &Path) -> Result<MeshArtifact, PipelineError> {
        let image = self
            .endpoint
            .upload(image_path)
            .await
            .map_err(|source| step_error(MeshStep::Validate, source))?
            .to_value();

        for step in &MeshStep::ORDER[..3] {
            self.call(*step, self.args_for(*step, &image)).await?;
        }
        let result = self
            .call(MeshStep::Reconstruct, self.args_for(MeshStep::Reconstruct, &image))
            .await?;

        let path = extract_artifact_path(result)?;
        info!("Reconstruction produced {:?}", path);
        Ok(MeshArtifact::new(path))
    }

    fn args_for(&self, step: MeshStep, image: &Value) -> Vec<Value> {
        match step {
            MeshStep::Validate => vec![image.clone()],
            MeshStep::Preprocess => vec![image.clone(), json!(self.params.remove_background)],
            MeshStep::GenerateViews => vec![
                image.clone(),
                json!(self.params.sample_steps),
                json!(self.params.sample_seed),
            ],
            MeshStep::Reconstruct => vec![],
        }
    }

    async fn call(&self, step: MeshStep, args: Vec<Value>) -> Result<Prediction, PipelineError> {
        info!("Mesh step {} ({})", step.label(), step.api_name());
        self.endpoint
            .predict(step.api_name(), args)
            .await
            .map_err(|source| step_error(step, source))
    }
}

fn step_error(step: MeshStep, source: RpcError) -> PipelineError {
    PipelineError::MeshGeneration {
        step: step.label(),
        source,
    }
}
