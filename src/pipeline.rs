//! End-to-end conversion of one uploaded photo into a mesh.
//!
//! Flow:
//! 1. Stylize the photo through the stylizer Space
//! 2. Stage the stylized image to a temp PNG
//! 3. Run the four-step mesh generation against one session
//! 4. Verify the returned mesh file exists and is readable
//!
//! `run_reported` is the single failure boundary: any error ends the run and
//! becomes one status message. Staged PNGs stay in the temp dir after the
//! run, whichever way it ends.

use chrono::{DateTime, Utc};
use image::DynamicImage;
use serde::Serialize;
use tracing::{error, info};

use crate::config::AppConfig;
use crate::error::{PipelineError, RpcError};
use crate::imaging::stage_png;
use crate::mesh::{MeshArtifact, MeshGenerator, MeshParams};
use crate::remote::{InferenceEndpoint, SpaceClient};
use crate::stylizer::{StyleParams, Stylizer};

/// Status shown after a successful run.
pub const SUCCESS_STATUS: &str = "3D mesh generated successfully!";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Stylizing,
    Staging,
    GeneratingMesh,
    Verifying,
    Done,
}

/// One progress update.
#[derive(Debug, Clone, Serialize)]
pub struct Progress {
    pub stage: Stage,
    /// Completed share of the run, 0.0 to 1.0
    pub fraction: f32,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Receiver of progress updates.
pub trait ProgressSink: Send {
    fn report(&mut self, progress: Progress);
}

impl ProgressSink for Vec<Progress> {
    fn report(&mut self, progress: Progress) {
        self.push(progress);
    }
}

/// Successful run result.
#[derive(Debug)]
pub struct PipelineOutput {
    pub stylized: DynamicImage,
    pub artifact: MeshArtifact,
}

/// Run result after the failure boundary.
#[derive(Debug)]
pub enum RunOutcome {
    Success {
        output: PipelineOutput,
        status: String,
    },
    Failed {
        status: String,
    },
}

impl RunOutcome {
    pub fn status(&self) -> &str {
        match self {
            RunOutcome::Success { status, .. } | RunOutcome::Failed { status } => status,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Success { .. })
    }
}

pub struct Pipeline<S, M> {
    stylizer: Stylizer<S>,
    mesh: MeshGenerator<M>,
}

impl Pipeline<SpaceClient, SpaceClient> {
    /// Open fresh sessions against both configured Spaces.
    pub fn connect(config: &AppConfig, http: &reqwest::Client) -> Result<Self, RpcError> {
        let stylizer = SpaceClient::connect(
            http.clone(),
            &config.stylizer.space,
            &config.stylizer.api_prefix,
            &config.http,
        )?;
        let mesh = SpaceClient::connect(
            http.clone(),
            &config.mesh.space,
            &config.mesh.api_prefix,
            &config.http,
        )?;
        Ok(Self::new(
            Stylizer::new(stylizer, StyleParams::from(&config.stylizer)),
            MeshGenerator::new(mesh, MeshParams::from(&config.mesh)),
        ))
    }
}

impl<S: InferenceEndpoint, M: InferenceEndpoint> Pipeline<S, M> {
    pub fn new(stylizer: Stylizer<S>, mesh: MeshGenerator<M>) -> Self {
        Self { stylizer, mesh }
    }

    /// Convert `source` into a verified mesh artifact.
    pub async fn run<P: ProgressSink>(
        &self,
        source: &DynamicImage,
        progress: &mut P,
    ) -> Result<PipelineOutput, PipelineError> {
        report(progress, Stage::Stylizing, 0.1, "Stylizing image");
        let stylized = self.stylizer.stylize(source).await?;

        report(progress, Stage::Staging, 0.35, "Staging stylized image");
        let staged = stage_png(&stylized).await?;

        report(progress, Stage::GeneratingMesh, 0.5, "Generating 3D mesh");
        let artifact = self.mesh.generate(&staged).await?;

        report(progress, Stage::Verifying, 0.9, "Checking mesh file");
        artifact.verify_readable().await?;

        report(progress, Stage::Done, 1.0, SUCCESS_STATUS);
        info!("Conversion finished: {:?}", artifact.path());
        Ok(PipelineOutput { stylized, artifact })
    }

    /// `run` behind the failure boundary: errors become a status message.
    pub async fn run_reported<P: ProgressSink>(
        &self,
        source: &DynamicImage,
        progress: &mut P,
    ) -> RunOutcome {
        match self.run(source, progress).await {
            Ok(output) => RunOutcome::Success {
                output,
                status: SUCCESS_STATUS.to_string(),
            },
            Err(e) => {
                error!("Conversion failed: {}", e);
                RunOutcome::Failed {
                    status: format!("An error occurred: {}", e),
                }
            }
        }
    }
}

fn report<P: ProgressSink>(sink: &mut P, stage: Stage, fraction: f32, message: &str) {
    info!("[{:>3.0}%] {}", fraction * 100.0, message);
    sink.report(Progress {
        stage,
        fraction,
        message: message.to_string(),
        at: Utc::now(),
    });
}
