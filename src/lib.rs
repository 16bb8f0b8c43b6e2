pub mod config;
mod error;
pub mod imaging;
pub mod mesh;
pub mod pipeline;
pub mod remote;
pub mod server;
pub mod stylizer;

pub use error::{PipelineError, RpcError};
pub use pipeline::{Pipeline, PipelineOutput, Progress, RunOutcome, Stage};

pub fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = config::load_config()?;
    tracing::info!(
        "Stylizer: {}, mesh generator: {}",
        config.stylizer.space,
        config.mesh.space
    );

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(server::serve(config))
}
