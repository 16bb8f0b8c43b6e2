//! Image-to-image stylization through the remote stylizer Space.

use std::path::Path;

use image::DynamicImage;
use serde_json::{json, Value};
use tracing::info;

use crate::config::StylizerConfig;
use crate::error::{PipelineError, RpcError};
use crate::imaging::{open_image, stage_png};
use crate::remote::{describe_shape, InferenceEndpoint, Prediction};

/// Operation that hands out a random seed.
pub const SEED_API: &str = "/get_random_value";
/// Operation that performs the transform.
pub const TRANSFORM_API: &str = "/predict";

/// Fixed request parameters for the stylizer.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleParams {
    pub prompt: String,
    pub steps: u32,
    pub strength: f64,
}

impl From<&StylizerConfig> for StyleParams {
    fn from(config: &StylizerConfig) -> Self {
        Self {
            prompt: config.prompt.clone(),
            steps: config.steps,
            strength: config.strength,
        }
    }
}

pub struct Stylizer<E> {
    endpoint: E,
    params: StyleParams,
}

impl<E: InferenceEndpoint> Stylizer<E> {
    pub fn new(endpoint: E, params: StyleParams) -> Self {
        Self { endpoint, params }
    }

    /// Restyle `source` with the configured prompt.
    ///
    /// The seed comes from the remote service and is passed back unchanged.
    pub async fn stylize(&self, source: &DynamicImage) -> Result<DynamicImage, PipelineError> {
        let seed = self
            .endpoint
            .predict(SEED_API, vec![])
            .await
            .map_err(PipelineError::Stylizer)?;
        let seed = single_value(seed);
        info!("Stylizer seed: {}", seed);

        let staged = stage_png(source).await?;
        let remote_image = self
            .endpoint
            .upload(&staged)
            .await
            .map_err(PipelineError::Stylizer)?;

        let args = vec![
            remote_image.to_value(),
            json!(self.params.prompt),
            json!(self.params.steps),
            seed,
            json!(self.params.strength),
        ];
        let result = self
            .endpoint
            .predict(TRANSFORM_API, args)
            .await
            .map_err(PipelineError::Stylizer)?;

        let path = match single_value(result) {
            Value::String(path) => path,
            other => {
                return Err(PipelineError::Stylizer(RpcError::Protocol {
                    endpoint: TRANSFORM_API.to_string(),
                    detail: format!("expected an image path, got {}", describe_shape(&other)),
                }))
            }
        };

        let styled = open_image(Path::new(&path)).await?;
        info!("Stylized image: {}x{}", styled.width(), styled.height());
        Ok(styled)
    }
}

/// First value of a prediction; a tuple's first element, or null if empty.
fn single_value(prediction: Prediction) -> Value {
    match prediction {
        Prediction::Single(value) => value,
        Prediction::Tuple(values) => values.into_iter().next().unwrap_or(Value::Null),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_config;

    #[test]
    fn test_params_from_config() {
        let config = default_config();
        let params = StyleParams::from(&config.stylizer);
        assert_eq!(params.steps, 5);
        assert_eq!(params.strength, 0.5);
        assert!(params.prompt.starts_with("A front-facing image"));
    }

    #[test]
    fn test_single_value() {
        assert_eq!(single_value(Prediction::Single(json!(9))), json!(9));
        assert_eq!(single_value(Prediction::Tuple(vec![json!(1), json!(2)])), json!(1));
        assert_eq!(single_value(Prediction::Tuple(vec![])), Value::Null);
    }
}
