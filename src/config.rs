//! Application configuration loaded from TOML.
//!
//! Provides two layers:
//! - `default_config()` - Defaults embedded in the binary at compile time
//! - `load_config()` - Defaults overlaid with the user's config file, if any
//!
//! A user file only needs the keys it wants to change; everything else
//! falls back to the embedded defaults.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, info};

/// Defaults embedded in the binary. Loaded from `config/default.toml`.
const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

/// Environment variable naming an explicit config file path.
pub const CONFIG_PATH_ENV: &str = "TOONMESH_CONFIG";

/// Environment variables checked (in order) for a Hugging Face access token.
pub const TOKEN_ENVS: [&str; 2] = ["TOONMESH_HF_TOKEN", "HF_TOKEN"];

/// Root configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub http: HttpConfig,
    pub stylizer: StylizerConfig,
    pub mesh: MeshConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address the HTTP server listens on
    pub bind: SocketAddr,
    /// How long a generated mesh stays downloadable
    pub artifact_ttl_secs: u64,
    /// Largest accepted upload body
    pub max_upload_bytes: usize,
}

impl ServerConfig {
    pub fn artifact_ttl(&self) -> chrono::Duration {
        chrono::Duration::from_std(Duration::from_secs(self.artifact_ttl_secs))
            .unwrap_or_else(|_| chrono::Duration::days(365))
    }
}

/// Settings shared by both remote Space clients.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Whole-request timeout for every remote call, including result streams
    pub timeout_secs: u64,
    /// Optional Hugging Face token for private or rate-limited Spaces
    #[serde(default)]
    pub hf_token: Option<String>,
    /// Where remote output files are downloaded (defaults to the OS temp dir)
    #[serde(default)]
    pub download_dir: Option<PathBuf>,
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Resolved download directory for remote output files.
    pub fn download_dir(&self) -> PathBuf {
        self.download_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("toonmesh"))
    }
}

/// Image-to-image stylizer Space and its fixed request parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct StylizerConfig {
    /// Space id (`owner/name`) or full base URL
    pub space: String,
    /// Route prefix before `/call` and `/upload` (e.g. `gradio_api`)
    #[serde(default)]
    pub api_prefix: String,
    pub prompt: String,
    pub steps: u32,
    pub strength: f64,
}

/// Image-to-3D mesh generator Space and its fixed request parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct MeshConfig {
    pub space: String,
    #[serde(default)]
    pub api_prefix: String,
    pub remove_background: bool,
    pub sample_steps: u32,
    pub sample_seed: i64,
}

/// Get the default configuration embedded in the binary.
///
/// # Panics
/// Panics if the embedded TOML is invalid (this would be a compile-time bug).
pub fn default_config() -> AppConfig {
    toml::from_str(DEFAULT_CONFIG).expect("embedded default.toml must be a valid AppConfig")
}

/// Load the effective configuration.
///
/// Reads the file named by `TOONMESH_CONFIG`, or `<config_dir>/toonmesh/config.toml`
/// when that exists, and overlays it on the embedded defaults. A token from
/// the environment wins over one in the file.
pub fn load_config() -> Result<AppConfig> {
    let mut config = match user_config_path() {
        Some(path) => {
            info!("Loading config from {:?}", path);
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file {:?}", path))?;
            merge_with_defaults(&content)
                .with_context(|| format!("Invalid config file {:?}", path))?
        }
        None => {
            debug!("No user config file found, using embedded defaults");
            default_config()
        }
    };

    if let Some(token) = TOKEN_ENVS
        .iter()
        .find_map(|key| std::env::var(key).ok())
        .filter(|t| !t.trim().is_empty())
    {
        config.http.hf_token = Some(token);
    }

    Ok(config)
}

/// Overlay a user TOML document on the embedded defaults.
pub fn merge_with_defaults(user_toml: &str) -> Result<AppConfig> {
    let mut base: toml::Value =
        toml::from_str(DEFAULT_CONFIG).context("Embedded default config is not valid TOML")?;
    let overlay: toml::Value = toml::from_str(user_toml).context("Config is not valid TOML")?;
    merge_values(&mut base, overlay);
    let config: AppConfig = base
        .try_into()
        .context("Config does not match the expected layout")?;
    Ok(config)
}

/// Recursively merge `overlay` into `base`. Tables merge key by key, any
/// other value replaces the base value outright.
fn merge_values(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, value) in overlay_table {
                match base_table.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base_table.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

fn user_config_path() -> Option<PathBuf> {
    if let Ok(explicit) = std::env::var(CONFIG_PATH_ENV) {
        return Some(PathBuf::from(explicit));
    }
    dirs::config_dir()
        .map(|dir| dir.join("toonmesh").join("config.toml"))
        .filter(|path| Path::new(path).is_file())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_loads() {
        let config = default_config();
        assert_eq!(config.stylizer.space, "MotionDiz/SDXL-Turbo-Img2Img-CPU");
        assert_eq!(config.stylizer.steps, 5);
        assert_eq!(config.stylizer.strength, 0.5);
        assert!(config.stylizer.prompt.contains("talking tom"));
        assert_eq!(config.mesh.space, "TencentARC/InstantMesh");
        assert!(config.mesh.remove_background);
        assert_eq!(config.mesh.sample_steps, 75);
        assert_eq!(config.mesh.sample_seed, 42);
        assert!(config.http.hf_token.is_none());
    }

    #[test]
    fn test_merge_overrides_only_given_keys() {
        let config = merge_with_defaults(
            r#"
            [mesh]
            sample_steps = 30

            [http]
            timeout_secs = 90
            "#,
        )
        .unwrap();

        assert_eq!(config.mesh.sample_steps, 30);
        assert_eq!(config.mesh.sample_seed, 42);
        assert_eq!(config.http.timeout(), Duration::from_secs(90));
        assert_eq!(config.stylizer.steps, 5);
    }

    #[test]
    fn test_merge_empty_file_is_defaults() {
        let config = merge_with_defaults("").unwrap();
        assert_eq!(config.server.bind, default_config().server.bind);
    }

    #[test]
    fn test_merge_rejects_wrong_types() {
        let result = merge_with_defaults("[mesh]\nsample_steps = \"many\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_server_limits() {
        let config = merge_with_defaults("[server]\nartifact_ttl_secs = 90\n").unwrap();
        assert_eq!(config.server.artifact_ttl(), chrono::Duration::seconds(90));
        assert_eq!(config.server.max_upload_bytes, 20 * 1024 * 1024);
    }

    #[test]
    fn test_download_dir_falls_back_to_temp() {
        let config = default_config();
        assert!(config.http.download_dir().ends_with("toonmesh"));
    }
}
