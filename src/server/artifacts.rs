use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

/// A mesh handed over to the presentation layer.
#[derive(Debug, Clone)]
pub struct StoredArtifact {
    pub path: PathBuf,
    pub expires_at: DateTime<Utc>,
}

/// Meshes available for download, keyed by an opaque id.
///
/// Entries expire after the configured TTL; expired entries are dropped on
/// the next `register`. The files themselves stay where the mesh generator
/// put them.
#[derive(Debug)]
pub struct ArtifactRegistry {
    ttl: Duration,
    entries: Mutex<HashMap<String, StoredArtifact>>,
}

impl ArtifactRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Register a mesh file and return its id.
    pub fn register(&self, path: PathBuf) -> String {
        let now = Utc::now();
        let id = generate_artifact_id();
        let expires_at = now
            .checked_add_signed(self.ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|_, artifact| artifact.expires_at > now);
        if entries.len() < before {
            debug!("Dropped {} expired artifacts", before - entries.len());
        }

        info!("Registered artifact {} -> {:?}", id, path);
        entries.insert(id.clone(), StoredArtifact { path, expires_at });
        id
    }

    /// Look up a live entry. Returns None if unknown or expired.
    pub fn get(&self, id: &str) -> Option<StoredArtifact> {
        let now = Utc::now();
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .get(id)
            .filter(|artifact| artifact.expires_at > now)
            .cloned()
    }
}

/// 16 lowercase hex chars.
fn generate_artifact_id() -> String {
    let bytes: [u8; 8] = rand::random();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
