//! Image-to-3D generation, artifact handling, and in-browser display.

pub mod artifact;
pub mod generator;
pub mod viewer;

pub use artifact::{extract_artifact_path, MeshArtifact};
pub use generator::{MeshGenerator, MeshParams, MeshStep};
pub use viewer::render_obj_viewer;
