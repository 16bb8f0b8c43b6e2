//! Embeddable three.js viewer markup for an OBJ mesh.
//!
//! The whole mesh text is inlined as base64; large meshes make the page
//! heavy.

use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine};
use tracing::info;

use crate::error::PipelineError;

const THREE_VERSION: &str = "0.128.0";
/// Height of the viewer container in CSS pixels.
pub const VIEWER_HEIGHT: u32 = 400;

/// Read the mesh at `path` and build viewer markup for it.
pub async fn render_obj_viewer(path: &Path) -> Result<String, PipelineError> {
    let obj_text = tokio::fs::read_to_string(path)
        .await
        .map_err(|_| PipelineError::ArtifactUnreadable {
            path: path.to_path_buf(),
        })?;
    info!("Embedding mesh {:?} ({} bytes)", path, obj_text.len());
    Ok(viewer_html(&obj_text))
}

/// Build the viewer markup around already-loaded OBJ text.
pub fn viewer_html(obj_text: &str) -> String {
    let obj_base64 = STANDARD.encode(obj_text.as_bytes());
    let cdn = format!("https://cdn.jsdelivr.net/npm/three@{}", THREE_VERSION);

    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><style>body {{ margin: 0; }}</style></head>
<body>
<script src="{cdn}/build/three.min.js"></script>
<script src="{cdn}/examples/js/controls/OrbitControls.js"></script>
<script src="{cdn}/examples/js/loaders/OBJLoader.js"></script>
<div id="3d-container" style="width:100%;height:{height}px;"></div>
<script>
    const scene = new THREE.Scene();
    const camera = new THREE.PerspectiveCamera(75, window.innerWidth / {height}, 0.1, 1000);
    const renderer = new THREE.WebGLRenderer();
    renderer.setSize(window.innerWidth, {height});
    document.getElementById('3d-container').appendChild(renderer.domElement);

    const controls = new THREE.OrbitControls(camera, renderer.domElement);

    const loader = new THREE.OBJLoader();
    const objData = atob('{obj_base64}');
    const object = loader.parse(objData);
    scene.add(object);

    camera.position.z = 5;

    function animate() {{
        requestAnimationFrame(animate);
        controls.update();
        renderer.render(scene, camera);
    }}
    animate();
</script>
</body>
</html>
"#,
        cdn = cdn,
        height = VIEWER_HEIGHT,
        obj_base64 = obj_base64,
    )
}
