//! Resolution of Space identifiers to HTTP roots.

use url::Url;

/// Turn a Space id (`owner/name`) or a base URL into the root URL that API
/// routes hang off, with `api_prefix` appended when set.
///
/// `MotionDiz/SDXL-Turbo-Img2Img-CPU` becomes
/// `https://motiondiz-sdxl-turbo-img2img-cpu.hf.space`.
pub fn resolve_root(space: &str, api_prefix: &str) -> Result<String, String> {
    let space = space.trim();
    if space.is_empty() {
        return Err("Space id is empty".to_string());
    }

    let base = if space.starts_with("http://") || space.starts_with("https://") {
        let url = Url::parse(space).map_err(|e| format!("Invalid Space URL '{}': {}", space, e))?;
        if url.host_str().is_none() {
            return Err(format!("No host in Space URL: {}", space));
        }
        space.trim_end_matches('/').to_string()
    } else {
        let (owner, name) = space
            .split_once('/')
            .filter(|(o, n)| !o.is_empty() && !n.is_empty() && !n.contains('/'))
            .ok_or_else(|| format!("Space id must look like 'owner/name', got '{}'", space))?;
        let subdomain = format!("{}-{}", owner, name)
            .to_lowercase()
            .replace(['_', '.'], "-");
        format!("https://{}.hf.space", subdomain)
    };

    let prefix = api_prefix.trim_matches('/');
    if prefix.is_empty() {
        Ok(base)
    } else {
        Ok(format!("{}/{}", base, prefix))
    }
}

/// Normalize an API name to the bare route segment (`/predict` -> `predict`).
pub fn api_route(api_name: &str) -> &str {
    api_name.trim_start_matches('/')
}
