//! Configuration file (sitebake.toml).

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use serde::Deserialize;

/// Configuration file structure (sitebake.toml).
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub build: BuildSection,
    #[serde(default)]
    pub preview: PreviewSection,
    #[serde(default)]
    pub prerender: PrerenderSection,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildSection {
    /// Bundler command line
    #[serde(default = "default_build_command")]
    pub command: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PreviewSection {
    /// Preview server command line
    #[serde(default = "default_preview_command")]
    pub command: String,
    /// URL the preview server answers on
    #[serde(default = "default_preview_url")]
    pub url: String,
    /// Readiness probes before giving up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PrerenderSection {
    /// Anchors data file
    #[serde(default = "default_anchors")]
    pub anchors: String,
    /// Output directory for prerendered pages
    #[serde(default = "default_output")]
    pub output: String,
    /// In-page event signalling the app has rendered
    #[serde(default = "default_ready_event")]
    pub ready_event: String,
    /// Fallback wait for the ready event, in milliseconds
    #[serde(default = "default_ready_timeout_ms")]
    pub ready_timeout_ms: u64,
    /// Node.js executable for the Playwright driver
    #[serde(default = "default_node")]
    pub node: String,
    /// Override for the prerender step run by `build`
    pub command: Option<String>,
}

impl PrerenderSection {
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }
}

impl Default for BuildSection {
    fn default() -> Self {
        Self {
            command: default_build_command(),
        }
    }
}

impl Default for PreviewSection {
    fn default() -> Self {
        Self {
            command: default_preview_command(),
            url: default_preview_url(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl Default for PrerenderSection {
    fn default() -> Self {
        Self {
            anchors: default_anchors(),
            output: default_output(),
            ready_event: default_ready_event(),
            ready_timeout_ms: default_ready_timeout_ms(),
            node: default_node(),
            command: None,
        }
    }
}

fn default_build_command() -> String {
    "npm run build".to_string()
}
fn default_preview_command() -> String {
    "npm run preview".to_string()
}
fn default_preview_url() -> String {
    sitebake_pipeline::DEFAULT_PREVIEW_URL.to_string()
}
fn default_max_attempts() -> u32 {
    sitebake_pipeline::DEFAULT_MAX_READY_ATTEMPTS
}
fn default_anchors() -> String {
    sitebake_routes::DEFAULT_ANCHORS_PATH.to_string()
}
fn default_output() -> String {
    "dist".to_string()
}
fn default_ready_event() -> String {
    sitebake_prerender::DEFAULT_READY_EVENT.to_string()
}
fn default_ready_timeout_ms() -> u64 {
    sitebake_prerender::DEFAULT_READY_TIMEOUT.as_millis() as u64
}
fn default_node() -> String {
    "node".to_string()
}

/// Load configuration from `path` if it exists.
/// Returns an error if the config file exists but is malformed.
pub fn load_config(path: &Path) -> Result<ConfigFile> {
    if path.exists() {
        let content = fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
        let config: ConfigFile = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path.display(), e))?;
        tracing::info!("Loaded config from {}", path.display());
        return Ok(config);
    }
    Ok(ConfigFile::default())
}
