//! Route generation from the anchors data file.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::anchor::Anchor;
use crate::route::Route;

/// Pages that are always prerendered, in output order.
pub const BASE_ROUTES: [&str; 3] = ["/", "/about", "/contributing"];

/// Location of the anchors file relative to the project root.
pub const DEFAULT_ANCHORS_PATH: &str = "public/data/anchors.json";

/// Errors that can occur while generating routes.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Generates the prerender route list.
#[derive(Debug, Clone)]
pub struct RouteGenerator {
    anchors_path: PathBuf,
}

impl Default for RouteGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_ANCHORS_PATH)
    }
}

impl RouteGenerator {
    /// Create a generator reading anchors from `anchors_path`.
    pub fn new(anchors_path: impl Into<PathBuf>) -> Self {
        Self {
            anchors_path: anchors_path.into(),
        }
    }

    /// Path of the anchors file this generator reads.
    pub fn anchors_path(&self) -> &Path {
        &self.anchors_path
    }

    /// Generate the route list.
    ///
    /// A missing anchors file is not an error: only the base routes are returned.
    /// A file that exists but cannot be read or parsed is.
    pub fn generate(&self) -> Result<Vec<Route>, RouteError> {
        let content = match fs::read_to_string(&self.anchors_path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::warn!(
                    "{} not found - prerendering static pages only",
                    self.anchors_path.display()
                );
                return Ok(base_routes());
            }
            Err(source) => {
                return Err(RouteError::Read {
                    path: self.anchors_path.clone(),
                    source,
                })
            }
        };

        let anchors: Vec<Anchor> =
            serde_json::from_str(&content).map_err(|source| RouteError::Parse {
                path: self.anchors_path.clone(),
                source,
            })?;

        let mut routes = base_routes();
        let mut seen = HashSet::new();

        for anchor in &anchors {
            if !seen.insert(anchor.id.as_str()) {
                tracing::warn!("Duplicate anchor id '{}' skipped", anchor.id);
                continue;
            }
            routes.push(Route::anchor(&anchor.id));
        }

        tracing::info!(
            "Generated {} routes for prerendering ({} pages + {} anchors)",
            routes.len(),
            BASE_ROUTES.len(),
            routes.len() - BASE_ROUTES.len()
        );

        Ok(routes)
    }
}

/// Generate routes from the anchors file at `anchors_path`.
pub fn generate_routes(anchors_path: &Path) -> Result<Vec<Route>, RouteError> {
    RouteGenerator::new(anchors_path).generate()
}

fn base_routes() -> Vec<Route> {
    BASE_ROUTES.iter().copied().map(Route::from_static).collect()
}
