//! The prerender loop.

use std::path::PathBuf;
use std::time::Duration;

use sitebake_routes::Route;

use crate::browser::{Browser, BrowserError, Page};
use crate::output::{write_page, OutputError};

/// Preview server the runner renders from by default.
pub const DEFAULT_BASE_URL: &str = "http://localhost:4173";

/// Event the application dispatches on `document` once it has rendered.
pub const DEFAULT_READY_EVENT: &str = "app-ready";

/// How long to wait for the ready event before capturing anyway.
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for a prerender run.
#[derive(Debug, Clone)]
pub struct PrerenderConfig {
    /// Base URL of the running preview server
    pub base_url: String,

    /// Directory prerendered pages are written to
    pub output_dir: PathBuf,

    /// Name of the in-page ready event
    pub ready_event: String,

    /// Fallback wait when the ready event never fires
    pub ready_timeout: Duration,
}

impl Default for PrerenderConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            output_dir: PathBuf::from("dist"),
            ready_event: DEFAULT_READY_EVENT.to_string(),
            ready_timeout: DEFAULT_READY_TIMEOUT,
        }
    }
}

/// Errors that abort a whole prerender run.
#[derive(Debug, thiserror::Error)]
pub enum PrerenderError {
    #[error("Failed to open browser page: {0}")]
    Page(#[source] BrowserError),
}

/// Errors that fail a single route.
#[derive(Debug, thiserror::Error)]
enum RenderError {
    #[error(transparent)]
    Browser(#[from] BrowserError),

    #[error(transparent)]
    Output(#[from] OutputError),
}

/// How the wait for a page's ready signal ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    /// The page dispatched the ready event
    Signalled,

    /// The fallback timer fired first
    TimedOut,
}

/// Outcome of rendering one route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutcome {
    /// Markup was captured and written to `path`
    Rendered { path: PathBuf },

    /// The route failed; nothing was written
    Failed { reason: String },
}

/// Totals for a prerender run.
#[derive(Debug, Clone, Default)]
pub struct RenderSummary {
    /// Routes written successfully
    pub success_count: usize,

    /// Routes that failed
    pub error_count: usize,

    /// Failed routes with their reasons, in visit order
    pub failures: Vec<(Route, String)>,

    /// Output directory
    pub output_dir: PathBuf,
}

impl RenderSummary {
    fn new(output_dir: PathBuf) -> Self {
        Self {
            output_dir,
            ..Default::default()
        }
    }

    /// Fold one route outcome into the totals.
    pub fn record(&mut self, route: &Route, outcome: RenderOutcome) {
        match outcome {
            RenderOutcome::Rendered { .. } => self.success_count += 1,
            RenderOutcome::Failed { reason } => {
                self.error_count += 1;
                self.failures.push((route.clone(), reason));
            }
        }
    }

    /// Whether every route rendered.
    pub fn is_success(&self) -> bool {
        self.error_count == 0
    }
}

/// Renders routes through a single browser page.
pub struct Prerenderer {
    config: PrerenderConfig,
}

impl Prerenderer {
    /// Create a new prerenderer.
    pub fn new(config: PrerenderConfig) -> Self {
        Self { config }
    }

    /// URL the browser visits for `route`. The application uses hash routing.
    pub fn route_url(&self, route: &Route) -> String {
        format!("{}/#{}", self.config.base_url.trim_end_matches('/'), route)
    }

    /// Render every route in order, then close the browser.
    ///
    /// A failing route is logged and counted; the remaining routes still render.
    /// Only failing to open the page aborts the run.
    pub async fn run<B: Browser>(
        &self,
        mut browser: B,
        routes: &[Route],
    ) -> Result<RenderSummary, PrerenderError> {
        tracing::info!("Prerendering {} routes", routes.len());

        let mut page = match browser.new_page().await {
            Ok(page) => page,
            Err(e) => {
                if let Err(close_err) = browser.close().await {
                    tracing::warn!("Failed to close browser: {}", close_err);
                }
                return Err(PrerenderError::Page(e));
            }
        };

        let mut summary = RenderSummary::new(self.config.output_dir.clone());

        // Routes share one page, so they are rendered strictly one at a time.
        for route in routes {
            tracing::info!("Rendering: {}", route);

            let outcome = match self.render_route(&mut page, route).await {
                Ok(path) => {
                    tracing::debug!("Wrote {}", path.display());
                    RenderOutcome::Rendered { path }
                }
                Err(e) => {
                    tracing::error!("Failed to render {}: {}", route, e);
                    RenderOutcome::Failed {
                        reason: e.to_string(),
                    }
                }
            };

            summary.record(route, outcome);
        }

        drop(page);
        if let Err(e) = browser.close().await {
            tracing::warn!("Failed to close browser: {}", e);
        }

        tracing::info!("Prerender complete");
        tracing::info!("  Success: {} routes", summary.success_count);
        if summary.error_count > 0 {
            tracing::info!("  Errors: {} routes", summary.error_count);
        }
        tracing::info!("  Output: {}", summary.output_dir.display());

        Ok(summary)
    }

    /// Navigate, wait for readiness, capture and write one route.
    async fn render_route<P: Page>(
        &self,
        page: &mut P,
        route: &Route,
    ) -> Result<PathBuf, RenderError> {
        page.goto(&self.route_url(route)).await?;

        let state =
            wait_for_ready(page, &self.config.ready_event, self.config.ready_timeout).await?;
        if state == ReadyState::TimedOut {
            tracing::debug!(
                "{} did not emit '{}' within {:?}, capturing anyway",
                route,
                self.config.ready_event,
                self.config.ready_timeout
            );
        }

        let html = page.content().await?;

        Ok(write_page(&self.config.output_dir, route, &html)?)
    }
}

/// Wait for the page to dispatch `event`, or for `fallback` to elapse, whichever
/// comes first.
pub async fn wait_for_ready<P: Page>(
    page: &mut P,
    event: &str,
    fallback: Duration,
) -> Result<ReadyState, BrowserError> {
    tokio::select! {
        result = page.wait_for_event(event) => result.map(|_| ReadyState::Signalled),
        _ = tokio::time::sleep(fallback) => Ok(ReadyState::TimedOut),
    }
}
