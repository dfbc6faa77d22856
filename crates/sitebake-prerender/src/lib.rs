//! Headless-browser prerendering of single-page application routes.
//!
//! Drives one browser page through a list of routes, waits for each to signal that
//! it has rendered, and writes the resulting markup as static HTML.

pub mod browser;
pub mod output;
pub mod playwright;
pub mod runner;

pub use browser::{Browser, BrowserError, Page};
pub use output::{output_path, write_page, OutputError};
pub use playwright::{PlaywrightBrowser, PlaywrightConfig, PlaywrightPage};
pub use runner::{
    wait_for_ready, PrerenderConfig, PrerenderError, Prerenderer, ReadyState, RenderOutcome,
    RenderSummary, DEFAULT_BASE_URL, DEFAULT_READY_EVENT, DEFAULT_READY_TIMEOUT,
};
