//! Browser automation seam.
//!
//! The runner only needs a handful of page operations. Keeping them behind traits
//! lets the Playwright bridge be swapped for an in-process fake in tests.

use async_trait::async_trait;

/// Errors raised by a browser or page.
#[derive(Debug, thiserror::Error)]
pub enum BrowserError {
    #[error("Failed to launch browser: {0}")]
    Launch(String),

    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("Page script failed: {0}")]
    Script(String),

    #[error("Browser connection closed")]
    Closed,

    #[error("Browser protocol error: {0}")]
    Protocol(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A running browser instance.
#[async_trait]
pub trait Browser: Send {
    /// Page type produced by this browser.
    type Page: Page;

    /// Open a new page in the browser's single context.
    async fn new_page(&mut self) -> Result<Self::Page, BrowserError>;

    /// Shut the browser down.
    async fn close(self) -> Result<(), BrowserError>;
}

/// A single browser page (tab).
#[async_trait]
pub trait Page: Send {
    /// Navigate to `url` and resolve once the network is idle.
    async fn goto(&mut self, url: &str) -> Result<(), BrowserError>;

    /// Resolve when the document dispatches the event `name`.
    ///
    /// May never resolve if the page does not emit the event; callers bound it
    /// with their own timer.
    async fn wait_for_event(&mut self, name: &str) -> Result<(), BrowserError>;

    /// Serialized markup of the current document.
    async fn content(&mut self) -> Result<String, BrowserError>;
}
