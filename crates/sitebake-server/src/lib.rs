//! Preview server and readiness polling for sitebake.
//!
//! Serves a built single-page application from disk, and polls an HTTP endpoint
//! until it answers so dependent steps only start once a server is up.

pub mod preview;
pub mod ready;

pub use preview::{PreviewServer, PreviewServerConfig, ServerError};
pub use ready::{wait_until_ready, ReadinessPoller};
