//! Build, preview and prerender orchestration for sitebake.
//!
//! Runs the site's bundler, starts its preview server, waits for it to answer,
//! runs the prerender step against it and always stops the preview server again.

pub mod pipeline;
pub mod process;

pub use pipeline::{
    Pipeline, PipelineConfig, PipelineError, ReadinessProbe, Stage, DEFAULT_MAX_READY_ATTEMPTS,
    DEFAULT_PREVIEW_URL,
};
pub use process::{
    BackgroundProcess, ChildProcess, Launcher, OutputMode, ProcessExit, ProcessSpec,
    SystemLauncher,
};
