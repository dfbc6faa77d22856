//! Full static build command.

use std::env;
use std::path::Path;

use anyhow::{Context, Result};
use sitebake_pipeline::{OutputMode, Pipeline, PipelineConfig, ProcessSpec, SystemLauncher};
use sitebake_server::ReadinessPoller;

use crate::config::ConfigFile;

/// Prerender step: the configured command, or this executable's `prerender`
/// subcommand with the same config file.
fn prerender_spec(config_path: &Path, config: &ConfigFile) -> Result<ProcessSpec> {
    if let Some(command) = &config.prerender.command {
        return Ok(ProcessSpec::shell("prerender", command));
    }

    let exe = env::current_exe().context("Failed to locate the sitebake executable")?;
    Ok(ProcessSpec::new("prerender", exe)
        .arg("--config")
        .arg(config_path)
        .arg("prerender"))
}

/// Run the build command.
pub async fn run(config_path: &Path, config: &ConfigFile) -> Result<()> {
    let pipeline_config = PipelineConfig {
        build: ProcessSpec::shell("build", &config.build.command),
        preview: ProcessSpec::shell("preview", &config.preview.command)
            .output(OutputMode::Logged),
        prerender: prerender_spec(config_path, config)?,
        preview_url: config.preview.url.clone(),
        max_ready_attempts: config.preview.max_attempts,
    };

    Pipeline::new(
        pipeline_config,
        SystemLauncher::default(),
        ReadinessPoller::default(),
    )
    .run()
    .await
    .context("Static build failed")?;

    Ok(())
}
