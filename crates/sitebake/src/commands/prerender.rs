//! Prerender command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use sitebake_prerender::{PlaywrightBrowser, PlaywrightConfig, PrerenderConfig, Prerenderer};
use sitebake_routes::RouteGenerator;

use crate::config::ConfigFile;

/// Run the prerender command.
///
/// Fails if the anchors file is malformed, the browser cannot start, or any route
/// fails to render.
pub async fn run(config: &ConfigFile) -> Result<()> {
    tracing::info!("Starting prerender with Playwright...");

    let routes = RouteGenerator::new(&config.prerender.anchors).generate()?;

    let browser = PlaywrightBrowser::launch(PlaywrightConfig {
        node: PathBuf::from(&config.prerender.node),
        ..Default::default()
    })
    .await
    .context("Failed to start the browser")?;

    let prerenderer = Prerenderer::new(PrerenderConfig {
        base_url: config.preview.url.clone(),
        output_dir: PathBuf::from(&config.prerender.output),
        ready_event: config.prerender.ready_event.clone(),
        ready_timeout: config.prerender.ready_timeout(),
    });

    let summary = prerenderer.run(browser, &routes).await?;

    if !summary.is_success() {
        anyhow::bail!(
            "{} of {} routes failed to render",
            summary.error_count,
            routes.len()
        );
    }

    Ok(())
}
