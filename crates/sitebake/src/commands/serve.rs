//! Preview server command.

use std::path::PathBuf;

use anyhow::Result;
use sitebake_server::{PreviewServer, PreviewServerConfig};

/// Run the serve command.
pub async fn run(port: u16, dir: PathBuf, open: bool) -> Result<()> {
    let config = PreviewServerConfig {
        dir,
        port,
        open,
        ..Default::default()
    };

    PreviewServer::new(config).start().await?;

    Ok(())
}
