//! Route listing command.

use anyhow::Result;
use sitebake_routes::RouteGenerator;

use crate::config::ConfigFile;

/// Print the routes that would be prerendered, one per line.
pub fn run(config: &ConfigFile) -> Result<()> {
    let routes = RouteGenerator::new(&config.prerender.anchors).generate()?;

    for route in routes {
        println!("{}", route);
    }

    Ok(())
}
