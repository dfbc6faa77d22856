//! Subcommand implementations.

pub mod build;
pub mod prerender;
pub mod routes;
pub mod serve;
