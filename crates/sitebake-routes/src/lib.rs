//! Route list generation for sitebake prerendering.
//!
//! Produces the ordered list of application routes to prerender: a fixed set of
//! base pages followed by one page per anchor listed in the site's anchors data file.

pub mod anchor;
pub mod generator;
pub mod route;

pub use anchor::Anchor;
pub use generator::{generate_routes, RouteError, RouteGenerator, BASE_ROUTES, DEFAULT_ANCHORS_PATH};
pub use route::{InvalidRoute, Route};
