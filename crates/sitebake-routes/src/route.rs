//! The `Route` path type.

use std::fmt;
use std::str::FromStr;

/// A logical application path such as `/`, `/about` or `/anchor/tdd`.
///
/// Always begins with `/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Route(String);

/// Error returned when a string is not a valid route.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("Invalid route '{0}': routes must begin with '/'")]
pub struct InvalidRoute(pub String);

impl Route {
    /// Create a route, checking that it begins with `/`.
    pub fn new(path: impl Into<String>) -> Result<Self, InvalidRoute> {
        let path = path.into();
        if path.starts_with('/') {
            Ok(Self(path))
        } else {
            Err(InvalidRoute(path))
        }
    }

    /// Route from a path already known to begin with `/`.
    pub(crate) fn from_static(path: &'static str) -> Self {
        Self(path.to_string())
    }

    /// Route for a single anchor page.
    pub fn anchor(id: &str) -> Self {
        Self(format!("/anchor/{}", id))
    }

    /// The route as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the site root.
    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// Path segments without the leading slash; empty for the root.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Route {
    type Err = InvalidRoute;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for Route {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
