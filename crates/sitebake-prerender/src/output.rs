//! Mapping routes to output files.

use std::fs;
use std::path::{Path, PathBuf};

use sitebake_routes::Route;

/// Errors that can occur when writing prerendered pages.
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("Route {0} cannot be mapped to an output path")]
    UnsafeRoute(String),

    #[error("Failed to write {path}: {message}")]
    WriteError { path: PathBuf, message: String },
}

/// Calculate the output file for a route.
///
/// `/` maps to `<root>/index.html`, `/x/y` to `<root>/x/y/index.html`. A trailing
/// slash is ignored. Routes with empty, `.` or `..` segments, or backslashes, are
/// rejected so nothing is written outside the output root.
pub fn output_path(output_root: &Path, route: &Route) -> Result<PathBuf, OutputError> {
    if route.is_root() {
        return Ok(output_root.join("index.html"));
    }

    let relative = &route.as_str()[1..];
    let relative = relative.strip_suffix('/').unwrap_or(relative);

    let mut path = output_root.to_path_buf();
    for segment in relative.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." || segment.contains('\\') {
            return Err(OutputError::UnsafeRoute(route.to_string()));
        }
        path.push(segment);
    }

    Ok(path.join("index.html"))
}

/// Write `html` for `route` under `output_root`, creating directories as needed.
///
/// Returns the path written.
pub fn write_page(output_root: &Path, route: &Route, html: &str) -> Result<PathBuf, OutputError> {
    let path = output_path(output_root, route)?;

    // Ensure output directory exists
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| OutputError::WriteError {
            path: parent.to_path_buf(),
            message: e.to_string(),
        })?;
    }

    fs::write(&path, html).map_err(|e| OutputError::WriteError {
        path: path.clone(),
        message: e.to_string(),
    })?;

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn route(path: &str) -> Route {
        Route::new(path).unwrap()
    }

    #[test]
    fn maps_root_to_index() {
        let root = Path::new("dist");
        assert_eq!(
            output_path(root, &route("/")).unwrap(),
            PathBuf::from("dist/index.html")
        );
    }

    #[test]
    fn maps_nested_routes_to_directories() {
        let root = Path::new("dist");
        assert_eq!(
            output_path(root, &route("/anchor/tdd")).unwrap(),
            PathBuf::from("dist/anchor/tdd/index.html")
        );
        assert_eq!(
            output_path(root, &route("/about")).unwrap(),
            PathBuf::from("dist/about/index.html")
        );
    }

    #[test]
    fn ignores_trailing_slash() {
        assert_eq!(
            output_path(Path::new("dist"), &route("/about/")).unwrap(),
            PathBuf::from("dist/about/index.html")
        );
    }

    #[test]
    fn rejects_routes_escaping_the_output_root() {
        let root = Path::new("dist");
        for path in ["/anchor/..", "/../etc", "/a//b", "//a", "/./a", "/a\\b"] {
            assert!(
                matches!(output_path(root, &route(path)), Err(OutputError::UnsafeRoute(_))),
                "{} should be rejected",
                path
            );
        }
    }

    #[test]
    fn writes_page_creating_directories() {
        let temp = tempdir().unwrap();

        let written = write_page(temp.path(), &route("/anchor/tdd"), "<html></html>").unwrap();

        assert_eq!(written, temp.path().join("anchor/tdd/index.html"));
        assert_eq!(fs::read_to_string(written).unwrap(), "<html></html>");
    }

    #[test]
    fn overwrites_existing_index() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("index.html"), "shell").unwrap();

        write_page(temp.path(), &route("/"), "rendered").unwrap();

        assert_eq!(
            fs::read_to_string(temp.path().join("index.html")).unwrap(),
            "rendered"
        );
    }
}
