//! Test infrastructure for the FITS processing workspace.
//!
//! Provides workspace-root discovery, a persistent `test_output/` directory
//! for artifacts worth inspecting by eye (rendered figures, generated FITS
//! files), and [`synthetic`] star fields with deterministic noise.
//!
//! ```text
//! test_output/
//! ├── figures/     # Rendered overlays
//! └── fits/        # Synthetic inputs kept for manual inspection
//! ```

pub mod synthetic;

use once_cell::sync::Lazy;
use std::env;
use std::path::{Path, PathBuf};

/// Errors raised while locating test resources.
#[derive(thiserror::Error, Debug)]
pub enum TestHelperError {
    /// Project root directory could not be located or accessed.
    ///
    /// Usually means the tests were started outside the workspace or the
    /// root Cargo.toml has no `[workspace]` section.
    #[error("Failed to find project root: {0}")]
    ProjectRootNotFound(String),
}

/// Locate the workspace root.
///
/// Walks upward from the current directory until a Cargo.toml containing a
/// `[workspace]` section is found.
///
/// # Examples
/// ```rust
/// use test_helpers::find_project_root;
///
/// let root = find_project_root().expect("Project root not found");
/// assert!(root.join("Cargo.toml").exists());
/// assert!(root.join("skyproc").exists());
/// ```
pub fn find_project_root() -> Result<PathBuf, TestHelperError> {
    let mut current_dir = env::current_dir().map_err(|e| {
        TestHelperError::ProjectRootNotFound(format!("Failed to get current directory: {}", e))
    })?;

    loop {
        let cargo_toml = current_dir.join("Cargo.toml");
        if cargo_toml.exists() {
            let content = std::fs::read_to_string(&cargo_toml).map_err(|e| {
                TestHelperError::ProjectRootNotFound(format!("Failed to read Cargo.toml: {}", e))
            })?;

            if content.contains("[workspace]") {
                return Ok(current_dir);
            }
        }

        if !current_dir.pop() {
            break;
        }
    }

    Err(TestHelperError::ProjectRootNotFound(
        "Workspace root not found".to_string(),
    ))
}

/// Workspace root, computed once per test binary.
static PROJECT_ROOT: Lazy<PathBuf> =
    Lazy::new(|| find_project_root().expect("Failed to find project root directory"));

/// Shared `<workspace>/test_output/` directory, created on first use.
///
/// Files written here survive the test run so rendered figures can be
/// inspected afterwards.
pub fn get_output_dir() -> PathBuf {
    let output_dir = PROJECT_ROOT.join("test_output");

    if !output_dir.exists() {
        std::fs::create_dir_all(&output_dir).expect("Failed to create output directory");
    }

    output_dir
}

/// Path inside the test output directory, creating intermediate
/// directories for nested paths such as `figures/overlay.png`.
///
/// # Examples
/// ```rust
/// use test_helpers::output_path;
///
/// let figure = output_path("figures/overlay.png");
/// assert!(figure.parent().unwrap().exists());
/// ```
pub fn output_path<P: AsRef<Path>>(path: P) -> PathBuf {
    let full = get_output_dir().join(path);
    if let Some(parent) = full.parent() {
        std::fs::create_dir_all(parent).expect("Failed to create output subdirectory");
    }
    full
}
