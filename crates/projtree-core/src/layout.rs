//! The on-disk folder layout the engine works in.
//!
//! ```text
//! <root>/
//!   projects/   watched project content
//!   images/     icon images for the presentation layer
//!   tmp/        clipboard holding area, never reconciled
//! ```

use std::path::Path;

use tracing::warn;

use crate::error::{CoreError, CoreResult};
use crate::path_key::PathKey;

pub const PROJECTS_DIR: &str = "projects";
pub const IMAGES_DIR: &str = "images";
pub const HOLDING_DIR: &str = "tmp";

/// Resolved paths of a validated root folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    root: PathKey,
    projects: PathKey,
    images: PathKey,
    holding_area: PathKey,
}

impl Layout {
    /// Validates `root`, creating any of the three fixed subdirectories that
    /// are missing. A relative `root` is resolved against the current
    /// directory.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotADirectory`] — `root` or one of the subdirectories is a file.
    /// - [`CoreError::Io`] — a directory could not be created.
    pub fn ensure(root: impl AsRef<Path>) -> CoreResult<Self> {
        let root = root.as_ref();
        let absolute = if root.is_absolute() {
            root.to_path_buf()
        } else {
            std::env::current_dir()?.join(root)
        };
        let root = PathKey::normalize(absolute)?;

        let layout = Self {
            projects: root.join(PROJECTS_DIR)?,
            images: root.join(IMAGES_DIR)?,
            holding_area: root.join(HOLDING_DIR)?,
            root,
        };
        for dir in [&layout.root, &layout.projects, &layout.images, &layout.holding_area] {
            ensure_dir(dir)?;
        }
        Ok(layout)
    }

    pub fn root(&self) -> &PathKey {
        &self.root
    }

    /// The watched directory and root of the node tree.
    pub fn projects(&self) -> &PathKey {
        &self.projects
    }

    pub fn images(&self) -> &PathKey {
        &self.images
    }

    /// The clipboard holding area (`tmp/`).
    pub fn holding_area(&self) -> &PathKey {
        &self.holding_area
    }

    /// Returns `true` if `key` is the holding area or inside it.
    pub fn is_holding_area(&self, key: &PathKey) -> bool {
        key.starts_with(&self.holding_area)
    }

    /// Returns `true` if `key` lies strictly below `projects/` and outside
    /// the holding area.
    pub fn is_project_content(&self, key: &PathKey) -> bool {
        key != &self.projects && key.starts_with(&self.projects) && !self.is_holding_area(key)
    }
}

fn ensure_dir(dir: &PathKey) -> CoreResult<()> {
    match std::fs::metadata(dir.as_path()) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(CoreError::NotADirectory(dir.as_path().to_path_buf())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %dir, "missing folder, creating it");
            std::fs::create_dir_all(dir.as_path())?;
            Ok(())
        }
        Err(e) => Err(CoreError::Io(e)),
    }
}
