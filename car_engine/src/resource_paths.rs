//! Asset path resolution
//!
//! All assets live under one resource root:
//!
//! ```text
//! <root>/shaders/<name>
//! <root>/shaders/__CACHE__/<name>.spv
//! <root>/shaders/__CACHE__/<name>.crss
//! <root>/images/<name>
//! <root>/fonts/<name>
//! ```

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Directory name of the compiled shader cache inside `shaders/`
pub const SHADER_CACHE_DIR: &str = "__CACHE__";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourcePaths {
    root: PathBuf,
}

impl Default for ResourcePaths {
    fn default() -> Self {
        Self::new("./resources")
    }
}

impl ResourcePaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn shader(&self, name: &str) -> PathBuf {
        self.root.join("shaders").join(name)
    }

    /// Precompiled SPIR-V for a shader source file
    pub fn shader_cache(&self, name: &str) -> PathBuf {
        self.root
            .join("shaders")
            .join(SHADER_CACHE_DIR)
            .join(format!("{}.spv", name))
    }

    /// `.crss` container (SPIR-V plus descriptor layout) for a shader source file
    pub fn compiled_shader(&self, name: &str) -> PathBuf {
        self.root
            .join("shaders")
            .join(SHADER_CACHE_DIR)
            .join(format!("{}.crss", name))
    }

    pub fn image(&self, name: &str) -> PathBuf {
        self.root.join("images").join(name)
    }

    pub fn font(&self, name: &str) -> PathBuf {
        self.root.join("fonts").join(name)
    }

    /// Return `path` if it exists, `Error::Io` naming it otherwise
    pub fn require(path: PathBuf) -> Result<PathBuf> {
        if path.exists() {
            Ok(path)
        } else {
            Err(Error::Io(format!("required asset not found: {}", path.display())))
        }
    }
}
