//! On-disk layout of a project directory.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use crate::io::config::CONFIG_FILE;
use crate::io::store::{Store, Stores};

/// Canonical paths for a project.
///
/// `run_prefix` lets several runs share one project directory: it is
/// prepended to the `memory` and `workspace` directory names.
#[derive(Debug, Clone)]
pub struct ProjectPaths {
    /// Holds the operator's `prompt`, `feedback` and config file.
    pub root: PathBuf,
    pub memory_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub preprompts_dir: PathBuf,
    pub workspace_dir: PathBuf,
    pub config_path: PathBuf,
}

impl ProjectPaths {
    pub fn new(root: impl Into<PathBuf>, run_prefix: &str) -> Self {
        let root = root.into();
        let memory_dir = root.join(format!("{run_prefix}memory"));
        Self {
            logs_dir: memory_dir.join("logs"),
            preprompts_dir: root.join("preprompts"),
            workspace_dir: root.join(format!("{run_prefix}workspace")),
            config_path: root.join(CONFIG_FILE),
            memory_dir,
            root,
        }
    }

    /// Read preprompts from `dir` instead of the project's own library.
    pub fn with_preprompts_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.preprompts_dir = dir.into();
        self
    }

    /// Remove the memory and workspace directories and recreate them empty.
    ///
    /// Input files and preprompts are untouched.
    pub fn reset(&self) -> Result<()> {
        for dir in [&self.memory_dir, &self.workspace_dir] {
            remove_dir_if_present(dir)?;
            fs::create_dir_all(dir).with_context(|| format!("create directory {}", dir.display()))?;
        }
        info!(root = %self.root.display(), "cleared memory and workspace");
        Ok(())
    }

    /// Build the store bundle over these paths. Nothing is created on disk.
    pub fn stores(&self) -> Stores {
        Stores {
            memory: Store::new("memory", &self.memory_dir),
            logs: Store::new("logs", &self.logs_dir),
            preprompts: Store::new("preprompts", &self.preprompts_dir),
            input: Store::new("input", &self.root),
            workspace: Store::new("workspace", &self.workspace_dir),
        }
    }
}

fn remove_dir_if_present(dir: &Path) -> Result<()> {
    if !dir.exists() {
        return Ok(());
    }
    fs::remove_dir_all(dir).with_context(|| format!("remove directory {}", dir.display()))
}
