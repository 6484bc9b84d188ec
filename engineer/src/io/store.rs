//! Directory-backed key/value stores for pipeline state.
//!
//! Keys are relative paths; writing a key creates its parent directories.
//! Values are stored byte-for-byte, with no newline normalization.

use std::fs;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::core::chat_to_files::parse_chat;
use crate::error::{PipelineError, kind};

/// Key holding the raw reply that produced the current workspace files.
pub const ALL_OUTPUT_KEY: &str = "all_output.txt";

/// A namespace of text blobs rooted at a directory.
#[derive(Debug, Clone)]
pub struct Store {
    name: &'static str,
    root: PathBuf,
}

impl Store {
    /// Constructing a store touches nothing on disk.
    pub fn new(name: &'static str, root: impl Into<PathBuf>) -> Self {
        Self {
            name,
            root: root.into(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn contains(&self, key: &str) -> bool {
        self.path_for(key).is_ok_and(|path| path.exists())
    }

    /// Read `key`, failing with [`PipelineError::NotFound`] if it is absent.
    pub fn get(&self, key: &str) -> Result<String> {
        let path = self.path_for(key)?;
        if !path.exists() {
            return Err(PipelineError::not_found(self.name, key).into());
        }
        fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))
    }

    /// Read `key`, or return `default` when it cannot be read.
    pub fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|_| default.to_string())
    }

    /// Store `value` under `key`, replacing any previous value.
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create directory {}", parent.display()))?;
        }
        debug!(store = self.name, key, bytes = value.len(), "store write");
        fs::write(&path, value).with_context(|| format!("write {}", path.display()))
    }

    /// Resolve `key` under the root. Keys must stay inside the root.
    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let mut components = relative.components().peekable();
        if components.peek().is_none() {
            return Err(PipelineError::InvalidKey(key.to_string()).into());
        }
        let escapes = components.any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(PipelineError::InvalidKey(key.to_string()).into());
        }
        Ok(self.root.join(relative))
    }
}

/// The five stores every step receives.
#[derive(Debug, Clone)]
pub struct Stores {
    /// Cross-step scratch data such as the generated specification.
    pub memory: Store,
    /// One persisted transcript per step identity.
    pub logs: Store,
    /// Read-only prompt templates.
    pub preprompts: Store,
    /// Project-supplied input (`prompt`, `feedback`).
    pub input: Store,
    /// Where generated files land.
    pub workspace: Store,
}

/// Write a model reply and every file parsed from it into `workspace`.
///
/// The raw reply goes to `all_output.txt` first, so a parsed file with that
/// name overwrites it. Files whose path the store rejects are skipped.
pub fn to_files(chat: &str, workspace: &Store) -> Result<()> {
    workspace.set(ALL_OUTPUT_KEY, chat)?;

    for (path, content) in parse_chat(chat) {
        match workspace.set(&path, &content) {
            Ok(()) => {}
            Err(err) if matches!(kind(&err), Some(PipelineError::InvalidKey(_))) => {
                warn!(path = %path, "skipping generated file with unusable path");
            }
            Err(err) => return Err(err),
        }
    }
    Ok(())
}
