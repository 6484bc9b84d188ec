//! Built-in preprompt library.
//!
//! The templates ship inside the binary and are copied into the project's
//! preprompt directory on startup. Files already there are left alone so
//! operators can edit them.

use anyhow::Result;
use tracing::debug;

use crate::io::store::Store;

macro_rules! preprompt {
    ($name:literal) => {
        (
            $name,
            include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/preprompts/", $name)),
        )
    };
}

/// Name and default text of every preprompt a step may read.
pub const BUILTIN: [(&str, &str); 9] = [
    preprompt!("generate"),
    preprompt!("philosophy"),
    preprompt!("qa"),
    preprompt!("spec"),
    preprompt!("respec"),
    preprompt!("unit_tests"),
    preprompt!("use_qa"),
    preprompt!("use_feedback"),
    preprompt!("fix_code"),
];

/// Write every built-in preprompt missing from `store`; returns the names written.
pub fn seed_missing(store: &Store) -> Result<Vec<&'static str>> {
    let mut written = Vec::new();
    for (name, text) in BUILTIN {
        if store.contains(name) {
            continue;
        }
        store.set(name, text)?;
        written.push(name);
    }
    if !written.is_empty() {
        debug!(root = %store.root().display(), seeded = ?written, "seeded preprompts");
    }
    Ok(written)
}
