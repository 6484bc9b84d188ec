//! Prompt-orchestration pipeline that turns a natural-language project
//! description into generated source files.
//!
//! A run selects a preset (a fixed list of steps). Each step talks to a
//! chat-completion backend through [`io::conversation::Ai`], reads and writes
//! the directory-backed [`io::store::Stores`], and returns its transcript,
//! which the [`pipeline`] runner persists so later steps can replay it.
//!
//! - **[`core`]**: Pure, deterministic logic (reply parsing, presets, clarify
//!   rules). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (filesystem, HTTP, terminal,
//!   subprocesses). Isolated behind traits to enable fakes in tests.
//!
//! [`steps`] and [`pipeline`] coordinate the two.

pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod pipeline;
pub mod steps;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
