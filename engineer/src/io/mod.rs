//! Side-effecting collaborators: stores, backend, console, subprocesses.

pub mod backend;
pub mod cancel;
pub mod config;
pub mod console;
pub mod conversation;
pub mod preprompts;
pub mod process;
pub mod project;
pub mod prompt;
pub mod store;
pub mod transcript_log;
