//! onairctl library - exposes modules for testing.

pub mod commands;
pub mod render;
