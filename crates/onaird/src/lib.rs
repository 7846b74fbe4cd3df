//! onaird library - exposes modules for testing.

pub mod proxy;
pub mod routes;
pub mod server;
