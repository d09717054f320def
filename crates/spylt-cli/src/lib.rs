//! Spylt command-line interface: scaffolding, interface generation and builds.

pub mod commands;
pub mod config;
pub mod templates;

pub use commands::{build, link, new_project, write_interface, BuildOptions};
pub use config::{resolve_bundler, resolve_component};
