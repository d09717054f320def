//! Spylt: generate a Quart API server and a JavaScript client from typed
//! Python functions, and bundle Svelte components into a single page.

pub mod bundle;
pub mod emit;
pub mod interface;
pub mod introspect;
pub mod linker;
pub mod module;
pub mod pointer;
pub mod source;
pub mod types;

pub use bundle::{bundle, render_html, strip_asset, Bundle, BundlerConfig};
pub use emit::emit;
pub use interface::{create_interface, Interface};
pub use introspect::extract;
pub use linker::create_linker;
pub use module::Module;
pub use pointer::{find_pointer, Pointer};
pub use source::SourceFile;
pub use types::*;
