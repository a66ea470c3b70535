//! mathdb - a static site generator for schema-described data tables.
//!
//! Hand-edited JSON records reference each other with `#hashtags` and cite a
//! shared bibliography with `\cite{key}`. Every run loads all tables, builds
//! one global index, rewrites references into links and writes a complete,
//! cross-linked site.
//!
//! ```ignore
//! let config = SiteConfig::load(&cli)?;
//! let mut hooks = HookRegistry::new();
//! hooks.register_renderer("equations", MyCards);
//! build_site(&config, &hooks)?;
//! ```

pub mod assemble;
pub mod bibliography;
pub mod build;
pub mod cli;
pub mod config;
pub mod diagnostic;
pub mod error;
pub mod graph;
pub mod hooks;
pub mod index;
pub mod logger;
pub mod record;
pub mod render;
pub mod resolve;
pub mod schema;
pub mod utils;

pub use build::{BuildReport, build_site, generate};
pub use config::SiteConfig;
pub use diagnostic::{Diagnostic, DiagnosticKind, Diagnostics, Severity};
pub use graph::{GraphDescriptor, GraphEdge, GraphHook, GraphInput, GraphNode};
pub use hooks::HookRegistry;
pub use index::Index;
pub use render::{RenderContext, TableRenderer};
pub use resolve::{ResolvedRecord, ResolvedTable, Resolver, resolve_text};
pub use schema::Schema;
