//! Per-table render and graph hooks.
//!
//! Hooks come from two places: registered in code on a [`HookRegistry`], or
//! found on disk as `render.json` / `graph.json` inside the table directory.
//! A registered hook wins over the file. A hook file that cannot be loaded is
//! reported and the table carries on without it.

use crate::diagnostic::Diagnostic;
use crate::graph::{GRAPH_FILE, GraphHook, GraphSpec};
use crate::render::TableRenderer;
use crate::render::template::{RENDER_FILE, TemplateRenderer};
use crate::schema::Schema;
use rustc_hash::FxHashMap;
use std::path::Path;
use std::sync::Arc;

/// Hooks registered in code, keyed by table name.
#[derive(Default, Clone)]
pub struct HookRegistry {
    renderers: FxHashMap<String, Arc<dyn TableRenderer>>,
    graphs: FxHashMap<String, Arc<dyn GraphHook>>,
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookRegistry")
            .field("renderers", &self.renderers.keys().collect::<Vec<_>>())
            .field("graphs", &self.graphs.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_renderer(&mut self, table: impl Into<String>, renderer: impl TableRenderer + 'static) -> &mut Self {
        self.renderers.insert(table.into(), Arc::new(renderer));
        self
    }

    pub fn register_graph(&mut self, table: impl Into<String>, hook: impl GraphHook + 'static) -> &mut Self {
        self.graphs.insert(table.into(), Arc::new(hook));
        self
    }

    pub fn renderer(&self, table: &str) -> Option<Arc<dyn TableRenderer>> {
        self.renderers.get(table).cloned()
    }

    pub fn graph(&self, table: &str) -> Option<Arc<dyn GraphHook>> {
        self.graphs.get(table).cloned()
    }

    /// Hooks of one table: registered ones first, then files in `table_dir`.
    pub fn resolve(&self, schema: &Schema, table_dir: &Path) -> TableHooks {
        let table = schema.table_name.as_str();
        let mut diagnostics = Vec::new();

        let renderer = self.renderer(table).or_else(|| {
            let path = table_dir.join(RENDER_FILE);
            if !path.is_file() {
                return None;
            }
            match TemplateRenderer::load(&path, schema) {
                Ok(renderer) => Some(Arc::new(renderer) as Arc<dyn TableRenderer>),
                Err(err) => {
                    diagnostics.push(Diagnostic::render(table, &err).with_source(&path));
                    None
                }
            }
        });

        let graph = self.graph(table).or_else(|| {
            let path = table_dir.join(GRAPH_FILE);
            if !path.is_file() {
                return None;
            }
            match GraphSpec::load(&path) {
                Ok(spec) => Some(Arc::new(spec) as Arc<dyn GraphHook>),
                Err(err) => {
                    diagnostics.push(Diagnostic::graph(table, &err).with_source(&path));
                    None
                }
            }
        });

        TableHooks {
            renderer,
            graph,
            diagnostics,
        }
    }
}

/// Hooks in effect for one table.
#[derive(Default)]
pub struct TableHooks {
    pub renderer: Option<Arc<dyn TableRenderer>>,
    pub graph: Option<Arc<dyn GraphHook>>,
    /// Hook files that failed to load.
    pub diagnostics: Vec<Diagnostic>,
}
