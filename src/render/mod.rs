//! Render Dispatcher: turns resolved records into table and record pages.
//!
//! A table may supply a [`TableRenderer`] (registered in code, or a
//! `render.json` template next to its records). Tables without one, and
//! tables whose renderer fails, use [`FallbackRenderer`].
//!
//! Renderers only ever see [`ResolvedRecord`]s: every hashtag and citation
//! has been replaced by link markup before rendering starts.

pub mod fallback;
pub mod layout;
pub mod template;

pub use fallback::FallbackRenderer;
pub use layout::{Layout, NavItem};
pub use template::TemplateRenderer;

use crate::diagnostic::Diagnostic;
use crate::error::RenderError;
use crate::resolve::ResolvedRecord;
use crate::schema::Schema;
use crate::utils::html::{escape, escape_attr};
use crate::utils::slug::TABLE_PAGE;

/// Link root of pages inside a table directory.
pub const TABLE_ROOT: &str = "../";

/// Index page of a table: `people/index.html`.
pub fn table_index_path(table: &str) -> String {
    format!("{table}/{TABLE_PAGE}")
}

/// Everything a renderer may need besides the records.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    pub layout: &'a Layout,
    /// Graph page of the table relative to the site root, if one was built.
    pub graph_page: Option<&'a str>,
}

impl<'a> RenderContext<'a> {
    pub const fn new(layout: &'a Layout) -> Self {
        Self {
            layout,
            graph_page: None,
        }
    }

    pub const fn with_graph_page(mut self, graph_page: Option<&'a str>) -> Self {
        self.graph_page = graph_page;
        self
    }

    /// Wrap `body` into a document placed inside a table directory.
    pub fn page(&self, title: &str, body: &str) -> String {
        self.layout.render(title, TABLE_ROOT, body)
    }

    /// `<a class="graph-link">` to the table's graph page, or nothing.
    pub fn graph_link(&self) -> String {
        match self.graph_page {
            Some(page) => format!(
                "<a class=\"graph-link\" href=\"{TABLE_ROOT}{}\">View graph</a>",
                escape_attr(page)
            ),
            None => String::new(),
        }
    }
}

/// Per-table rendering capability.
pub trait TableRenderer: Send + Sync {
    /// HTML fragment for one record.
    fn render_row(&self, record: &ResolvedRecord, ctx: &RenderContext<'_>) -> Result<String, RenderError>;

    /// Complete document listing the whole table.
    fn render_table_page(
        &self,
        records: &[ResolvedRecord],
        schema: &Schema,
        ctx: &RenderContext<'_>,
    ) -> Result<String, RenderError>;

    /// Complete document for one record. Defaults to the row inside the
    /// standard record page.
    fn render_record_page(
        &self,
        record: &ResolvedRecord,
        schema: &Schema,
        ctx: &RenderContext<'_>,
    ) -> Result<String, RenderError> {
        let row = self.render_row(record, ctx)?;
        Ok(record_page(record, schema, &row, ctx))
    }
}

/// Standard record page around an already rendered body.
pub fn record_page(record: &ResolvedRecord, schema: &Schema, body: &str, ctx: &RenderContext<'_>) -> String {
    let content = format!(
        "<article class=\"record-page {table}-record\">\n<h1>{label}</h1>\n{body}\n\
         <p class=\"back\"><a href=\"index.html\">Back to {title}</a></p>\n</article>",
        table = escape_attr(&record.table),
        label = escape(&record.label),
        title = escape(&schema.title),
    );
    ctx.page(&record.label, &content)
}

/// Pages of one table: `(path relative to the site root, html)`.
pub type Pages = Vec<(String, String)>;

/// Render a table's index page and record pages with one renderer.
pub fn render_table(
    renderer: &dyn TableRenderer,
    records: &[ResolvedRecord],
    schema: &Schema,
    ctx: &RenderContext<'_>,
) -> Result<Pages, RenderError> {
    let mut pages = Vec::with_capacity(records.len() + 1);
    pages.push((
        table_index_path(&schema.table_name),
        renderer.render_table_page(records, schema, ctx)?,
    ));
    for record in records {
        pages.push((record.page.clone(), renderer.render_record_page(record, schema, ctx)?));
    }
    Ok(pages)
}

/// Output of [`dispatch`].
#[derive(Debug)]
pub struct Rendered {
    pub pages: Pages,
    /// Why the table's own renderer was abandoned, if it was.
    pub diagnostic: Option<Diagnostic>,
}

impl Rendered {
    pub const fn used_fallback(&self) -> bool {
        self.diagnostic.is_some()
    }
}

/// Render a table with its hook, falling back on any failure.
///
/// A failing hook never leaves half of its pages behind: the whole table is
/// re-rendered by the fallback.
pub fn dispatch(
    hook: Option<&dyn TableRenderer>,
    records: &[ResolvedRecord],
    schema: &Schema,
    ctx: &RenderContext<'_>,
) -> Rendered {
    let diagnostic = match hook.map(|hook| render_table(hook, records, schema, ctx)) {
        Some(Ok(pages)) => return Rendered { pages, diagnostic: None },
        Some(Err(err)) => Some(Diagnostic::render(&schema.table_name, &err).with_source(&schema.path)),
        None => None,
    };

    Rendered {
        pages: FallbackRenderer.pages(records, schema, ctx),
        diagnostic,
    }
}
