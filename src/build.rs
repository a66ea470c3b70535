//! Site building orchestration.
//!
//! ```text
//! build_site()
//!     │
//!     ├── generate()
//!     │       ├── discover tables, load schemas          (fatal on error)
//!     │       ├── load records per table        [rayon]  (duplicate ids abort)
//!     │       ├── load bibliography                      (fatal on error)
//!     │       ├── Index::build                           (immutable from here)
//!     │       ├── resolve records per table     [rayon]
//!     │       ├── graph + render per table      [rayon]  (fallback on failure)
//!     │       └── index, bibliography and stylesheet pages
//!     │
//!     ├── fatal diagnostics? ──► summary, fail, output untouched
//!     │
//!     └── assemble() ──► staged write + swap
//! ```
//!
//! Per-table work runs in parallel but is merged in table order, so pages and
//! the diagnostic summary are the same on every run.

use crate::{
    assemble::assemble,
    bibliography::{self, BIBLIOGRAPHY_PAGE, BibliographyEntry},
    config::SiteConfig,
    diagnostic::{Diagnostic, Diagnostics},
    error::{RecordError, SchemaError},
    graph::{GraphInput, build_graph, graph_page_path, render_graph_page},
    hooks::{HookRegistry, TableHooks},
    index::{BIB_NAMESPACE, Index},
    log,
    record::{self, TableLoad},
    render::{Layout, NavItem, RenderContext, dispatch, table_index_path},
    resolve::{ResolvedTable, Resolver},
    schema::{SCHEMA_FILE, Schema},
    utils::{html::escape, html::escape_attr, minify::minify_html},
};
use anyhow::{Context, Result, anyhow, bail};
use rayon::prelude::*;
use rustc_hash::FxHashSet;
use std::{collections::BTreeMap, fs};

/// Stylesheet shipped with every site.
const STYLESHEET: &str = include_str!("../assets/styles.css");
const STYLESHEET_PAGE: &str = "styles.css";

/// One published table, as listed on the index page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSummary {
    pub name: String,
    pub title: String,
    pub description: String,
    pub records: usize,
    pub graph_page: Option<String>,
}

/// Everything a run produced, written or not.
#[derive(Debug, Default)]
pub struct BuildReport {
    /// Site-relative path → content.
    pub pages: BTreeMap<String, String>,
    pub tables: Vec<TableSummary>,
    pub diagnostics: Diagnostics,
    /// Whether the output directory was replaced.
    pub written: bool,
}

/// Build the site and write it to `config.build.output_dir`.
///
/// Fails without touching the output directory when the run has any fatal
/// diagnostic (any diagnostic at all in strict mode). With `check` set, the
/// output directory is never touched.
pub fn build_site(config: &SiteConfig, hooks: &HookRegistry) -> Result<BuildReport> {
    let mut report = generate(config, hooks)?;
    let strict = config.site.strict;

    report.diagnostics.print_summary(strict);

    if report.diagnostics.has_fatal(strict) {
        let fatal = report.diagnostics.iter().filter(|d| d.is_fatal(strict)).count();
        bail!(
            "build failed with {fatal} fatal diagnostic(s); `{}` left untouched",
            config.build.output_dir.display()
        );
    }

    if config.build.check {
        log!("done"; "check passed, {} pages not written", report.pages.len());
        return Ok(report);
    }

    let output = &config.build.output_dir;
    assemble(output, &report.pages, &config.static_dirs())
        .with_context(|| format!("failed to write site to `{}`", output.display()))?;
    report.written = true;

    log!("done"; "{} pages written to {}", report.pages.len(), output.display());
    Ok(report)
}

/// Run the pipeline in memory.
///
/// Structural problems (schema, duplicate ids, bibliography) are returned as
/// errors. Everything else ends up in the report's diagnostics.
pub fn generate(config: &SiteConfig, hooks: &HookRegistry) -> Result<BuildReport> {
    let data_dir = &config.build.data_dir;
    let mut diagnostics = Diagnostics::new();

    // ========================================================================
    // Schemas and records
    // ========================================================================

    let names = discover_tables(config)?;
    let schemas = names
        .par_iter()
        .map(|name| {
            Schema::load(&data_dir.join(name)).with_context(|| format!("failed to load table `{name}`"))
        })
        .collect::<Result<Vec<_>>>()?;
    check_reference_targets(&schemas)?;
    log!("schema"; "{} table(s): {}", schemas.len(), names.join(", "));

    let loads: Vec<TableLoad> = schemas
        .par_iter()
        .map(|schema| record::load_all(&data_dir.join(schema.table_name.as_str()), schema))
        .collect();
    for (schema, load) in schemas.iter().zip(&loads) {
        log!("records"; "{}: {} record(s)", schema.table_name, load.records.len());
    }
    abort_on_duplicate_ids(&loads)?;

    let bibliography = load_bibliography(config)?;

    // ========================================================================
    // Index and resolution
    // ========================================================================

    let index = Index::build(
        schemas.iter().zip(loads.iter().map(|load| load.records.as_slice())),
        &bibliography,
    );
    log!("index"; "{} target(s)", index.len());

    let resolver = Resolver::new(&index).with_link_root(config.link_root());
    let resolved: Vec<(ResolvedTable, Vec<Diagnostic>)> = schemas
        .into_par_iter()
        .zip(&loads)
        .map(|(schema, load)| {
            let mut found: Vec<Diagnostic> = load.errors.iter().map(Diagnostic::record).collect();
            let records = load
                .records
                .iter()
                .map(|record| {
                    let (resolved, record_diagnostics) = resolver.resolve_record(record, &schema);
                    found.extend(record_diagnostics);
                    resolved
                })
                .collect();
            (ResolvedTable { schema, records }, found)
        })
        .collect();

    let mut tables = Vec::with_capacity(resolved.len());
    for (table, found) in resolved {
        diagnostics.extend(found);
        tables.push(table);
    }

    // ========================================================================
    // Graphs and rendering
    // ========================================================================

    let layout = layout(config, &tables);

    let outputs: Vec<TableOutput> = tables
        .par_iter()
        .map(|table| {
            let table_hooks = hooks.resolve(&table.schema, &data_dir.join(table.name()));
            render_table(table, &tables, &index, table_hooks, &layout)
        })
        .collect();

    let mut pages = BTreeMap::new();
    let mut summaries = Vec::with_capacity(tables.len());
    for (table, output) in tables.iter().zip(outputs) {
        diagnostics.extend(output.diagnostics);
        for (path, html) in output.pages {
            pages.insert(path, html);
        }
        summaries.push(TableSummary {
            name: table.name().to_owned(),
            title: table.schema.title.clone(),
            description: table.schema.description.clone(),
            records: table.records.len(),
            graph_page: output.graph_page,
        });
    }
    log!("render"; "{} table page(s) and record page(s)", pages.len());

    // ========================================================================
    // Site pages
    // ========================================================================

    if let Some(bib) = &config.site.bibliography {
        pages.insert(
            BIBLIOGRAPHY_PAGE.to_owned(),
            bibliography::render_page(&bibliography, &bib.title, &layout),
        );
    }
    pages.insert("index.html".to_owned(), index_page(config, &layout, &summaries));

    let minify = config.site.minify;
    let mut pages: BTreeMap<String, String> = pages
        .into_par_iter()
        .map(|(path, html)| {
            let html = minify_html(&html, minify).into_owned();
            (path, html)
        })
        .collect();
    pages.insert(STYLESHEET_PAGE.to_owned(), STYLESHEET.to_owned());

    Ok(BuildReport {
        pages,
        tables: summaries,
        diagnostics,
        written: false,
    })
}

// ============================================================================
// Loading
// ============================================================================

/// Table names in publication order.
///
/// `main.json`'s `tables` list wins; otherwise every subdirectory holding a
/// `schema.json`, sorted by name.
fn discover_tables(config: &SiteConfig) -> Result<Vec<String>> {
    let names = match &config.site.tables {
        Some(tables) => tables.clone(),
        None => {
            let data_dir = &config.build.data_dir;
            let entries = fs::read_dir(data_dir)
                .with_context(|| format!("failed to read data directory `{}`", data_dir.display()))?;
            let mut names: Vec<String> = entries
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.path())
                .filter(|path| path.join(SCHEMA_FILE).is_file())
                .filter_map(|path| path.file_name().map(|name| name.to_string_lossy().into_owned()))
                .collect();
            names.sort();
            names
        }
    };

    let mut seen = FxHashSet::default();
    for name in &names {
        if name == BIB_NAMESPACE {
            bail!(SchemaError::ReservedName(name.clone()));
        }
        if !seen.insert(name.as_str()) {
            bail!(SchemaError::DuplicateTable(name.clone()));
        }
    }

    Ok(names)
}

/// Restricted reference columns may only name published tables.
fn check_reference_targets(schemas: &[Schema]) -> Result<()> {
    let known: FxHashSet<&str> = schemas.iter().map(|s| s.table_name.as_str()).collect();
    for schema in schemas {
        for column in schema.reference_columns() {
            let Some(spec) = column.reference() else { continue };
            if let Some(target) = spec.tables.iter().find(|t| !known.contains(t.as_str())) {
                bail!(SchemaError::UnknownTable {
                    table: schema.table_name.to_string(),
                    column: column.name.clone(),
                    target: target.to_string(),
                });
            }
        }
    }
    Ok(())
}

/// Duplicate ids would make the index lie; nothing is resolved past them.
fn abort_on_duplicate_ids(loads: &[TableLoad]) -> Result<()> {
    if !loads.iter().any(TableLoad::has_duplicate_ids) {
        return Ok(());
    }

    let duplicates: Vec<&RecordError> = loads
        .iter()
        .flat_map(|load| load.errors.iter())
        .filter(|err| err.is_duplicate_id())
        .collect();

    let Some(first) = duplicates.first() else {
        return Ok(());
    };
    for err in &duplicates {
        log!("error"; "{}", Diagnostic::record(err));
    }
    Err(anyhow!("{} duplicate id(s), first: {first}", duplicates.len()))
}

fn load_bibliography(config: &SiteConfig) -> Result<Vec<BibliographyEntry>> {
    let Some(path) = config.bibliography_path() else {
        return Ok(Vec::new());
    };
    let entries = bibliography::load(&path)
        .with_context(|| format!("failed to load bibliography `{}`", path.display()))?;
    log!("bib"; "{} entr(ies)", entries.len());
    Ok(entries)
}

// ============================================================================
// Rendering
// ============================================================================

struct TableOutput {
    pages: Vec<(String, String)>,
    graph_page: Option<String>,
    diagnostics: Vec<Diagnostic>,
}

fn render_table(
    table: &ResolvedTable,
    tables: &[ResolvedTable],
    index: &Index,
    hooks: TableHooks,
    layout: &Layout,
) -> TableOutput {
    let name = table.name();
    let mut diagnostics = hooks.diagnostics;
    let mut pages = Vec::new();
    let mut graph_page = None;

    if let Some(hook) = &hooks.graph {
        let input = GraphInput { table, tables, index };
        match build_graph(hook.as_ref(), &input).and_then(|d| render_graph_page(&d, layout)) {
            Ok(html) => {
                let path = graph_page_path(name);
                pages.push((path.clone(), html));
                graph_page = Some(path);
            }
            Err(err) => diagnostics.push(Diagnostic::graph(name, &err).with_source(&table.schema.path)),
        }
    }

    let ctx = RenderContext::new(layout).with_graph_page(graph_page.as_deref());
    let rendered = dispatch(hooks.renderer.as_deref(), &table.records, &table.schema, &ctx);
    diagnostics.extend(rendered.diagnostic);
    pages.extend(rendered.pages);

    TableOutput {
        pages,
        graph_page,
        diagnostics,
    }
}

fn layout(config: &SiteConfig, tables: &[ResolvedTable]) -> Layout {
    let mut nav: Vec<NavItem> = tables
        .iter()
        .map(|t| NavItem::new(t.schema.title.clone(), table_index_path(t.name())))
        .collect();
    if let Some(bib) = &config.site.bibliography {
        nav.push(NavItem::new(bib.title.clone(), BIBLIOGRAPHY_PAGE));
    }

    Layout {
        site_title: config.site.title.clone(),
        subtitle: config.site.subtitle.clone(),
        footer: config.site.footer.clone(),
        nav,
    }
}

/// Site root page: one card per table, then the bibliography.
fn index_page(config: &SiteConfig, layout: &Layout, tables: &[TableSummary]) -> String {
    let site = &config.site;
    let mut body = format!("<h1>{}</h1>\n", escape(site.header()));
    if !site.description.is_empty() {
        body.push_str(&format!("<div class=\"intro\"><p>{}</p></div>\n", escape(&site.description)));
    }

    body.push_str("<div class=\"tables-grid\">\n");
    for table in tables {
        let graph = table
            .graph_page
            .as_deref()
            .map(|page| format!("<p><a class=\"graph-link\" href=\"{}\">View graph</a></p>\n", escape_attr(page)))
            .unwrap_or_default();
        let description = if table.description.is_empty() {
            format!("{} data", table.title)
        } else {
            table.description.clone()
        };
        body.push_str(&format!(
            "<div class=\"table-card\">\n<h3><a href=\"{href}\">{title}</a></h3>\n<p>{description}</p>\n\
             <p class=\"record-count\">{count} records</p>\n{graph}</div>\n",
            href = escape_attr(&table_index_path(&table.name)),
            title = escape(&table.title),
            description = escape(&description),
            count = table.records,
        ));
    }
    if let Some(bib) = &site.bibliography {
        body.push_str(&format!(
            "<div class=\"table-card\">\n<h3><a href=\"{BIBLIOGRAPHY_PAGE}\">{}</a></h3>\n</div>\n",
            escape(&bib.title)
        ));
    }
    body.push_str("</div>\n");

    body.push_str(&format!(
        "<p class=\"generated\">Generated on {}</p>\n",
        chrono::Local::now().format("%Y-%m-%d")
    ));

    layout.render(&site.title, "", &body)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use crate::diagnostic::{DiagnosticKind, Severity};
    use crate::error::RenderError;
    use crate::render::TableRenderer;
    use crate::resolve::ResolvedRecord;
    use std::path::PathBuf;
    use tempfile::TempDir;

    const PEOPLE_SCHEMA: &str = r#"{
        "title": "Mathematicians",
        "description": "People behind the equations",
        "display_field": "name",
        "columns": [
            { "name": "name", "type": "string", "required": true },
            { "name": "born", "type": "integer" },
            { "name": "bio", "type": "text" }
        ]
    }"#;

    const EQUATIONS_SCHEMA: &str = r#"{
        "columns": [
            { "name": "name", "type": "string", "required": true },
            { "name": "statement", "type": "latex" },
            { "name": "author", "type": "reference", "tables": ["people"] }
        ]
    }"#;

    const BIB: &str = "@book{gauss1801,\n  author = {Carl Friedrich Gauss},\n  title = {Disquisitiones Arithmeticae},\n  year = 1801\n}\n";

    struct Dataset {
        dir: TempDir,
    }

    impl Dataset {
        fn new() -> Self {
            let dataset = Self {
                dir: tempfile::tempdir().unwrap(),
            };
            dataset.write("main.json", r#"{ "title": "Math DB", "bibliography": { "bibfile": "refs.bib" } }"#);
            dataset.write("refs.bib", BIB);
            dataset.write("people/schema.json", PEOPLE_SCHEMA);
            dataset.write("people/001_euler.json", r#"{ "id": "E1", "name": "Leonhard Euler", "born": 1707 }"#);
            dataset.write(
                "people/002_gauss.json",
                r#"{ "id": "G1", "name": "Carl Friedrich Gauss", "bio": "Student of nobody in particular, see \\cite{gauss1801}" }"#,
            );
            dataset.write("equations/schema.json", EQUATIONS_SCHEMA);
            dataset.write(
                "equations/001_identity.json",
                r##"{ "id": "Q1", "name": "Euler's identity", "statement": "$e^{i\\pi}+1=0$ by #euler", "author": "#euler" }"##,
            );
            dataset
        }

        fn data(&self) -> PathBuf {
            self.dir.path().join("data")
        }

        fn output(&self) -> PathBuf {
            self.dir.path().join("site")
        }

        fn write(&self, path: &str, content: &str) {
            let path = self.data().join(path);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }

        fn config_with(&self, edit: impl FnOnce(&mut Cli)) -> SiteConfig {
            let mut cli = Cli {
                data_dir: self.data(),
                output_dir: Some(self.output()),
                ..Cli::default()
            };
            edit(&mut cli);
            SiteConfig::load(&cli).unwrap()
        }

        fn config(&self) -> SiteConfig {
            self.config_with(|_| {})
        }

        fn generate(&self) -> BuildReport {
            generate(&self.config(), &HookRegistry::new()).unwrap()
        }
    }

    struct Broken;

    impl TableRenderer for Broken {
        fn render_row(&self, _: &ResolvedRecord, _: &RenderContext<'_>) -> Result<String, RenderError> {
            Err(RenderError::Custom("no rows today".into()))
        }

        fn render_table_page(
            &self,
            records: &[ResolvedRecord],
            _: &Schema,
            ctx: &RenderContext<'_>,
        ) -> Result<String, RenderError> {
            let rows = records
                .iter()
                .map(|r| self.render_row(r, ctx))
                .collect::<Result<String, _>>()?;
            Ok(ctx.page("broken", &rows))
        }
    }

    #[test]
    fn test_build_end_to_end() {
        let dataset = Dataset::new();
        let report = build_site(&dataset.config(), &HookRegistry::new()).unwrap();
        assert!(report.written);
        assert!(report.diagnostics.is_empty(), "{:?}", report.diagnostics);

        let output = dataset.output();
        for page in [
            "index.html",
            "styles.css",
            "bibliography.html",
            "people/index.html",
            "people/E1.html",
            "people/G1.html",
            "equations/index.html",
            "equations/Q1.html",
        ] {
            assert!(output.join(page).is_file(), "missing {page}");
        }

        let equation = fs::read_to_string(output.join("equations/Q1.html")).unwrap();
        assert!(equation.contains(
            "by <a class=\"xref\" href=\"../people/E1.html\" data-ref=\"people/E1\">Leonhard Euler</a>"
        ));

        let gauss = fs::read_to_string(output.join("people/G1.html")).unwrap();
        assert!(gauss.contains("href=\"../bibliography.html#bib-gauss1801\""));

        let bibliography = fs::read_to_string(output.join("bibliography.html")).unwrap();
        assert!(bibliography.contains("id=\"bib-gauss1801\""));
        assert!(bibliography.contains("Disquisitiones Arithmeticae"));

        let index = fs::read_to_string(output.join("index.html")).unwrap();
        assert!(index.contains("<a href=\"people/index.html\">Mathematicians</a>"));
        assert!(index.contains("People behind the equations"));
        assert!(index.contains("2 records"));
        assert!(index.find("equations/index.html").unwrap() < index.find("people/index.html\">Math").unwrap());
    }

    #[test]
    fn test_table_order_from_main_json() {
        let dataset = Dataset::new();
        dataset.write("main.json", r#"{ "tables": ["people", "equations"] }"#);
        let report = dataset.generate();
        let names: Vec<_> = report.tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["people", "equations"]);
        assert!(!report.pages.contains_key(BIBLIOGRAPHY_PAGE));
    }

    #[test]
    fn test_missing_citation_warns_but_succeeds() {
        let dataset = Dataset::new();
        dataset.write("people/003_noether.json", r#"{ "id": "N1", "name": "Emmy Noether", "bio": "\\cite{missing}" }"#);

        let report = build_site(&dataset.config(), &HookRegistry::new()).unwrap();
        assert_eq!(report.diagnostics.count(DiagnosticKind::UnresolvedReference), 1);
        let noether = fs::read_to_string(dataset.output().join("people/N1.html")).unwrap();
        assert!(noether.contains("\\cite{missing}"));
    }

    #[test]
    fn test_strict_mode_fails_on_warning() {
        let dataset = Dataset::new();
        dataset.write("people/003_noether.json", r##"{ "id": "N1", "name": "Emmy Noether", "bio": "#nobody" }"##);

        let config = dataset.config_with(|cli| cli.strict = true);
        assert!(build_site(&config, &HookRegistry::new()).is_err());
        assert!(!dataset.output().exists());
    }

    #[test]
    fn test_ambiguous_reference_reported() {
        let dataset = Dataset::new();
        dataset.write("equations/002_gauss.json", r#"{ "id": "Q2", "name": "Gauss's law", "statement": "see #gauss" }"#);

        let report = dataset.generate();
        assert_eq!(report.diagnostics.count(DiagnosticKind::AmbiguousReference), 1);
        let page = &report.pages["equations/Q2.html"];
        assert!(page.contains("class=\"xref-ambiguous\""));
        assert!(page.contains("data-candidates=\"equations/Q2 people/G1\""));
    }

    #[test]
    fn test_restricted_reference_is_field_error() {
        let dataset = Dataset::new();
        dataset.write(
            "equations/002_self.json",
            r##"{ "id": "Q2", "name": "Self reference", "author": "#equations/Q1" }"##,
        );

        let report = dataset.generate();
        let field: Vec<_> = report
            .diagnostics
            .iter()
            .filter(|d| d.kind == DiagnosticKind::Field)
            .collect();
        assert_eq!(field.len(), 1);
        assert_eq!(field[0].severity, Severity::Error);
        assert!(field[0].source.as_ref().unwrap().ends_with("002_self.json"));
        assert!(!report.diagnostics.has_fatal(false));
    }

    #[test]
    fn test_malformed_record_is_fatal_and_keeps_previous_output() {
        let dataset = Dataset::new();
        fs::create_dir_all(dataset.output()).unwrap();
        fs::write(dataset.output().join("index.html"), "old").unwrap();
        dataset.write("people/003_broken.json", "{ not json");

        // The rest of the pipeline still runs for reporting.
        let report = dataset.generate();
        assert_eq!(report.diagnostics.count(DiagnosticKind::Record), 1);
        assert!(report.pages.contains_key("people/G1.html"));

        assert!(build_site(&dataset.config(), &HookRegistry::new()).is_err());
        assert_eq!(fs::read_to_string(dataset.output().join("index.html")).unwrap(), "old");
    }

    #[test]
    fn test_record_page_collisions_are_fatal() {
        let dataset = Dataset::new();
        dataset.write("people/003_index.json", r#"{ "id": "index", "name": "Index theorem" }"#);
        dataset.write("people/004_e1.json", r#"{ "id": "e1", "name": "Lowercase Euler" }"#);

        let report = dataset.generate();
        assert_eq!(report.diagnostics.count(DiagnosticKind::Record), 2);
        assert!(report.diagnostics.has_fatal(false));
        assert!(report.pages["people/index.html"].contains("Leonhard Euler"));

        assert!(build_site(&dataset.config(), &HookRegistry::new()).is_err());
        assert!(!dataset.output().exists());
    }

    #[test]
    fn test_duplicate_ids_abort() {
        let dataset = Dataset::new();
        dataset.write("people/003_euler2.json", r#"{ "id": "E1", "name": "Another Euler" }"#);

        let err = generate(&dataset.config(), &HookRegistry::new()).unwrap_err();
        assert!(format!("{err:#}").contains("duplicate id `E1` in table `people`"));
    }

    #[test]
    fn test_schema_errors_abort() {
        let dataset = Dataset::new();
        dataset.write(
            "equations/schema.json",
            r#"{ "columns": [{ "name": "author", "type": "reference", "tables": ["planets"] }] }"#,
        );
        let err = generate(&dataset.config(), &HookRegistry::new()).unwrap_err();
        assert!(matches!(err.downcast_ref::<SchemaError>(), Some(SchemaError::UnknownTable { .. })));

        let dataset = Dataset::new();
        dataset.write("bib/schema.json", r#"{ "columns": [] }"#);
        let err = generate(&dataset.config(), &HookRegistry::new()).unwrap_err();
        assert!(matches!(err.downcast_ref::<SchemaError>(), Some(SchemaError::ReservedName(_))));
    }

    #[test]
    fn test_malformed_bibliography_aborts() {
        let dataset = Dataset::new();
        dataset.write("refs.bib", "@book{gauss1801, title = {unclosed");
        assert!(generate(&dataset.config(), &HookRegistry::new()).is_err());
    }

    #[test]
    fn test_dangling_graph_only_skips_that_graph() {
        let dataset = Dataset::new();
        dataset.write("people/graph.json", r##"{ "links": [{ "source": "#E1", "target": "#nobody" }] }"##);
        dataset.write("equations/graph.json", "{}");

        let report = dataset.generate();
        assert_eq!(report.diagnostics.count(DiagnosticKind::Graph), 1);
        assert!(!report.pages.contains_key("people_graph.html"));
        assert!(report.pages.contains_key("people/index.html"));

        let graph = &report.pages["equations_graph.html"];
        assert!(graph.contains("\"source\":\"equations/Q1\",\"target\":\"people/E1\""));
        assert!(report.pages["equations/index.html"].contains("href=\"../equations_graph.html\""));
        assert!(report.pages["index.html"].contains("href=\"equations_graph.html\""));
    }

    #[test]
    fn test_render_failure_falls_back() {
        let dataset = Dataset::new();
        let mut hooks = HookRegistry::new();
        hooks.register_renderer("people", Broken);

        let report = generate(&dataset.config(), &hooks).unwrap();
        assert_eq!(report.diagnostics.count(DiagnosticKind::Render), 1);
        assert!(report.pages["people/index.html"].contains("<dl class=\"fields\">"));
        assert!(report.pages.contains_key("people/E1.html"));
    }

    #[test]
    fn test_render_template_hook() {
        let dataset = Dataset::new();
        dataset.write("people/render.json", r#"{ "row": "<p class=\"person\">{{label}} ({{born}})</p>" }"#);

        let report = dataset.generate();
        assert!(report.diagnostics.is_empty());
        assert!(report.pages["people/index.html"].contains("<p class=\"person\">Leonhard Euler (1707)</p>"));
    }

    #[test]
    fn test_check_mode_writes_nothing() {
        let dataset = Dataset::new();
        let config = dataset.config_with(|cli| cli.check = true);
        let report = build_site(&config, &HookRegistry::new()).unwrap();
        assert!(!report.written);
        assert!(!report.pages.is_empty());
        assert!(!dataset.output().exists());
    }

    #[test]
    fn test_static_dir_and_minify() {
        let dataset = Dataset::new();
        dataset.write("static/logo.svg", "<svg/>");
        let config = dataset.config_with(|cli| cli.minify = Some(true));
        build_site(&config, &HookRegistry::new()).unwrap();

        assert_eq!(fs::read_to_string(dataset.output().join("logo.svg")).unwrap(), "<svg/>");
        let index = fs::read_to_string(dataset.output().join("index.html")).unwrap();
        assert!(!index.contains("\n<main>\n"));
    }
}
