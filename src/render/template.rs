//! `render.json`: per-table HTML templates with `{{placeholder}}` slots.
//!
//! ```json
//! {
//!   "row": "<div class=\"card\"><a href=\"{{url}}\">{{label}}</a> {{equation}}</div>",
//!   "page": "<h1>{{title}}</h1><p>{{description}}</p>{{graph_link}}<div>{{rows}}</div>",
//!   "record": "<div class=\"formula\">{{equation}}</div><p>{{author}}</p>"
//! }
//! ```
//!
//! | Template | Placeholders                                                     |
//! |----------|------------------------------------------------------------------|
//! | `row`    | any schema column, `id`, `short_name`, `label`, `url`, `table`   |
//! | `record` | same as `row`                                                    |
//! | `page`   | `rows`, `title`, `description`, `count`, `graph_link`, `table`   |
//!
//! Placeholders are checked when the file is loaded; an unknown one makes the
//! whole hook unusable and the table falls back to the default renderer.

use super::{RenderContext, TableRenderer, record_page};
use crate::error::RenderError;
use crate::resolve::ResolvedRecord;
use crate::schema::Schema;
use crate::utils::html::{escape, escape_attr};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// File name of the template hook inside a table directory.
pub const RENDER_FILE: &str = "render.json";

const ROW_BUILTINS: &[&str] = &["id", "short_name", "label", "url", "table"];
const PAGE_BUILTINS: &[&str] = &["rows", "title", "description", "count", "graph_link", "table"];

const DEFAULT_PAGE: &str = "<h1>{{title}}</h1>\n<div class=\"table-description\"><p>{{description}}</p>\n\
<p class=\"count\">{{count}} record(s)</p>\n{{graph_link}}</div>\n<div class=\"{{table}}-grid records\">\n{{rows}}</div>";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TemplateFile {
    row: String,
    #[serde(default)]
    page: Option<String>,
    #[serde(default)]
    record: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Literal(String),
    Placeholder(String),
}

/// A parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Template {
    name: &'static str,
    parts: Vec<Part>,
}

impl Template {
    fn parse(name: &'static str, source: &str) -> Result<Self, RenderError> {
        let mut parts = Vec::new();
        let mut rest = source;

        while let Some(open) = rest.find("{{") {
            if open > 0 {
                parts.push(Part::Literal(rest[..open].to_owned()));
            }
            let after = &rest[open + 2..];
            let close = after.find("}}").ok_or(RenderError::Unclosed { template: name })?;
            parts.push(Part::Placeholder(after[..close].trim().to_owned()));
            rest = &after[close + 2..];
        }
        if !rest.is_empty() {
            parts.push(Part::Literal(rest.to_owned()));
        }

        Ok(Self { name, parts })
    }

    fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().filter_map(|part| match part {
            Part::Placeholder(name) => Some(name.as_str()),
            Part::Literal(_) => None,
        })
    }

    /// Reject placeholders not accepted by `known`.
    fn check(&self, known: impl Fn(&str) -> bool) -> Result<(), RenderError> {
        match self.placeholders().find(|name| !known(name)) {
            Some(name) => Err(RenderError::UnknownPlaceholder {
                template: self.name,
                name: name.to_owned(),
            }),
            None => Ok(()),
        }
    }

    fn fill(&self, value: impl Fn(&str) -> Option<String>) -> Result<String, RenderError> {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                Part::Literal(text) => out.push_str(text),
                Part::Placeholder(name) => {
                    let filled = value(name).ok_or_else(|| RenderError::UnknownPlaceholder {
                        template: self.name,
                        name: name.clone(),
                    })?;
                    out.push_str(&filled);
                }
            }
        }
        Ok(out)
    }
}

/// Renderer driven by a table's `render.json`.
#[derive(Debug, Clone)]
pub struct TemplateRenderer {
    row: Template,
    page: Template,
    record: Option<Template>,
    columns: Vec<String>,
    source: PathBuf,
}

impl TemplateRenderer {
    pub fn load(path: &Path, schema: &Schema) -> Result<Self, RenderError> {
        let content = fs::read_to_string(path).map_err(|err| RenderError::Io(path.to_path_buf(), err))?;
        Self::parse(&content, path, schema)
    }

    pub fn parse(content: &str, path: &Path, schema: &Schema) -> Result<Self, RenderError> {
        let file: TemplateFile =
            serde_json::from_str(content).map_err(|err| RenderError::Malformed(path.to_path_buf(), err))?;

        let columns: Vec<String> = schema.columns.iter().map(|c| c.name.clone()).collect();
        let is_row_slot = |name: &str| ROW_BUILTINS.contains(&name) || columns.iter().any(|c| c == name);

        let row = Template::parse("row", &file.row)?;
        row.check(is_row_slot)?;

        let page = Template::parse("page", file.page.as_deref().unwrap_or(DEFAULT_PAGE))?;
        page.check(|name| PAGE_BUILTINS.contains(&name))?;

        let record = file
            .record
            .as_deref()
            .map(|source| Template::parse("record", source))
            .transpose()?;
        if let Some(record) = &record {
            record.check(is_row_slot)?;
        }

        Ok(Self {
            row,
            page,
            record,
            columns,
            source: path.to_path_buf(),
        })
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    fn fill_record(&self, template: &Template, record: &ResolvedRecord) -> Result<String, RenderError> {
        template.fill(|name| match name {
            "id" => Some(escape(&record.id)),
            "short_name" => Some(escape(&record.short_name)),
            "label" => Some(escape(&record.label)),
            "url" => Some(escape_attr(&record.file_name())),
            "table" => Some(escape(&record.table)),
            column if self.columns.iter().any(|c| c == column) => {
                Some(record.html(column).unwrap_or_default())
            }
            _ => None,
        })
    }
}

impl TableRenderer for TemplateRenderer {
    fn render_row(&self, record: &ResolvedRecord, _ctx: &RenderContext<'_>) -> Result<String, RenderError> {
        self.fill_record(&self.row, record)
    }

    fn render_table_page(
        &self,
        records: &[ResolvedRecord],
        schema: &Schema,
        ctx: &RenderContext<'_>,
    ) -> Result<String, RenderError> {
        let rows = records
            .iter()
            .map(|record| self.render_row(record, ctx))
            .collect::<Result<Vec<_>, _>>()?
            .join("\n");

        let body = self.page.fill(|name| match name {
            "rows" => Some(rows.clone()),
            "title" => Some(escape(&schema.title)),
            "description" => Some(escape(&schema.description)),
            "count" => Some(records.len().to_string()),
            "graph_link" => Some(ctx.graph_link()),
            "table" => Some(escape(&schema.table_name)),
            _ => None,
        })?;

        if is_document(&body) {
            Ok(body)
        } else {
            Ok(ctx.page(&schema.title, &body))
        }
    }

    fn render_record_page(
        &self,
        record: &ResolvedRecord,
        schema: &Schema,
        ctx: &RenderContext<'_>,
    ) -> Result<String, RenderError> {
        let template = self.record.as_ref().unwrap_or(&self.row);
        let body = self.fill_record(template, record)?;
        Ok(record_page(record, schema, &body, ctx))
    }
}

fn is_document(html: &str) -> bool {
    let head: String = html.trim_start().chars().take(9).collect::<String>().to_ascii_lowercase();
    head.starts_with("<!doctype") || head.starts_with("<html")
}
