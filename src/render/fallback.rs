//! Default renderer: a plain key/value listing per record.

use super::{Pages, RenderContext, TableRenderer, record_page, table_index_path};
use crate::error::RenderError;
use crate::resolve::ResolvedRecord;
use crate::schema::Schema;
use crate::utils::html::{escape, escape_attr, title_case};
use crate::utils::slug;

#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackRenderer;

impl FallbackRenderer {
    /// `<dl>` of every non-null field. Column descriptions become tooltips.
    pub fn fields(&self, record: &ResolvedRecord, schema: Option<&Schema>) -> String {
        let mut html = String::from("<dl class=\"fields\">\n");
        for field in record.fields.iter().filter(|f| !f.value.is_null()) {
            let tooltip = schema
                .and_then(|schema| schema.column(&field.name))
                .filter(|c| !c.description.is_empty())
                .map(|c| format!(" title=\"{}\"", escape_attr(&c.description)))
                .unwrap_or_default();
            html.push_str(&format!(
                "<dt{tooltip}>{}</dt><dd class=\"field-{}\">{}</dd>\n",
                escape(&title_case(&field.name)),
                escape_attr(&field.name),
                field.value.to_html()
            ));
        }
        html.push_str("</dl>");
        html
    }

    pub fn row(&self, record: &ResolvedRecord, schema: &Schema) -> String {
        format!(
            "<div class=\"record\" id=\"{anchor}\">\n<h2><a href=\"{page}\">{label}</a></h2>\n{fields}\n</div>\n",
            anchor = escape_attr(&slug::record_anchor(&record.id)),
            page = escape_attr(&record.file_name()),
            label = escape(&record.label),
            fields = self.fields(record, Some(schema)),
        )
    }

    pub fn table_page(&self, records: &[ResolvedRecord], schema: &Schema, ctx: &RenderContext<'_>) -> String {
        let rows: String = records.iter().map(|r| self.row(r, schema)).collect();
        let description = if schema.description.is_empty() {
            String::new()
        } else {
            format!("<p>{}</p>", escape(&schema.description))
        };
        let body = format!(
            "<h1>{title}</h1>\n<div class=\"table-description\">{description}\n\
             <p class=\"count\">{count} record(s)</p>\n{graph}</div>\n\
             <div class=\"{table}-grid records\">\n{rows}</div>",
            title = escape(&schema.title),
            count = records.len(),
            graph = ctx.graph_link(),
            table = escape_attr(&schema.table_name),
        );
        ctx.page(&schema.title, &body)
    }

    /// Every page of a table. Never fails.
    pub fn pages(&self, records: &[ResolvedRecord], schema: &Schema, ctx: &RenderContext<'_>) -> Pages {
        let mut pages = Vec::with_capacity(records.len() + 1);
        pages.push((table_index_path(&schema.table_name), self.table_page(records, schema, ctx)));
        for record in records {
            let body = self.fields(record, Some(schema));
            pages.push((record.page.clone(), record_page(record, schema, &body, ctx)));
        }
        pages
    }
}

impl TableRenderer for FallbackRenderer {
    fn render_row(&self, record: &ResolvedRecord, _ctx: &RenderContext<'_>) -> Result<String, RenderError> {
        Ok(self.fields(record, None))
    }

    fn render_table_page(
        &self,
        records: &[ResolvedRecord],
        schema: &Schema,
        ctx: &RenderContext<'_>,
    ) -> Result<String, RenderError> {
        Ok(self.table_page(records, schema, ctx))
    }

    fn render_record_page(
        &self,
        record: &ResolvedRecord,
        schema: &Schema,
        ctx: &RenderContext<'_>,
    ) -> Result<String, RenderError> {
        Ok(record_page(record, schema, &self.fields(record, Some(schema)), ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::Layout;
    use crate::render::tests::{resolved, schema};

    #[test]
    fn test_row_lists_fields() {
        let html = FallbackRenderer.row(&resolved("E1", "Euler"), &schema());
        assert!(html.starts_with("<div class=\"record\" id=\"rec-E1\">"));
        assert!(html.contains("<h2><a href=\"E1.html\">Euler</a></h2>"));
        assert!(html.contains("<dt>Name</dt><dd class=\"field-name\">Euler</dd>"));
        assert!(html.contains("<dt>Born</dt><dd class=\"field-born\">1707</dd>"));
    }

    #[test]
    fn test_table_page() {
        let layout = Layout {
            site_title: "Mathematics Database".into(),
            ..Layout::default()
        };
        let ctx = RenderContext::new(&layout);
        let records = vec![resolved("E1", "Euler"), resolved("G1", "Gauss")];
        let html = FallbackRenderer.table_page(&records, &schema(), &ctx);

        assert!(html.contains("<h1>People</h1>"));
        assert!(html.contains("<p>Famous mathematicians</p>"));
        assert!(html.contains("2 record(s)"));
        assert!(html.find("rec-E1").unwrap() < html.find("rec-G1").unwrap());
    }

    #[test]
    fn test_pages_include_record_pages() {
        let layout = Layout::default();
        let ctx = RenderContext::new(&layout);
        let pages = FallbackRenderer.pages(&[resolved("E1", "Euler")], &schema(), &ctx);
        let paths: Vec<_> = pages.iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(paths, vec!["people/index.html", "people/E1.html"]);
        assert!(pages[1].1.contains("Back to People"));
    }
}
