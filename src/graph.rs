//! Graph Data Builder: node/edge data for a table's graph page.
//!
//! A table opts in by supplying a [`GraphHook`], either registered in code or
//! as a declarative `graph.json` next to its records:
//!
//! ```json
//! {
//!   "title": "Who discovered what",
//!   "node_tables": ["people", "equations"],
//!   "label_field": "name",
//!   "node_attrs": { "people": { "shape": "ellipse", "fillcolor": "#D9E1F2" } },
//!   "edges": [{ "table": "equations", "column": "author", "label": "author",
//!               "attrs": { "style": "dashed" } }],
//!   "links": [{ "source": "#people/euler", "target": "#gauss", "label": "influenced" }]
//! }
//! ```
//!
//! The builder does not interpret the graph. It only checks that node ids are
//! unique and that every edge endpoint is a node; anything else is the hook's
//! business. A failing graph skips that table's graph page and nothing else.

use crate::error::GraphError;
use crate::index::{BIB_NAMESPACE, Index, Lookup};
use crate::render::Layout;
use crate::resolve::{LinkKind, ResolvedTable};
use crate::utils::html::{escape, escape_attr};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// File name of the declarative graph hook inside a table directory.
pub const GRAPH_FILE: &str = "graph.json";

/// Output path of a table's graph page: `people_graph.html`.
pub fn graph_page_path(table: &str) -> String {
    format!("{table}_graph.html")
}

// ============================================================================
// Descriptor
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    /// Unique node id, usually `table/id`.
    pub id: String,
    pub label: String,
    /// Page of the node, relative to the site root.
    pub url: String,
    pub table: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub label: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphDescriptor {
    pub title: String,
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl GraphDescriptor {
    /// Node ids are unique and every edge endpoint is a node.
    pub fn validate(&self) -> Result<(), GraphError> {
        let mut ids = FxHashSet::default();
        for node in &self.nodes {
            if !ids.insert(node.id.as_str()) {
                return Err(GraphError::DuplicateNode(node.id.clone()));
            }
        }

        for edge in &self.edges {
            for endpoint in [&edge.source, &edge.target] {
                if !ids.contains(endpoint.as_str()) {
                    return Err(GraphError::DanglingEdge {
                        source_id: edge.source.clone(),
                        target_id: edge.target.clone(),
                        missing: endpoint.clone(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Graphviz DOT source, for external layout tools.
    pub fn to_dot(&self) -> String {
        let mut dot = String::from("digraph G {\n  rankdir=LR;\n");
        for node in &self.nodes {
            let mut attrs = vec![
                format!("label={}", dot_quote(&node.label)),
                format!("URL={}", dot_quote(&node.url)),
            ];
            if node.attrs.contains_key("fillcolor") && !node.attrs.contains_key("style") {
                attrs.push("style=filled".to_owned());
            }
            attrs.extend(node.attrs.iter().map(|(k, v)| format!("{k}={}", dot_quote(v))));
            dot.push_str(&format!("  {} [{}];\n", dot_quote(&node.id), attrs.join(", ")));
        }
        for edge in &self.edges {
            let mut attrs = Vec::new();
            if !edge.label.is_empty() {
                attrs.push(format!("label={}", dot_quote(&edge.label)));
            }
            attrs.extend(edge.attrs.iter().map(|(k, v)| format!("{k}={}", dot_quote(v))));
            dot.push_str(&format!("  {} -> {}", dot_quote(&edge.source), dot_quote(&edge.target)));
            if !attrs.is_empty() {
                dot.push_str(&format!(" [{}]", attrs.join(", ")));
            }
            dot.push_str(";\n");
        }
        dot.push_str("}\n");
        dot
    }

    pub fn to_json(&self) -> Result<String, GraphError> {
        serde_json::to_string(self).map_err(GraphError::Serialize)
    }
}

fn dot_quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

// ============================================================================
// Hooks
// ============================================================================

/// What a graph hook gets to look at.
#[derive(Debug, Clone, Copy)]
pub struct GraphInput<'a> {
    /// The table the graph page belongs to.
    pub table: &'a ResolvedTable,
    /// Every table of the site, in site order.
    pub tables: &'a [ResolvedTable],
    pub index: &'a Index,
}

impl<'a> GraphInput<'a> {
    pub fn find_table(&self, name: &str) -> Option<&'a ResolvedTable> {
        self.tables.iter().find(|t| t.name() == name)
    }
}

/// Per-table graph capability.
pub trait GraphHook: Send + Sync {
    fn generate(&self, input: &GraphInput<'_>) -> Result<GraphDescriptor, GraphError>;
}

/// Run a hook and check its output.
pub fn build_graph(hook: &dyn GraphHook, input: &GraphInput<'_>) -> Result<GraphDescriptor, GraphError> {
    let descriptor = hook.generate(input)?;
    descriptor.validate()?;
    Ok(descriptor)
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EdgeSpec {
    pub table: String,
    pub column: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub attrs: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinkSpec {
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub attrs: BTreeMap<String, String>,
}

/// Declarative graph hook read from `graph.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GraphSpec {
    #[serde(default)]
    pub title: Option<String>,
    /// Tables contributing nodes. Default: the owning table plus every table
    /// its edges reach.
    #[serde(default)]
    pub node_tables: Vec<String>,
    /// Record field used as node label. Default: the record label.
    #[serde(default)]
    pub label_field: Option<String>,
    #[serde(default)]
    pub node_attrs: BTreeMap<String, BTreeMap<String, String>>,
    /// Reference columns turned into edges. Default: every reference column
    /// of the owning table.
    #[serde(default)]
    pub edges: Option<Vec<EdgeSpec>>,
    /// Extra edges between explicit tokens.
    #[serde(default)]
    pub links: Vec<LinkSpec>,
}

impl GraphSpec {
    pub fn load(path: &Path) -> Result<Self, GraphError> {
        let content = fs::read_to_string(path).map_err(|err| GraphError::Io(path.to_path_buf(), err))?;
        serde_json::from_str(&content).map_err(|err| GraphError::Malformed(path.to_path_buf(), err))
    }

    fn node_tables<'a>(
        &self,
        input: &GraphInput<'a>,
        edges: &[GraphEdge],
    ) -> Result<Vec<&'a ResolvedTable>, GraphError> {
        if self.node_tables.is_empty() {
            let reached: FxHashSet<&str> = edges
                .iter()
                .flat_map(|edge| [edge.source.as_str(), edge.target.as_str()])
                .filter_map(|id| id.split_once('/').map(|(table, _)| table))
                .collect();
            let mut tables = vec![input.table];
            tables.extend(
                input
                    .tables
                    .iter()
                    .filter(|table| table.name() != input.table.name() && reached.contains(table.name())),
            );
            return Ok(tables);
        }
        self.node_tables
            .iter()
            .map(|name| input.find_table(name).ok_or_else(|| GraphError::UnknownTable(name.clone())))
            .collect()
    }

    fn edge_specs(&self, input: &GraphInput<'_>) -> Vec<EdgeSpec> {
        match &self.edges {
            Some(edges) => edges.clone(),
            None => input
                .table
                .schema
                .reference_columns()
                .map(|column| EdgeSpec {
                    table: input.table.name().to_owned(),
                    column: column.name.clone(),
                    label: None,
                    attrs: BTreeMap::new(),
                })
                .collect(),
        }
    }

    /// Node id of a `links` endpoint: the qualified id of what it names, or
    /// the token itself when it names nothing.
    fn endpoint(index: &Index, token: &str) -> String {
        let name = token.trim().trim_start_matches('#');
        let lookup = match name.split_once('/') {
            Some((namespace, rest)) if index.is_namespace(namespace) => index.lookup_qualified(namespace, rest),
            _ => index.lookup_bare(name),
        };
        match lookup {
            Lookup::Found(target) if target.table() != BIB_NAMESPACE => target.qualified(),
            _ => name.to_owned(),
        }
    }
}

impl GraphHook for GraphSpec {
    fn generate(&self, input: &GraphInput<'_>) -> Result<GraphDescriptor, GraphError> {
        let mut descriptor = GraphDescriptor {
            title: self
                .title
                .clone()
                .unwrap_or_else(|| format!("{} graph", input.table.schema.title)),
            ..GraphDescriptor::default()
        };

        for spec in self.edge_specs(input) {
            let table = input
                .find_table(&spec.table)
                .ok_or_else(|| GraphError::UnknownTable(spec.table.clone()))?;
            if !table.schema.column(&spec.column).is_some_and(|c| c.kind.is_reference()) {
                return Err(GraphError::UnknownColumn {
                    table: spec.table.clone(),
                    column: spec.column.clone(),
                });
            }

            for record in &table.records {
                let links = record
                    .links(&spec.column)
                    .iter()
                    .filter(|link| link.kind == LinkKind::Record);
                for link in links {
                    let Some(target) = &link.target else { continue };
                    descriptor.edges.push(GraphEdge {
                        source: format!("{}/{}", record.table, record.id),
                        target: target.clone(),
                        label: spec.label.clone().unwrap_or_else(|| spec.column.clone()),
                        attrs: spec.attrs.clone(),
                    });
                }
            }
        }

        for link in &self.links {
            descriptor.edges.push(GraphEdge {
                source: Self::endpoint(input.index, &link.source),
                target: Self::endpoint(input.index, &link.target),
                label: link.label.clone(),
                attrs: link.attrs.clone(),
            });
        }

        for table in self.node_tables(input, &descriptor.edges)? {
            let attrs = self.node_attrs.get(table.name()).cloned().unwrap_or_default();
            for record in &table.records {
                let label = self
                    .label_field
                    .as_deref()
                    .and_then(|field| record.raw(field))
                    .and_then(|value| value.as_str())
                    .map_or_else(|| record.label.clone(), str::to_owned);
                descriptor.nodes.push(GraphNode {
                    id: format!("{}/{}", record.table, record.id),
                    label,
                    url: record.page.clone(),
                    table: record.table.to_string(),
                    attrs: attrs.clone(),
                });
            }
        }

        Ok(descriptor)
    }
}

// ============================================================================
// Page
// ============================================================================

/// Render the graph page of a table. The page lives at the site root.
pub fn render_graph_page(descriptor: &GraphDescriptor, layout: &Layout) -> Result<String, GraphError> {
    let labels: BTreeMap<&str, &str> = descriptor
        .nodes
        .iter()
        .map(|n| (n.id.as_str(), n.label.as_str()))
        .collect();

    let mut body = format!(
        "<h1>{}</h1>\n<div id=\"graph\" class=\"graph-container\"></div>\n",
        escape(&descriptor.title)
    );

    body.push_str("<h2>Nodes</h2>\n<ul class=\"graph-nodes\">\n");
    for node in &descriptor.nodes {
        body.push_str(&format!(
            "<li data-node=\"{}\"><a href=\"{}\">{}</a></li>\n",
            escape_attr(&node.id),
            escape_attr(&node.url),
            escape(&node.label)
        ));
    }
    body.push_str("</ul>\n");

    if !descriptor.edges.is_empty() {
        body.push_str("<h2>Edges</h2>\n<ul class=\"graph-edges\">\n");
        for edge in &descriptor.edges {
            let source = labels.get(edge.source.as_str()).copied().unwrap_or(&edge.source);
            let target = labels.get(edge.target.as_str()).copied().unwrap_or(&edge.target);
            let label = if edge.label.is_empty() {
                String::new()
            } else {
                format!(" <span class=\"edge-label\">{}</span>", escape(&edge.label))
            };
            body.push_str(&format!(
                "<li>{} &rarr; {}{label}</li>\n",
                escape(source),
                escape(target)
            ));
        }
        body.push_str("</ul>\n");
    }

    body.push_str(&format!(
        "<script type=\"application/json\" id=\"graph-data\">{}</script>\n\
         <script type=\"text/vnd.graphviz\" id=\"graph-dot\">{}</script>\n",
        script_safe(&descriptor.to_json()?),
        script_safe(&descriptor.to_dot())
    ));

    Ok(layout.render(&descriptor.title, "", &body))
}

/// Keep embedded data from closing its `<script>` element.
fn script_safe(text: &str) -> String {
    text.replace("</", "<\\/")
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::tests::{build, fixture};
    use crate::resolve::Resolver;
    use crate::schema::Schema;
    use serde_json::json;
    use std::path::PathBuf;

    fn node(id: &str) -> GraphNode {
        GraphNode {
            id: id.into(),
            label: id.into(),
            url: format!("{id}.html"),
            table: "people".into(),
            attrs: BTreeMap::new(),
        }
    }

    fn edge(source: &str, target: &str) -> GraphEdge {
        GraphEdge {
            source: source.into(),
            target: target.into(),
            label: String::new(),
            attrs: BTreeMap::new(),
        }
    }

    /// `people` (E1, G1) and `equations` (Q1 authored by #euler) resolved.
    fn tables() -> (Index, Vec<ResolvedTable>) {
        let (_, _, bibliography) = fixture();
        let people = Schema::parse(
            r#"{ "columns": [{ "name": "name", "type": "string" }] }"#,
            "people",
            PathBuf::from("people/schema.json"),
        )
        .unwrap();
        let equations = Schema::parse(
            r#"{ "columns": [
                { "name": "name", "type": "string" },
                { "name": "author", "type": "reference", "tables": ["people"] }
            ] }"#,
            "equations",
            PathBuf::from("equations/schema.json"),
        )
        .unwrap();

        let load = |schema: &Schema, file: &str, value: serde_json::Value| {
            crate::record::Record::from_value(value, &PathBuf::from(file), schema).unwrap()
        };
        let people_records = vec![
            load(&people, "people/001_euler.json", json!({ "id": "E1", "name": "Euler" })),
            load(&people, "people/002_gauss.json", json!({ "id": "G1", "name": "Gauss" })),
        ];
        let equation_records = vec![load(
            &equations,
            "equations/001_eq.json",
            json!({ "id": "Q1", "name": "Identity", "author": "#people/euler" }),
        )];

        let schemas = vec![people, equations];
        let records = vec![people_records, equation_records];
        let index = build(&schemas, &records, &bibliography);

        let resolver = Resolver::new(&index);
        let tables = schemas
            .into_iter()
            .zip(&records)
            .map(|(schema, records)| {
                let resolved = records.iter().map(|r| resolver.resolve_record(r, &schema).0).collect();
                ResolvedTable {
                    schema,
                    records: resolved,
                }
            })
            .collect();
        (index, tables)
    }

    #[test]
    fn test_validate_dangling_edge() {
        let descriptor = GraphDescriptor {
            title: "g".into(),
            nodes: vec![node("a"), node("b")],
            edges: vec![edge("a", "b"), edge("b", "zz")],
        };
        match descriptor.validate().unwrap_err() {
            GraphError::DanglingEdge { missing, .. } => assert_eq!(missing, "zz"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_validate_duplicate_node() {
        let descriptor = GraphDescriptor {
            title: "g".into(),
            nodes: vec![node("a"), node("a")],
            edges: vec![],
        };
        assert!(matches!(descriptor.validate(), Err(GraphError::DuplicateNode(_))));
    }

    #[test]
    fn test_to_dot() {
        let mut a = node("people/E1");
        a.label = "Leonhard \"Euler\"".into();
        a.attrs.insert("fillcolor".into(), "#D9E1F2".into());
        let mut e = edge("people/E1", "people/E1");
        e.label = "self".into();
        let descriptor = GraphDescriptor {
            title: "g".into(),
            nodes: vec![a],
            edges: vec![e],
        };
        let dot = descriptor.to_dot();
        assert!(dot.starts_with("digraph G {"));
        assert!(dot.contains(
            "\"people/E1\" [label=\"Leonhard \\\"Euler\\\"\", URL=\"people/E1.html\", style=filled, fillcolor=\"#D9E1F2\"];"
        ));
        assert!(dot.contains("\"people/E1\" -> \"people/E1\" [label=\"self\"];"));
    }

    #[test]
    fn test_spec_default_edges_from_reference_columns() {
        let (index, tables) = tables();
        let spec: GraphSpec = serde_json::from_str(r#"{ "node_tables": ["people", "equations"] }"#).unwrap();
        let input = GraphInput {
            table: &tables[1],
            tables: &tables,
            index: &index,
        };

        let descriptor = build_graph(&spec, &input).unwrap();
        let ids: Vec<_> = descriptor.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["people/E1", "people/G1", "equations/Q1"]);
        assert_eq!(descriptor.edges, vec![GraphEdge {
            source: "equations/Q1".into(),
            target: "people/E1".into(),
            label: "author".into(),
            attrs: BTreeMap::new(),
        }]);
        assert_eq!(descriptor.title, "Equations graph");
    }

    #[test]
    fn test_empty_spec_includes_referenced_tables() {
        let (index, tables) = tables();
        let spec: GraphSpec = serde_json::from_str("{}").unwrap();
        let input = GraphInput {
            table: &tables[1],
            tables: &tables,
            index: &index,
        };

        let descriptor = build_graph(&spec, &input).unwrap();
        let ids: Vec<_> = descriptor.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["equations/Q1", "people/E1", "people/G1"]);
        assert_eq!(descriptor.edges.len(), 1);
        assert_eq!(descriptor.edges[0].target, "people/E1");

        // Without edges leaving it, a table graphs only itself.
        let input = GraphInput {
            table: &tables[0],
            ..input
        };
        let descriptor = build_graph(&spec, &input).unwrap();
        assert_eq!(descriptor.nodes.len(), 2);
        assert!(descriptor.edges.is_empty());
    }

    #[test]
    fn test_spec_dangling_link_fails() {
        let (index, tables) = tables();
        let spec: GraphSpec = serde_json::from_str(
            r##"{ "links": [{ "source": "#people/E1", "target": "#nobody" }], "edges": [] }"##,
        )
        .unwrap();
        let input = GraphInput {
            table: &tables[0],
            tables: &tables,
            index: &index,
        };
        let err = build_graph(&spec, &input).unwrap_err();
        assert!(matches!(err, GraphError::DanglingEdge { ref missing, .. } if missing == "nobody"));
    }

    #[test]
    fn test_spec_unknown_table_and_column() {
        let (index, tables) = tables();
        let input = GraphInput {
            table: &tables[0],
            tables: &tables,
            index: &index,
        };

        let spec: GraphSpec = serde_json::from_str(r#"{ "node_tables": ["planets"] }"#).unwrap();
        assert!(matches!(spec.generate(&input), Err(GraphError::UnknownTable(_))));

        let spec: GraphSpec =
            serde_json::from_str(r#"{ "edges": [{ "table": "equations", "column": "name" }] }"#).unwrap();
        assert!(matches!(spec.generate(&input), Err(GraphError::UnknownColumn { .. })));
    }

    #[test]
    fn test_load_malformed_spec() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(GRAPH_FILE);
        fs::write(&path, r#"{ "nodes": 3 }"#).unwrap();
        assert!(matches!(GraphSpec::load(&path), Err(GraphError::Malformed(..))));
    }

    #[test]
    fn test_render_graph_page() {
        let descriptor = GraphDescriptor {
            title: "People graph".into(),
            nodes: vec![node("people/E1"), node("people/G1")],
            edges: vec![edge("people/E1", "people/G1")],
        };
        let html = render_graph_page(&descriptor, &Layout::default()).unwrap();
        assert!(html.contains("<h1>People graph</h1>"));
        assert!(html.contains("<a href=\"people/E1.html\">people/E1</a>"));
        assert!(html.contains("people/E1 &rarr; people/G1"));
        assert!(html.contains("<script type=\"application/json\" id=\"graph-data\">{\"title\":\"People graph\""));
        assert!(html.contains("digraph G {"));
        assert_eq!(graph_page_path("people"), "people_graph.html");
    }
}
