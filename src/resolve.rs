//! Reference Resolver: rewrites hashtags and citations into links.
//!
//! # Grammar
//!
//! | Token              | Meaning                                       |
//! |--------------------|-----------------------------------------------|
//! | `#euler`, `#E1`    | bare short name or id                         |
//! | `#people/euler`    | table-qualified short name or id              |
//! | `#bib/gauss1801`   | bibliography entry                            |
//! | `\cite{a,b}`       | one or more bibliography entries              |
//!
//! A token run is `[A-Za-z0-9_-]`. A `#` directly after a word character,
//! `&`, `\`, `/`, a quote, `=` or another `#` is not a hashtag. A bare token
//! that does not name anything is retried on its prefixes cut at `-` or `_`,
//! longest first, so `#euler-style` links `euler` and keeps `-style` as text.
//!
//! Markup already in the text is copied verbatim: `<a>...</a>` elements,
//! `xref-*` spans, comments and the inside of any well-formed tag. A `<` that
//! opens none of these (`$x<y$`) is written as `&lt;`. Running the resolver
//! on its own output is therefore a no-op.

use crate::diagnostic::Diagnostic;
use crate::error::FieldError;
use crate::index::{BIB_NAMESPACE, Index, Lookup, Target};
use crate::record::Record;
use crate::schema::{Column, ColumnType, ReferenceSpec, Schema};
use crate::utils::html::{escape, escape_attr};
use crate::utils::slug;
use compact_str::CompactString;
use serde_json::Value;
use std::path::PathBuf;

/// Link prefix for pages one directory below the site root.
pub const DEFAULT_LINK_ROOT: &str = "../";

// ============================================================================
// Resolved values
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Record,
    Bibliography,
    Unresolved,
    Ambiguous,
}

/// The outcome of resolving one token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLink {
    pub kind: LinkKind,
    /// The token as written: `#euler`, `\cite{gauss1801}`, `people/E1`.
    pub raw: String,
    /// Canonical `table/id` or `bib/key` of the target.
    pub target: Option<String>,
    /// Target table, or `bib`.
    pub table: Option<CompactString>,
    pub display: String,
    pub href: Option<String>,
    /// Qualified candidates of an ambiguous token, in registration order.
    pub candidates: Vec<String>,
}

impl ResolvedLink {
    fn to_target(target: &Target, raw: &str, link_root: &str) -> Self {
        Self {
            kind: if target.is_bib() {
                LinkKind::Bibliography
            } else {
                LinkKind::Record
            },
            raw: raw.to_owned(),
            target: Some(target.qualified()),
            table: Some(target.table().into()),
            display: target.display(),
            href: Some(target.href(link_root)),
            candidates: Vec::new(),
        }
    }

    fn unresolved(raw: &str) -> Self {
        Self {
            kind: LinkKind::Unresolved,
            raw: raw.to_owned(),
            target: None,
            table: None,
            display: raw.to_owned(),
            href: None,
            candidates: Vec::new(),
        }
    }

    fn ambiguous(raw: &str, candidates: &[&Target]) -> Self {
        Self {
            kind: LinkKind::Ambiguous,
            raw: raw.to_owned(),
            target: None,
            table: None,
            display: raw.to_owned(),
            href: None,
            candidates: candidates.iter().map(|t| t.qualified()).collect(),
        }
    }

    fn from_lookup(lookup: Lookup<'_>, raw: &str, link_root: &str) -> Self {
        match lookup {
            Lookup::Found(target) => Self::to_target(target, raw, link_root),
            Lookup::Ambiguous(candidates) => Self::ambiguous(raw, &candidates),
            Lookup::Missing => Self::unresolved(raw),
        }
    }

    pub const fn is_resolved(&self) -> bool {
        matches!(self.kind, LinkKind::Record | LinkKind::Bibliography)
    }

    /// Markup for this link. Unresolved tokens are emitted as escaped text.
    pub fn to_html(&self) -> String {
        match self.kind {
            LinkKind::Unresolved => escape(&self.raw),
            _ => self.markup(),
        }
    }

    fn markup(&self) -> String {
        let attr = |value: &Option<String>| escape_attr(value.as_deref().unwrap_or_default());
        match self.kind {
            LinkKind::Record => format!(
                "<a class=\"xref\" href=\"{}\" data-ref=\"{}\">{}</a>",
                attr(&self.href),
                attr(&self.target),
                escape(&self.display)
            ),
            LinkKind::Bibliography => format!(
                "<a class=\"cite\" href=\"{}\" data-ref=\"{}\">{}</a>",
                attr(&self.href),
                attr(&self.target),
                escape(&self.display)
            ),
            LinkKind::Ambiguous => format!(
                "<span class=\"xref-ambiguous\" title=\"{}\" data-candidates=\"{}\">{}</span>",
                escape_attr(&format!("ambiguous reference: {}", self.candidates.join(", "))),
                escape_attr(&self.candidates.join(" ")),
                escape(&self.raw)
            ),
            LinkKind::Unresolved => self.raw.clone(),
        }
    }

    /// Warning for unresolved and ambiguous tokens.
    pub fn diagnostic(&self) -> Option<Diagnostic> {
        match self.kind {
            LinkKind::Unresolved => Some(Diagnostic::unresolved(&self.raw)),
            LinkKind::Ambiguous => Some(Diagnostic::ambiguous(&self.raw, &self.candidates)),
            _ => None,
        }
    }
}

/// A field value after resolution, ready to be embedded in HTML.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedValue {
    Null,
    /// Free text with links substituted. Emitted verbatim.
    Text(String),
    /// Escaped display form of a number, boolean or enum value.
    Scalar(String),
    /// Items of a `list` column, each resolved like `Text`.
    List(Vec<String>),
    /// Targets of a `reference` column.
    Links(Vec<ResolvedLink>),
}

impl ResolvedValue {
    pub fn to_html(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Text(html) | Self::Scalar(html) => html.clone(),
            Self::List(items) => {
                let mut html = String::from("<ul class=\"value-list\">");
                for item in items {
                    html.push_str("<li>");
                    html.push_str(item);
                    html.push_str("</li>");
                }
                html.push_str("</ul>");
                html
            }
            Self::Links(links) => links
                .iter()
                .map(ResolvedLink::to_html)
                .collect::<Vec<_>>()
                .join(", "),
        }
    }

    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

/// Result of [`Resolver::resolve_field`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldResolution {
    pub value: ResolvedValue,
    pub diagnostics: Vec<Diagnostic>,
    pub errors: Vec<FieldError>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedField {
    pub name: String,
    /// The value as read from disk.
    pub raw: Value,
    pub value: ResolvedValue,
}

/// A record as render hooks see it.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRecord {
    pub table: CompactString,
    pub id: CompactString,
    pub short_name: CompactString,
    pub label: String,
    /// Record page, relative to the site root: `people/E1.html`.
    pub page: String,
    pub source: PathBuf,
    /// Schema columns first, in schema order, then any extra fields by name.
    pub fields: Vec<ResolvedField>,
}

impl ResolvedRecord {
    pub fn get(&self, name: &str) -> Option<&ResolvedField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Rendered HTML of a field, if present.
    pub fn html(&self, name: &str) -> Option<String> {
        self.get(name).map(|f| f.value.to_html())
    }

    pub fn raw(&self, name: &str) -> Option<&Value> {
        self.get(name).map(|f| &f.raw)
    }

    /// Resolved links of a field (empty unless it is a reference column).
    pub fn links(&self, name: &str) -> &[ResolvedLink] {
        match self.get(name).map(|f| &f.value) {
            Some(ResolvedValue::Links(links)) => links,
            _ => &[],
        }
    }

    /// Record page file name, relative to its table directory.
    pub fn file_name(&self) -> String {
        slug::record_page(&self.id)
    }
}

/// A table after resolution: its schema and records in load order.
#[derive(Debug, Clone)]
pub struct ResolvedTable {
    pub schema: Schema,
    pub records: Vec<ResolvedRecord>,
}

impl ResolvedTable {
    pub fn name(&self) -> &str {
        &self.schema.table_name
    }

    pub fn record(&self, id: &str) -> Option<&ResolvedRecord> {
        self.records.iter().find(|r| r.id == id)
    }
}

// ============================================================================
// Resolver
// ============================================================================

/// Scanned pieces of a text.
enum Segment<'s> {
    Text(&'s str),
    Link(ResolvedLink),
    /// Unresolved token left in place as part of the surrounding text.
    Note(ResolvedLink),
}

/// Resolves tokens against one [`Index`].
#[derive(Debug, Clone)]
pub struct Resolver<'a> {
    index: &'a Index,
    link_root: String,
}

impl<'a> Resolver<'a> {
    pub fn new(index: &'a Index) -> Self {
        Self {
            index,
            link_root: DEFAULT_LINK_ROOT.to_owned(),
        }
    }

    /// Prefix put in front of every generated href.
    pub fn with_link_root(mut self, link_root: impl Into<String>) -> Self {
        self.link_root = link_root.into();
        self
    }

    pub fn index(&self) -> &'a Index {
        self.index
    }

    /// Rewrite every hashtag and citation in `s`.
    pub fn resolve_text(&self, s: &str) -> (String, Vec<Diagnostic>) {
        let mut out = String::with_capacity(s.len());
        let mut diagnostics = Vec::new();

        for segment in self.scan(s) {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Link(link) => {
                    out.push_str(&link.markup());
                    diagnostics.extend(link.diagnostic());
                }
                Segment::Note(link) => diagnostics.extend(link.diagnostic()),
            }
        }

        (out, diagnostics)
    }

    /// Every token found in `s`, resolved or not.
    pub fn links(&self, s: &str) -> Vec<ResolvedLink> {
        self.scan(s)
            .into_iter()
            .filter_map(|segment| match segment {
                Segment::Link(link) | Segment::Note(link) => Some(link),
                Segment::Text(_) => None,
            })
            .collect()
    }

    fn scan<'s>(&self, s: &'s str) -> Vec<Segment<'s>> {
        let bytes = s.as_bytes();
        let mut segments = Vec::new();
        let mut last = 0;
        let mut i = 0;

        while i < bytes.len() {
            match bytes[i] {
                b'<' => {
                    if let Some(end) = markup_end(s, i) {
                        i = end;
                        continue;
                    }
                    // A stray `<`, as in `$x<y$`, must not open a tag in the page.
                    push_text(&mut segments, &s[last..i]);
                    segments.push(Segment::Text("&lt;"));
                    last = i + 1;
                }
                b'\\' if s[i..].starts_with("\\cite{") && !preceded_by(s, i, |c| c == '\\') => {
                    if let Some(close) = s[i..].find('}') {
                        let end = i + close + 1;
                        let links = self.citations(&s[i + "\\cite{".len()..i + close]);
                        if links.iter().any(ResolvedLink::is_resolved) {
                            push_text(&mut segments, &s[last..i]);
                            for (n, link) in links.into_iter().enumerate() {
                                if n > 0 {
                                    segments.push(Segment::Text(", "));
                                }
                                segments.push(Segment::Link(link));
                            }
                            last = end;
                        } else {
                            segments.extend(links.into_iter().map(Segment::Note));
                        }
                        i = end;
                        continue;
                    }
                }
                b'#' if !preceded_by(s, i, blocks_hashtag) => {
                    if let Some((end, link)) = self.hashtag(s, i) {
                        push_text(&mut segments, &s[last..i]);
                        if link.kind == LinkKind::Unresolved {
                            segments.push(Segment::Note(link));
                            segments.push(Segment::Text(&s[i..end]));
                        } else {
                            segments.push(Segment::Link(link));
                        }
                        last = end;
                        i = end;
                        continue;
                    }
                }
                _ => {}
            }
            i += 1;
        }

        push_text(&mut segments, &s[last..]);
        segments
    }

    /// Resolve the hashtag starting at byte `start` (the `#`).
    fn hashtag(&self, s: &str, start: usize) -> Option<(usize, ResolvedLink)> {
        let bytes = s.as_bytes();
        let first_end = run_end(bytes, start + 1);
        if first_end == start + 1 {
            return None;
        }
        let first = &s[start + 1..first_end];

        if bytes.get(first_end) == Some(&b'/') && self.index.is_namespace(first) {
            let second_end = run_end(bytes, first_end + 1);
            if second_end > first_end + 1 {
                let token = &s[first_end + 1..second_end];
                for candidate in shrink(token) {
                    let lookup = self.index.lookup_qualified(first, candidate);
                    if !lookup.is_missing() {
                        let end = first_end + 1 + candidate.len();
                        return Some((end, self.link(lookup, &s[start..end])));
                    }
                }
                return Some((second_end, ResolvedLink::unresolved(&s[start..second_end])));
            }
        }

        for candidate in shrink(first) {
            if self.index.contains_bare(candidate) {
                let end = start + 1 + candidate.len();
                return Some((end, self.link(self.index.lookup_bare(candidate), &s[start..end])));
            }
        }
        Some((first_end, ResolvedLink::unresolved(&s[start..first_end])))
    }

    /// Resolve the comma-separated keys of a `\cite{}`.
    fn citations(&self, keys: &str) -> Vec<ResolvedLink> {
        keys.split(',')
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(|key| {
                let raw = format!("\\cite{{{key}}}");
                self.link(self.index.lookup_qualified(BIB_NAMESPACE, key), &raw)
            })
            .collect()
    }

    fn link(&self, lookup: Lookup<'_>, raw: &str) -> ResolvedLink {
        ResolvedLink::from_lookup(lookup, raw, &self.link_root)
    }

    // ------------------------------------------------------------------------
    // Reference columns
    // ------------------------------------------------------------------------

    /// Resolve the value of a `reference` column.
    ///
    /// Accepts `"#token"`, `"token"`, `"table/token"` or an array of those.
    /// A target outside a restricted column's tables is a [`FieldError`], not
    /// a link.
    pub fn resolve_field(&self, value: Option<&Value>, column: &Column) -> FieldResolution {
        let unrestricted = ReferenceSpec::default();
        let spec = column.reference().unwrap_or(&unrestricted);
        let mut resolution = FieldResolution {
            value: ResolvedValue::Null,
            diagnostics: Vec::new(),
            errors: Vec::new(),
        };

        let tokens: Vec<&str> = match value {
            None | Some(Value::Null) => {
                if column.required && !spec.nullable {
                    resolution.errors.push(FieldError::Missing {
                        column: column.name.clone(),
                    });
                }
                return resolution;
            }
            Some(Value::String(s)) => vec![s.as_str()],
            Some(Value::Array(items)) if items.iter().all(Value::is_string) => {
                items.iter().filter_map(Value::as_str).collect()
            }
            Some(other) => {
                resolution.errors.push(FieldError::TypeMismatch {
                    column: column.name.clone(),
                    expected: column.kind.expected(),
                    found: crate::schema::json_kind(other),
                });
                resolution.value = ResolvedValue::Scalar(escape(&other.to_string()));
                return resolution;
            }
        };

        let mut links = Vec::with_capacity(tokens.len());
        for token in tokens {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            let link = self.reference(token, spec);

            if let (true, Some(table)) = (link.is_resolved(), &link.table)
                && !spec.allows(table)
            {
                resolution.errors.push(FieldError::RestrictedReference {
                    column: column.name.clone(),
                    token: token.to_owned(),
                    target: link.target.clone().unwrap_or_default(),
                    allowed: spec.tables.join(", "),
                });
                links.push(ResolvedLink::unresolved(token));
                continue;
            }

            resolution.diagnostics.extend(link.diagnostic());
            links.push(link);
        }

        resolution.value = ResolvedValue::Links(links);
        resolution
    }

    fn reference(&self, token: &str, spec: &ReferenceSpec) -> ResolvedLink {
        let name = token.strip_prefix('#').unwrap_or(token);

        if let Some((namespace, rest)) = name.split_once('/')
            && self.index.is_namespace(namespace)
        {
            return self.link(self.index.lookup_qualified(namespace, rest), token);
        }

        if spec.is_restricted() {
            let allowed = self
                .index
                .lookup_bare_where(name, |t| !t.is_bib() && spec.allows(t.table()));
            if !allowed.is_missing() {
                return self.link(allowed, token);
            }
        }
        self.link(self.index.lookup_bare(name), token)
    }

    // ------------------------------------------------------------------------
    // Records
    // ------------------------------------------------------------------------

    /// Resolve every field of a record.
    ///
    /// The returned diagnostics carry the record's source file and include
    /// the field errors found at load time.
    pub fn resolve_record(&self, record: &Record, schema: &Schema) -> (ResolvedRecord, Vec<Diagnostic>) {
        let mut diagnostics: Vec<Diagnostic> = record.field_errors.iter().map(Diagnostic::field).collect();
        let mut fields = Vec::with_capacity(record.fields.len());

        for column in &schema.columns {
            let raw = record.fields.get(&column.name);
            if let ColumnType::Reference(_) = column.kind {
                let resolution = self.resolve_field(raw, column);
                diagnostics.extend(resolution.diagnostics);
                diagnostics.extend(resolution.errors.iter().map(Diagnostic::field));
                if let Some(raw) = raw {
                    fields.push(ResolvedField {
                        name: column.name.clone(),
                        raw: raw.clone(),
                        value: resolution.value,
                    });
                }
                continue;
            }

            if let Some(raw) = raw {
                let value = self.resolve_value(raw, Some(column), &mut diagnostics);
                fields.push(ResolvedField {
                    name: column.name.clone(),
                    raw: raw.clone(),
                    value,
                });
            }
        }

        for (name, raw) in &record.fields {
            if name == "id" || schema.column(name).is_some() {
                continue;
            }
            let value = self.resolve_value(raw, None, &mut diagnostics);
            fields.push(ResolvedField {
                name: name.clone(),
                raw: raw.clone(),
                value,
            });
        }

        let diagnostics = diagnostics
            .into_iter()
            .map(|d| d.or_source(&record.source))
            .collect();

        let resolved = ResolvedRecord {
            table: record.table.clone(),
            id: record.id.clone(),
            short_name: record.short_name.clone(),
            label: record.label(schema),
            page: record.page(),
            source: record.source.clone(),
            fields,
        };
        (resolved, diagnostics)
    }

    fn resolve_value(&self, raw: &Value, column: Option<&Column>, diagnostics: &mut Vec<Diagnostic>) -> ResolvedValue {
        let mut text = |s: &str| {
            let (html, found) = self.resolve_text(s);
            diagnostics.extend(found);
            html
        };

        match (column.map(|c| &c.kind), raw) {
            (_, Value::Null) => ResolvedValue::Null,
            (Some(ColumnType::Enum(options)), Value::String(s)) => {
                let label = options
                    .iter()
                    .find(|o| &o.value == s)
                    .map_or(s.as_str(), |o| o.label());
                ResolvedValue::Scalar(escape(label))
            }
            (Some(ColumnType::Number | ColumnType::Integer | ColumnType::Boolean), value) => {
                ResolvedValue::Scalar(escape(&scalar_text(value)))
            }
            (_, Value::String(s)) => ResolvedValue::Text(text(s)),
            (_, Value::Array(items)) if items.iter().all(Value::is_string) => {
                ResolvedValue::List(items.iter().filter_map(Value::as_str).map(&mut text).collect())
            }
            (_, value) => ResolvedValue::Scalar(escape(&scalar_text(value))),
        }
    }
}

/// Resolve `s` against `index` with the default link root.
pub fn resolve_text(s: &str, index: &Index) -> (String, Vec<Diagnostic>) {
    Resolver::new(index).resolve_text(s)
}

// ============================================================================
// Scanning helpers
// ============================================================================

fn push_text<'s>(segments: &mut Vec<Segment<'s>>, text: &'s str) {
    if !text.is_empty() {
        segments.push(Segment::Text(text));
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

const fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-'
}

fn run_end(bytes: &[u8], start: usize) -> usize {
    let mut end = start;
    while end < bytes.len() && is_token_byte(bytes[end]) {
        end += 1;
    }
    end
}

fn preceded_by(s: &str, i: usize, test: impl Fn(char) -> bool) -> bool {
    s[..i].chars().next_back().is_some_and(test)
}

fn blocks_hashtag(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '&' | '\\' | '/' | '"' | '\'' | '=' | '#')
}

/// `a-b_c` → `a-b_c`, `a-b`, `a`.
fn shrink(token: &str) -> impl Iterator<Item = &str> {
    std::iter::once(token).chain(
        token
            .rmatch_indices(['-', '_'])
            .map(move |(at, _)| &token[..at])
            .filter(|prefix| !prefix.is_empty()),
    )
}

/// End of markup starting at byte `i`, if `s[i..]` opens a tag.
///
/// Links and `xref-*` spans are skipped through their closing tag, comments
/// through `-->`. Any other tag needs a name directly followed by whitespace,
/// `/` or `>`, and is skipped through its `>`.
fn markup_end(s: &str, i: usize) -> Option<usize> {
    let rest = &s[i..];
    let bytes = rest.as_bytes();

    if rest.starts_with("<!--") {
        return rest.find("-->").map(|close| i + close + "-->".len());
    }

    let name_start = if bytes.get(1) == Some(&b'/') { 2 } else { 1 };
    if !bytes.get(name_start).is_some_and(u8::is_ascii_alphabetic) {
        return None;
    }
    let mut name_end = name_start;
    while name_end < bytes.len() && bytes[name_end].is_ascii_alphanumeric() {
        name_end += 1;
    }
    let well_formed = bytes
        .get(name_end)
        .is_some_and(|b| b.is_ascii_whitespace() || *b == b'/' || *b == b'>');
    if !well_formed {
        return None;
    }
    let tag_end = i + rest.find('>')? + 1;

    if name_start == 1 && &rest[1..name_end] == "a" {
        return Some(rest.find("</a>").map_or(tag_end, |close| i + close + "</a>".len()));
    }
    if rest.starts_with("<span class=\"xref-") {
        return Some(rest.find("</span>").map_or(tag_end, |close| i + close + "</span>".len()));
    }
    Some(tag_end)
}

// ============================================================================
// Tests
// ============================================================================
