//! Bibliography Builder: parses the dataset's bibliography and renders its page.
//!
//! Two source formats are accepted, picked by extension:
//!
//! - `.bib`: BibTeX. `@type{key, field = {value}, field = "value", field = 1801}`,
//!   with nested braces and `#` concatenation. `@comment`, `@preamble` and
//!   `@string` blocks are skipped; `@string` macros are not expanded.
//! - `.json`: an array of objects, each with a `key` and optional `type`.

use crate::error::BibliographyError;
use crate::render::layout::Layout;
use crate::utils::html::{escape, escape_attr};
use crate::utils::slug;
use compact_str::CompactString;
use rustc_hash::FxHashSet;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// Output path of the bibliography page.
pub const BIBLIOGRAPHY_PAGE: &str = "bibliography.html";

/// Fields shown in the entry's headline rather than in the detail list.
const HEADLINE_FIELDS: &[&str] = &["author", "editor", "title", "journal", "booktitle", "publisher", "year"];

/// Block types that carry no entry.
const SKIPPED_BLOCKS: &[&str] = &["comment", "preamble", "string"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BibliographyEntry {
    pub key: CompactString,
    /// Entry type, lowercased: `article`, `book`, ...
    pub kind: CompactString,
    /// Field name (lowercased) and value, in source order.
    pub fields: Vec<(CompactString, String)>,
}

impl BibliographyEntry {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value.as_str())
    }
}

// ============================================================================
// Loading
// ============================================================================

/// Load a bibliography file. Keys must be unique within it.
pub fn load(path: &Path) -> Result<Vec<BibliographyEntry>, BibliographyError> {
    let content =
        fs::read_to_string(path).map_err(|err| BibliographyError::Io(path.to_path_buf(), err))?;

    let entries = match path.extension().and_then(|ext| ext.to_str()) {
        Some("bib") => parse_bibtex(&content, path)?,
        Some("json") => parse_json(&content, path)?,
        _ => return Err(BibliographyError::UnsupportedFormat(path.to_path_buf())),
    };

    check_unique(&entries, path)?;
    Ok(entries)
}

fn check_unique(entries: &[BibliographyEntry], path: &Path) -> Result<(), BibliographyError> {
    let mut seen = FxHashSet::default();
    for entry in entries {
        if !seen.insert(entry.key.as_str()) {
            return Err(BibliographyError::DuplicateKey {
                path: path.to_path_buf(),
                key: entry.key.to_string(),
            });
        }
    }
    Ok(())
}

/// Parse a JSON array of entry objects.
pub fn parse_json(content: &str, path: &Path) -> Result<Vec<BibliographyEntry>, BibliographyError> {
    let value: Value =
        serde_json::from_str(content).map_err(|err| BibliographyError::Json(path.to_path_buf(), err))?;

    let malformed = |index: usize, reason: &str| BibliographyError::Malformed {
        path: path.to_path_buf(),
        line: 0,
        reason: format!("entry {index}: {reason}"),
    };

    let Value::Array(items) = value else {
        return Err(malformed(0, "expected an array of entries"));
    };

    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            let Value::Object(map) = item else {
                return Err(malformed(i, "expected an object"));
            };
            let key = match map.get("key") {
                Some(Value::String(key)) if !key.trim().is_empty() => CompactString::from(key.trim()),
                _ => return Err(malformed(i, "missing `key`")),
            };
            let kind = map
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or("misc")
                .to_ascii_lowercase();
            let fields = map
                .iter()
                .filter(|(name, _)| !matches!(name.as_str(), "key" | "type"))
                .map(|(name, value)| (CompactString::from(name.to_ascii_lowercase()), json_text(value)))
                .collect();
            Ok(BibliographyEntry {
                key,
                kind: kind.into(),
                fields,
            })
        })
        .collect()
}

fn json_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(json_text).collect::<Vec<_>>().join(" and "),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Parse BibTeX source.
pub fn parse_bibtex(content: &str, path: &Path) -> Result<Vec<BibliographyEntry>, BibliographyError> {
    let mut scanner = Scanner::new(content, path);
    let mut entries = Vec::new();
    while let Some(entry) = scanner.next_entry()? {
        entries.push(entry);
    }
    Ok(entries)
}

// ============================================================================
// BibTeX Scanner
// ============================================================================

struct Scanner<'a> {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    path: &'a Path,
}

impl<'a> Scanner<'a> {
    fn new(content: &str, path: &'a Path) -> Self {
        Self {
            chars: content.chars().collect(),
            pos: 0,
            line: 1,
            path,
        }
    }

    fn error(&self, reason: impl Into<String>) -> BibliographyError {
        BibliographyError::Malformed {
            path: PathBuf::from(self.path),
            line: self.line,
            reason: reason.into(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn expect(&mut self, wanted: char) -> Result<(), BibliographyError> {
        self.skip_whitespace();
        match self.bump() {
            Some(c) if c == wanted => Ok(()),
            Some(c) => Err(self.error(format!("expected `{wanted}`, found `{c}`"))),
            None => Err(self.error(format!("expected `{wanted}`, found end of file"))),
        }
    }

    fn identifier(&mut self) -> String {
        let mut ident = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || matches!(c, '_' | '-' | ':' | '.' | '+' | '/') {
                ident.push(c);
                self.bump();
            } else {
                break;
            }
        }
        ident
    }

    /// Consume everything up to the matching `close`, which is consumed too.
    fn balanced(&mut self, open: char, close: char) -> Result<String, BibliographyError> {
        let start = self.line;
        let mut depth = 1usize;
        let mut text = String::new();
        while let Some(c) = self.bump() {
            if c == open && open != close {
                depth += 1;
            } else if c == close {
                depth -= 1;
                if depth == 0 {
                    return Ok(text);
                }
            } else if c == '{' && open == '"' {
                text.push(c);
                text.push_str(&self.balanced('{', '}')?);
                text.push('}');
                continue;
            }
            text.push(c);
        }
        Err(BibliographyError::Malformed {
            path: PathBuf::from(self.path),
            line: start,
            reason: format!("unterminated `{open}`"),
        })
    }

    fn next_entry(&mut self) -> Result<Option<BibliographyEntry>, BibliographyError> {
        loop {
            while self.peek().is_some_and(|c| c != '@') {
                self.bump();
            }
            if self.bump().is_none() {
                return Ok(None);
            }

            let kind = self.identifier().to_ascii_lowercase();
            if kind.is_empty() {
                return Err(self.error("expected an entry type after `@`"));
            }

            self.skip_whitespace();
            let close = match self.bump() {
                Some('{') => '}',
                Some('(') => ')',
                _ => return Err(self.error(format!("expected `{{` after `@{kind}`"))),
            };
            let open = if close == '}' { '{' } else { '(' };

            if SKIPPED_BLOCKS.contains(&kind.as_str()) {
                self.balanced(open, close)?;
                continue;
            }

            return self.entry_body(kind, close).map(Some);
        }
    }

    fn entry_body(&mut self, kind: String, close: char) -> Result<BibliographyEntry, BibliographyError> {
        self.skip_whitespace();
        let key = self.identifier();
        if key.is_empty() {
            return Err(self.error(format!("`@{kind}` entry has no citation key")));
        }

        let mut entry = BibliographyEntry {
            key: key.into(),
            kind: kind.into(),
            fields: Vec::new(),
        };

        loop {
            self.skip_whitespace();
            match self.peek() {
                Some(c) if c == close => {
                    self.bump();
                    return Ok(entry);
                }
                Some(',') => {
                    self.bump();
                    continue;
                }
                None => return Err(self.error(format!("entry `{}` is not closed", entry.key))),
                Some(_) => {}
            }

            let name = self.identifier().to_ascii_lowercase();
            if name.is_empty() {
                return Err(self.error(format!("expected a field name in entry `{}`", entry.key)));
            }
            self.expect('=')?;
            let value = self.value(close)?;
            entry.fields.push((name.into(), value));

            self.skip_whitespace();
            match self.peek() {
                Some(',') => {
                    self.bump();
                }
                Some(c) if c == close => {}
                Some(c) => {
                    return Err(self.error(format!(
                        "expected `,` or `{close}` after a field in entry `{}`, found `{c}`",
                        entry.key
                    )));
                }
                None => return Err(self.error(format!("entry `{}` is not closed", entry.key))),
            }
        }
    }

    /// A field value: `{...}`, `"..."` or a bare word, joined with `#`.
    fn value(&mut self, close: char) -> Result<String, BibliographyError> {
        let mut value = String::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                Some('{') => {
                    self.bump();
                    value.push_str(&self.balanced('{', '}')?);
                }
                Some('"') => {
                    self.bump();
                    value.push_str(&self.balanced('"', '"')?);
                }
                Some(c) if c != close && c != ',' => {
                    let word = self.identifier();
                    if word.is_empty() {
                        return Err(self.error(format!("unexpected `{c}` in field value")));
                    }
                    value.push_str(&word);
                }
                _ => return Err(self.error("missing field value")),
            }

            self.skip_whitespace();
            if self.peek() == Some('#') {
                self.bump();
            } else {
                return Ok(normalize(&value));
            }
        }
    }
}

/// Collapse whitespace and drop protective braces.
fn normalize(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace(['{', '}'], "")
}

// ============================================================================
// Rendering
// ============================================================================

/// Render the bibliography page: one block per entry, in file order.
pub fn render_page(entries: &[BibliographyEntry], title: &str, layout: &Layout) -> String {
    let mut body = String::new();
    body.push_str(&format!("<h1>{}</h1>\n<div class=\"bibliography\">\n", escape(title)));
    for entry in entries {
        body.push_str(&render_entry(entry));
    }
    body.push_str("</div>\n");
    layout.render(title, "", &body)
}

fn render_entry(entry: &BibliographyEntry) -> String {
    let mut html = format!(
        "<div class=\"bib-entry\" id=\"{}\">\n<span class=\"bib-key\">[{}]</span>\n",
        escape_attr(&slug::bib_anchor(&entry.key)),
        escape(&entry.key)
    );

    if let Some(author) = entry.get("author").or_else(|| entry.get("editor")) {
        html.push_str(&format!("<span class=\"bib-author\">{}</span>.\n", escape(author)));
    }
    if let Some(title) = entry.get("title") {
        html.push_str(&format!("<span class=\"bib-title\">{}</span>.\n", escape(title)));
    }
    if let Some(venue) = ["journal", "booktitle", "publisher"]
        .iter()
        .find_map(|field| entry.get(field))
    {
        html.push_str(&format!("<span class=\"bib-venue\">{}</span>", escape(venue)));
        html.push_str(if entry.get("year").is_some() { ", " } else { ".\n" });
    }
    if let Some(year) = entry.get("year") {
        html.push_str(&format!("<span class=\"bib-year\">{}</span>.\n", escape(year)));
    }

    let rest: Vec<_> = entry
        .fields
        .iter()
        .filter(|(name, _)| !HEADLINE_FIELDS.contains(&name.as_str()))
        .collect();
    if !rest.is_empty() {
        html.push_str("<dl class=\"bib-fields\">\n");
        for (name, value) in rest {
            html.push_str(&format!("<dt>{}</dt><dd>{}</dd>\n", escape(name), escape(value)));
        }
        html.push_str("</dl>\n");
    }

    html.push_str("</div>\n");
    html
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> Result<Vec<BibliographyEntry>, BibliographyError> {
        parse_bibtex(content, Path::new("refs.bib"))
    }

    const REFS: &str = r#"
@comment{ this file is maintained by hand }

@book{gauss1801,
  author    = {Carl Friedrich Gauss},
  title     = {Disquisitiones {A}rithmeticae},
  publisher = "Fleischer",
  year      = 1801
}

@article{euler1748,
  author  = "Leonhard Euler",
  title   = {Introductio in analysin infinitorum},
  journal = {Opera} # { Omnia},
  year    = {1748},
}

@string{ann = "Annals"}
"#;

    #[test]
    fn test_parse_bibtex_entries_in_order() {
        let entries = parse(REFS).unwrap();
        assert_eq!(entries.len(), 2);

        let gauss = &entries[0];
        assert_eq!(gauss.key, "gauss1801");
        assert_eq!(gauss.kind, "book");
        assert_eq!(gauss.get("title"), Some("Disquisitiones Arithmeticae"));
        assert_eq!(gauss.get("publisher"), Some("Fleischer"));
        assert_eq!(gauss.get("year"), Some("1801"));

        let euler = &entries[1];
        assert_eq!(euler.kind, "article");
        assert_eq!(euler.get("journal"), Some("Opera Omnia"));
        let names: Vec<_> = euler.fields.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["author", "title", "journal", "year"]);
    }

    #[test]
    fn test_parse_bibtex_parentheses_and_case() {
        let entries = parse("@ARTICLE(riemann1859, Title = {Ueber die Anzahl})").unwrap();
        assert_eq!(entries[0].kind, "article");
        assert_eq!(entries[0].get("title"), Some("Ueber die Anzahl"));
    }

    #[test]
    fn test_parse_bibtex_unterminated_reports_line() {
        let err = parse("@book{a,\n  title = {Open\n").unwrap_err();
        match err {
            BibliographyError::Malformed { line, reason, .. } => {
                assert_eq!(line, 2);
                assert!(reason.contains("unterminated"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_parse_bibtex_missing_key() {
        let err = parse("@book{, title = {x}}").unwrap_err();
        assert!(matches!(err, BibliographyError::Malformed { .. }));
    }

    #[test]
    fn test_parse_bibtex_missing_equals() {
        let err = parse("@book{a, title {x}}").unwrap_err();
        assert!(matches!(err, BibliographyError::Malformed { line: 1, .. }));
    }

    #[test]
    fn test_load_rejects_duplicate_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("refs.bib");
        fs::write(&path, "@book{a, title={x}}\n@book{a, title={y}}").unwrap();
        let err = load(&path).unwrap_err();
        assert!(matches!(err, BibliographyError::DuplicateKey { ref key, .. } if key == "a"));
    }

    #[test]
    fn test_load_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("refs.json");
        fs::write(
            &path,
            r#"[{ "key": "gauss1801", "type": "book", "author": ["Gauss", "Clarke"], "year": 1801 }]"#,
        )
        .unwrap();
        let entries = load(&path).unwrap();
        assert_eq!(entries[0].kind, "book");
        assert_eq!(entries[0].get("author"), Some("Gauss and Clarke"));
        assert_eq!(entries[0].get("year"), Some("1801"));
    }

    #[test]
    fn test_load_json_missing_key() {
        let err = parse_json(r#"[{ "title": "x" }]"#, Path::new("refs.json")).unwrap_err();
        assert!(matches!(err, BibliographyError::Malformed { .. }));
    }

    #[test]
    fn test_load_unsupported_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("refs.ris");
        fs::write(&path, "TY  - BOOK").unwrap();
        assert!(matches!(load(&path).unwrap_err(), BibliographyError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_render_entry_anchor_and_fields() {
        let entries = parse(REFS).unwrap();
        let html = render_entry(&entries[0]);
        assert!(html.starts_with("<div class=\"bib-entry\" id=\"bib-gauss1801\">"));
        assert!(html.contains("<span class=\"bib-author\">Carl Friedrich Gauss</span>"));
        assert!(html.contains("<span class=\"bib-venue\">Fleischer</span>, "));
        assert!(!html.contains("bib-fields"));
    }
}
