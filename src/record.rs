//! Record Store: loads the JSON records of one table.
//!
//! # Ordering
//!
//! Record files are visited in numeric-prefix order: a leading digit run
//! (`001_`, `2_`, `10_`) is compared as an integer, ties broken by the full
//! file name. Files without a prefix come after all prefixed files, by name.
//! The order is part of the output contract: table pages list records in it
//! and the global index registers them in it.

use crate::error::{FieldError, RecordError};
use crate::schema::{self, SCHEMA_FILE, Schema};
use crate::utils::slug::{self, TABLE_PAGE};
use compact_str::CompactString;
use regex::Regex;
use rustc_hash::FxHashMap;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use walkdir::WalkDir;

/// Hook files living next to records that are not records themselves.
pub const RESERVED_FILES: &[&str] = &[SCHEMA_FILE, "graph.json", "render.json"];

/// Fields tried, in order, for a record's label when the schema names none.
const LABEL_FIELDS: &[&str] = &["name", "title"];

static NUMERIC_PREFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^([0-9]+)_").unwrap());

/// One data entry, read from one JSON file.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Table the record belongs to.
    pub table: CompactString,
    /// Stable id, normalized to a string (`7` and `"7"` are the same id).
    pub id: CompactString,
    pub short_name: CompactString,
    /// Raw field values as read from disk, `id` included.
    pub fields: Map<String, Value>,
    pub source: PathBuf,
    /// Schema violations found while loading.
    pub field_errors: Vec<FieldError>,
}

impl Record {
    /// Build a record from parsed JSON.
    pub fn from_value(value: Value, path: &Path, schema: &Schema) -> Result<Self, RecordError> {
        let Value::Object(fields) = value else {
            return Err(RecordError::NotAnObject(path.to_path_buf()));
        };

        let id = match fields.get("id") {
            None | Some(Value::Null) => return Err(RecordError::MissingId(path.to_path_buf())),
            Some(Value::String(s)) if !s.trim().is_empty() => CompactString::from(s.trim()),
            Some(Value::Number(n)) if n.is_i64() || n.is_u64() => CompactString::from(n.to_string()),
            Some(_) => return Err(RecordError::InvalidId(path.to_path_buf())),
        };

        let derived = schema
            .short_name_field
            .as_deref()
            .and_then(|field| fields.get(field))
            .and_then(Value::as_str)
            .map(str::trim)
            .map(CompactString::from)
            .unwrap_or_else(|| short_name_from_path(path));
        let short_name = if derived.is_empty() { id.clone() } else { derived };

        let field_errors = schema::validate(&fields, schema);

        Ok(Self {
            table: schema.table_name.clone(),
            id,
            short_name,
            fields,
            source: path.to_path_buf(),
            field_errors,
        })
    }

    /// Read and parse one record file.
    pub fn load(path: &Path, schema: &Schema) -> Result<Self, RecordError> {
        let content =
            fs::read_to_string(path).map_err(|err| RecordError::Io(path.to_path_buf(), err))?;
        let value: Value = serde_json::from_str(&content)
            .map_err(|err| RecordError::Malformed(path.to_path_buf(), err))?;
        Self::from_value(value, path, schema)
    }

    /// `table/id`
    pub fn qualified_id(&self) -> String {
        format!("{}/{}", self.table, self.id)
    }

    /// Output page relative to the site root: `people/E1.html`.
    pub fn page(&self) -> String {
        format!("{}/{}", self.table, slug::record_page(&self.id))
    }

    /// Text used for links to this record and for its page heading.
    pub fn label(&self, schema: &Schema) -> String {
        let candidates = schema.display_field.as_deref().into_iter().chain(LABEL_FIELDS.iter().copied());
        for field in candidates {
            match self.fields.get(field) {
                Some(Value::String(s)) if !s.trim().is_empty() => return s.trim().to_owned(),
                Some(Value::Number(n)) => return n.to_string(),
                _ => {}
            }
        }
        self.short_name.to_string()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }
}

/// Records of one table plus the per-file problems found on the way.
#[derive(Debug, Default)]
pub struct TableLoad {
    pub records: Vec<Record>,
    pub errors: Vec<RecordError>,
}

impl TableLoad {
    pub fn has_duplicate_ids(&self) -> bool {
        self.errors.iter().any(RecordError::is_duplicate_id)
    }
}

/// Load every record of a table, best effort.
///
/// A broken file never stops its siblings from loading; it becomes a
/// [`RecordError`] in the returned [`TableLoad`].
pub fn load_all(table_dir: &Path, schema: &Schema) -> TableLoad {
    let mut load = TableLoad::default();
    let mut ids: FxHashMap<CompactString, PathBuf> = FxHashMap::default();
    let mut short_names: FxHashMap<CompactString, PathBuf> = FxHashMap::default();
    // Lowercased page name → (id, file), so case-insensitive filesystems collide too.
    let mut pages: FxHashMap<String, (CompactString, PathBuf)> = FxHashMap::default();

    for path in record_files(table_dir) {
        let record = match Record::load(&path, schema) {
            Ok(record) => record,
            Err(err) => {
                load.errors.push(err);
                continue;
            }
        };

        if let Some(first) = ids.get(&record.id) {
            load.errors.push(RecordError::DuplicateId {
                table: schema.table_name.to_string(),
                id: record.id.to_string(),
                first: first.clone(),
                second: path,
            });
            continue;
        }
        ids.insert(record.id.clone(), path.clone());

        let page = slug::record_page(&record.id);
        let page_key = page.to_ascii_lowercase();
        if page_key == TABLE_PAGE {
            load.errors.push(RecordError::ReservedPage {
                table: schema.table_name.to_string(),
                id: record.id.to_string(),
                page,
                path,
            });
            continue;
        }
        if let Some((first_id, first)) = pages.get(&page_key) {
            load.errors.push(RecordError::PageCollision {
                table: schema.table_name.to_string(),
                page,
                first_id: first_id.to_string(),
                second_id: record.id.to_string(),
                first: first.clone(),
                second: path,
            });
            continue;
        }
        pages.insert(page_key, (record.id.clone(), path.clone()));

        match short_names.get(&record.short_name) {
            Some(first) => load.errors.push(RecordError::DuplicateShortName {
                table: schema.table_name.to_string(),
                short_name: record.short_name.to_string(),
                first: first.clone(),
                second: path,
            }),
            None => {
                short_names.insert(record.short_name.clone(), path);
            }
        }

        load.records.push(record);
    }

    load
}

/// Record files of a table directory, in numeric-prefix order.
pub fn record_files(table_dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(table_dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| is_record_file(path))
        .collect();

    files.sort_by(|a, b| compare_file_names(&file_name(a), &file_name(b)));
    files
}

fn is_record_file(path: &Path) -> bool {
    let name = file_name(path);
    path.extension().is_some_and(|ext| ext == "json")
        && !name.starts_with('.')
        && !RESERVED_FILES.contains(&name.as_str())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Numeric value of a file name's `NNN_` prefix.
fn numeric_prefix(name: &str) -> Option<u64> {
    NUMERIC_PREFIX
        .captures(name)
        .and_then(|caps| caps[1].parse().ok())
}

/// Numeric-prefix ordering of record file names.
pub fn compare_file_names(a: &str, b: &str) -> Ordering {
    match (numeric_prefix(a), numeric_prefix(b)) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

/// `001_euler.json` → `euler`
pub fn short_name_from_path(path: &Path) -> CompactString {
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy())
        .unwrap_or_default();
    CompactString::from(NUMERIC_PREFIX.replace(&stem, ""))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const PEOPLE: &str = r#"{
        "table_name": "people",
        "columns": [
            { "name": "id", "type": "string", "required": true },
            { "name": "name", "type": "string", "required": true },
            { "name": "born", "type": "integer" }
        ]
    }"#;

    fn table(files: &[(&str, &str)]) -> (TempDir, PathBuf, Schema) {
        let dir = TempDir::new().unwrap();
        let table_dir = dir.path().join("people");
        fs::create_dir(&table_dir).unwrap();
        fs::write(table_dir.join(SCHEMA_FILE), PEOPLE).unwrap();
        for (name, content) in files {
            fs::write(table_dir.join(name), content).unwrap();
        }
        let schema = Schema::load(&table_dir).unwrap();
        (dir, table_dir, schema)
    }

    #[test]
    fn test_compare_file_names_numeric_prefix() {
        let mut names = vec!["10_b.json", "2_a.json", "notes.json", "001_c.json", "alpha.json"];
        names.sort_by(|a, b| compare_file_names(a, b));
        assert_eq!(
            names,
            vec!["001_c.json", "2_a.json", "10_b.json", "alpha.json", "notes.json"]
        );
    }

    #[test]
    fn test_compare_equal_prefix_falls_back_to_name() {
        assert_eq!(compare_file_names("01_b.json", "1_a.json"), Ordering::Less);
        assert_eq!(compare_file_names("1_a.json", "1_b.json"), Ordering::Less);
    }

    #[test]
    fn test_short_name_from_path() {
        assert_eq!(short_name_from_path(Path::new("people/001_euler.json")), "euler");
        assert_eq!(short_name_from_path(Path::new("people/gauss.json")), "gauss");
        assert_eq!(short_name_from_path(Path::new("people/12_3_x.json")), "3_x");
    }

    #[test]
    fn test_load_all_in_order_skipping_reserved() {
        let (_dir, table_dir, schema) = table(&[
            ("10_riemann.json", r#"{ "id": "R1", "name": "Riemann" }"#),
            ("2_gauss.json", r#"{ "id": "G1", "name": "Gauss" }"#),
            ("001_euler.json", r#"{ "id": "E1", "name": "Euler" }"#),
            ("graph.json", r#"{ "edges": [] }"#),
            ("render.json", r#"{ "row": "" }"#),
            ("README.md", "not a record"),
        ]);

        let load = load_all(&table_dir, &schema);
        assert!(load.errors.is_empty());
        let ids: Vec<_> = load.records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["E1", "G1", "R1"]);
        assert_eq!(load.records[0].short_name, "euler");
        assert_eq!(load.records[0].table, "people");
    }

    #[test]
    fn test_integer_id_normalized() {
        let (_dir, table_dir, schema) = table(&[("001_euler.json", r#"{ "id": 7, "name": "Euler" }"#)]);
        let load = load_all(&table_dir, &schema);
        assert_eq!(load.records[0].id, "7");
        // "id" is declared as a string column
        assert_eq!(load.records[0].field_errors.len(), 1);
    }

    #[test]
    fn test_malformed_record_does_not_stop_siblings() {
        let (_dir, table_dir, schema) = table(&[
            ("001_euler.json", r#"{ "id": "E1", "name": "Euler" }"#),
            ("002_broken.json", "{ nope"),
            ("003_list.json", "[1, 2]"),
            ("004_noid.json", r#"{ "name": "Nobody" }"#),
            ("005_badid.json", r#"{ "id": [1], "name": "Odd" }"#),
            ("006_gauss.json", r#"{ "id": "G1", "name": "Gauss" }"#),
        ]);

        let load = load_all(&table_dir, &schema);
        assert_eq!(load.records.len(), 2);
        assert_eq!(load.errors.len(), 4);
        assert!(matches!(load.errors[0], RecordError::Malformed(..)));
        assert!(matches!(load.errors[1], RecordError::NotAnObject(_)));
        assert!(matches!(load.errors[2], RecordError::MissingId(_)));
        assert!(matches!(load.errors[3], RecordError::InvalidId(_)));
        assert!(!load.has_duplicate_ids());
    }

    #[test]
    fn test_duplicate_id() {
        let (_dir, table_dir, schema) = table(&[
            ("001_euler.json", r#"{ "id": "E1", "name": "Euler" }"#),
            ("002_leonhard.json", r#"{ "id": "E1", "name": "Leonhard" }"#),
        ]);

        let load = load_all(&table_dir, &schema);
        assert!(load.has_duplicate_ids());
        assert_eq!(load.records.len(), 1);
        match &load.errors[0] {
            RecordError::DuplicateId { id, first, second, .. } => {
                assert_eq!(id, "E1");
                assert!(first.ends_with("001_euler.json"));
                assert!(second.ends_with("002_leonhard.json"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_short_name() {
        let (_dir, table_dir, schema) = table(&[
            ("001_euler.json", r#"{ "id": "E1", "name": "Euler" }"#),
            ("002_euler.json", r#"{ "id": "E2", "name": "Euler again" }"#),
        ]);

        let load = load_all(&table_dir, &schema);
        assert_eq!(load.records.len(), 2);
        assert!(matches!(load.errors[0], RecordError::DuplicateShortName { .. }));
        assert!(!load.has_duplicate_ids());
    }

    #[test]
    fn test_record_named_like_table_page() {
        let (_dir, table_dir, schema) = table(&[
            ("001_euler.json", r#"{ "id": "E1", "name": "Euler" }"#),
            ("002_index.json", r#"{ "id": "Index", "name": "Index theorem" }"#),
        ]);

        let load = load_all(&table_dir, &schema);
        assert_eq!(load.records.len(), 1);
        assert_eq!(load.errors.len(), 1);
        match &load.errors[0] {
            RecordError::ReservedPage { id, page, path, .. } => {
                assert_eq!(id, "Index");
                assert_eq!(page, "Index.html");
                assert!(path.ends_with("002_index.json"));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(!load.has_duplicate_ids());
    }

    #[test]
    fn test_ids_sharing_a_page() {
        let (_dir, table_dir, schema) = table(&[
            ("001_euler.json", r#"{ "id": "E 1", "name": "Euler" }"#),
            ("002_leonhard.json", r#"{ "id": "E_1", "name": "Leonhard" }"#),
            ("003_gauss.json", r#"{ "id": "e_1", "name": "Gauss" }"#),
        ]);

        let load = load_all(&table_dir, &schema);
        let ids: Vec<_> = load.records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["E 1"]);
        assert_eq!(load.errors.len(), 2);
        match &load.errors[0] {
            RecordError::PageCollision { page, first_id, second_id, first, second, .. } => {
                assert_eq!(page, "E_1.html");
                assert_eq!(first_id, "E 1");
                assert_eq!(second_id, "E_1");
                assert!(first.ends_with("001_euler.json"));
                assert!(second.ends_with("002_leonhard.json"));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(matches!(&load.errors[1], RecordError::PageCollision { second_id, .. } if second_id == "e_1"));
        assert!(load.errors[1].path().ends_with("003_gauss.json"));
    }

    #[test]
    fn test_field_errors_attached() {
        let (_dir, table_dir, schema) = table(&[("001_euler.json", r#"{ "id": "E1", "born": "1707" }"#)]);
        let load = load_all(&table_dir, &schema);
        let record = &load.records[0];
        assert_eq!(record.field_errors.len(), 2);
        assert!(record.field_errors.contains(&FieldError::Missing { column: "name".into() }));
    }

    #[test]
    fn test_short_name_field_and_label() {
        let mut schema = Schema::parse(PEOPLE, "people", PathBuf::from("people/schema.json")).unwrap();
        schema.short_name_field = Some("handle".into());
        schema.display_field = Some("name".into());

        let value = serde_json::json!({ "id": "E1", "name": "Leonhard Euler", "handle": "leo" });
        let record = Record::from_value(value, Path::new("people/001_euler.json"), &schema).unwrap();
        assert_eq!(record.short_name, "leo");
        assert_eq!(record.label(&schema), "Leonhard Euler");
        assert_eq!(record.qualified_id(), "people/E1");
        assert_eq!(record.page(), "people/E1.html");
    }

    #[test]
    fn test_empty_short_name_falls_back_to_id() {
        let schema = Schema::parse(PEOPLE, "people", PathBuf::from("people/schema.json")).unwrap();
        let value = serde_json::json!({ "id": "E1" });
        let record = Record::from_value(value, Path::new("people/001_.json"), &schema).unwrap();
        assert_eq!(record.short_name, "E1");
        assert_eq!(record.label(&schema), "E1");
    }
}
