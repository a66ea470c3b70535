//! Table schemas (`schema.json`) and record validation.
//!
//! # Format
//!
//! ```json
//! {
//!   "table_name": "equations",
//!   "description": "Famous equations",
//!   "display_field": "name",
//!   "columns": [
//!     { "name": "id", "type": "integer", "required": true },
//!     { "name": "name", "type": "string", "required": true },
//!     { "name": "equation", "type": "latex" },
//!     { "name": "author", "type": "reference", "tables": ["people"] },
//!     { "name": "category", "type": "enum",
//!       "enum": [{ "value": "algebra", "display_name": "Algebra" }] }
//!   ]
//! }
//! ```
//!
//! Column types form a closed set ([`ColumnType`]); an unknown `type` string is
//! rejected when the schema is loaded.

use crate::error::{FieldError, SchemaError};
use crate::utils::html::title_case;
use compact_str::CompactString;
use rustc_hash::FxHashSet;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// File name of a table's schema inside its directory.
pub const SCHEMA_FILE: &str = "schema.json";

// ============================================================================
// Types
// ============================================================================

/// One selectable value of an `enum` column.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EnumOption {
    pub value: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl EnumOption {
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.value)
    }
}

/// Constraints of a `reference` column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceSpec {
    /// Allowed target tables. Empty means any table or bibliography entry.
    pub tables: Vec<CompactString>,
    /// Whether `null` is an acceptable value even when the column is required.
    pub nullable: bool,
}

impl ReferenceSpec {
    pub fn is_restricted(&self) -> bool {
        !self.tables.is_empty()
    }

    pub fn allows(&self, table: &str) -> bool {
        !self.is_restricted() || self.tables.iter().any(|t| t == table)
    }
}

/// The type of a column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnType {
    /// Short text; hashtags inside are resolved.
    String,
    /// Long free text; hashtags inside are resolved.
    Text,
    /// LaTeX source; hashtags and `\cite{}` inside are resolved.
    Latex,
    Number,
    Integer,
    Boolean,
    Enum(Vec<EnumOption>),
    /// Array of strings, each resolved like `Text`.
    List,
    Reference(ReferenceSpec),
}

impl ColumnType {
    /// Human-readable name used in type-mismatch messages.
    pub const fn expected(&self) -> &'static str {
        match self {
            Self::String | Self::Text | Self::Latex => "a string",
            Self::Number => "a number",
            Self::Integer => "an integer",
            Self::Boolean => "a boolean",
            Self::Enum(_) => "one of the enum values",
            Self::List => "an array of strings",
            Self::Reference(_) => "a reference string or array of references",
        }
    }

    pub const fn is_reference(&self) -> bool {
        matches!(self, Self::Reference(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub kind: ColumnType,
    pub description: String,
    pub required: bool,
}

impl Column {
    pub fn reference(&self) -> Option<&ReferenceSpec> {
        match &self.kind {
            ColumnType::Reference(spec) => Some(spec),
            _ => None,
        }
    }
}

/// Parsed and validated `schema.json`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    pub table_name: CompactString,
    pub title: String,
    pub description: String,
    pub columns: Vec<Column>,
    /// Record field holding the short name (default: derived from the file name).
    pub short_name_field: Option<String>,
    /// Record field used as the record's label in links and headings.
    pub display_field: Option<String>,
    /// Location of the schema file.
    pub path: PathBuf,
}

// ============================================================================
// Raw (on-disk) representation
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawSchema {
    #[serde(default)]
    table_name: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    columns: Vec<RawColumn>,
    #[serde(default)]
    short_name_field: Option<String>,
    #[serde(default)]
    display_field: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawColumn {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    required: bool,
    #[serde(default)]
    tables: Vec<CompactString>,
    #[serde(default)]
    nullable: bool,
    #[serde(default, rename = "enum")]
    options: Vec<EnumOption>,
}

impl RawColumn {
    fn into_column(self, path: &Path) -> Result<Column, SchemaError> {
        let kind = match self.kind.as_str() {
            "string" => ColumnType::String,
            "text" => ColumnType::Text,
            "latex" => ColumnType::Latex,
            "number" => ColumnType::Number,
            "integer" => ColumnType::Integer,
            "boolean" => ColumnType::Boolean,
            "list" => ColumnType::List,
            "enum" if self.options.is_empty() => {
                return Err(SchemaError::EmptyEnum {
                    path: path.to_path_buf(),
                    column: self.name,
                });
            }
            "enum" => ColumnType::Enum(self.options),
            "reference" => ColumnType::Reference(ReferenceSpec {
                tables: self.tables,
                nullable: self.nullable,
            }),
            _ => {
                return Err(SchemaError::UnknownType {
                    path: path.to_path_buf(),
                    column: self.name,
                    kind: self.kind,
                });
            }
        };

        Ok(Column {
            name: self.name,
            kind,
            description: self.description,
            required: self.required,
        })
    }
}

// ============================================================================
// Loading
// ============================================================================

impl Schema {
    /// Load `schema.json` from a table directory.
    ///
    /// The table name defaults to the directory name; an explicit
    /// `table_name` must agree with it.
    pub fn load(table_dir: &Path) -> Result<Self, SchemaError> {
        let path = table_dir.join(SCHEMA_FILE);
        let content = fs::read_to_string(&path).map_err(|err| match err.kind() {
            ErrorKind::NotFound => SchemaError::Missing(path.clone()),
            _ => SchemaError::Io(path.clone(), err),
        })?;

        let dir_name = table_dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self::parse(&content, &dir_name, path)
    }

    /// Parse schema JSON for the table stored in directory `dir_name`.
    pub fn parse(content: &str, dir_name: &str, path: PathBuf) -> Result<Self, SchemaError> {
        let raw: RawSchema =
            serde_json::from_str(content).map_err(|err| SchemaError::Malformed(path.clone(), err))?;

        let table_name = match raw.table_name {
            Some(declared) if declared != dir_name => {
                return Err(SchemaError::NameMismatch {
                    path,
                    declared,
                    dir: dir_name.to_owned(),
                });
            }
            Some(declared) => declared,
            None => dir_name.to_owned(),
        };

        let mut seen = FxHashSet::default();
        let mut columns = Vec::with_capacity(raw.columns.len());
        for raw_column in raw.columns {
            if !seen.insert(raw_column.name.clone()) {
                return Err(SchemaError::DuplicateColumn {
                    path,
                    column: raw_column.name,
                });
            }
            columns.push(raw_column.into_column(&path)?);
        }

        Ok(Self {
            title: raw.title.unwrap_or_else(|| title_case(&table_name)),
            table_name: table_name.into(),
            description: raw.description,
            columns,
            short_name_field: raw.short_name_field,
            display_field: raw.display_field,
            path,
        })
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn reference_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.kind.is_reference())
    }
}

// ============================================================================
// Validation
// ============================================================================

/// Check a record's fields against its schema.
///
/// Reference columns are only shape-checked here; whether they resolve is
/// decided once the global index exists.
pub fn validate(fields: &Map<String, Value>, schema: &Schema) -> Vec<FieldError> {
    let mut errors = Vec::new();

    for column in &schema.columns {
        match fields.get(&column.name) {
            None | Some(Value::Null) => {
                let nullable = column.reference().is_some_and(|spec| spec.nullable);
                if column.required && !nullable {
                    errors.push(FieldError::Missing {
                        column: column.name.clone(),
                    });
                }
            }
            Some(value) => {
                if let Some(err) = check_value(column, value) {
                    errors.push(err);
                }
            }
        }
    }

    errors
}

fn check_value(column: &Column, value: &Value) -> Option<FieldError> {
    let matches = match (&column.kind, value) {
        (ColumnType::String | ColumnType::Text | ColumnType::Latex, Value::String(_)) => true,
        (ColumnType::Number, Value::Number(_)) => true,
        (ColumnType::Integer, Value::Number(n)) => n.is_i64() || n.is_u64(),
        (ColumnType::Boolean, Value::Bool(_)) => true,
        (ColumnType::List, Value::Array(items)) => items.iter().all(Value::is_string),
        (ColumnType::Reference(_), Value::String(_)) => true,
        (ColumnType::Reference(_), Value::Array(items)) => items.iter().all(Value::is_string),
        (ColumnType::Enum(options), Value::String(s)) => {
            if options.iter().any(|o| &o.value == s) {
                true
            } else {
                return Some(FieldError::UnknownOption {
                    column: column.name.clone(),
                    value: s.clone(),
                });
            }
        }
        _ => false,
    };

    (!matches).then(|| FieldError::TypeMismatch {
        column: column.name.clone(),
        expected: column.kind.expected(),
        found: json_kind(value),
    })
}

/// Name of a JSON value's type, for messages.
pub const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ============================================================================
// Tests
// ============================================================================
