//! Error taxonomy for the generation pipeline.
//!
//! Each stage owns one error type. Structural errors (`SchemaError`,
//! `BibliographyError`, duplicate ids, `WriteError`) abort the run; the rest
//! are converted into [`Diagnostic`](crate::diagnostic::Diagnostic)s and
//! reported in the run summary.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Malformed or invalid `schema.json`.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("schema file not found: `{0}`")]
    Missing(PathBuf),

    #[error("IO error when reading `{0}`")]
    Io(PathBuf, #[source] io::Error),

    #[error("malformed schema `{0}`")]
    Malformed(PathBuf, #[source] serde_json::Error),

    #[error("duplicate column `{column}` in `{path}`")]
    DuplicateColumn { path: PathBuf, column: String },

    #[error("unknown type `{kind}` for column `{column}` in `{path}`")]
    UnknownType {
        path: PathBuf,
        column: String,
        kind: String,
    },

    #[error("enum column `{column}` in `{path}` declares no options")]
    EmptyEnum { path: PathBuf, column: String },

    #[error("schema `{path}` declares table `{declared}` but lives in directory `{dir}`")]
    NameMismatch {
        path: PathBuf,
        declared: String,
        dir: String,
    },

    #[error("table name `{0}` is reserved")]
    ReservedName(String),

    #[error("table `{0}` is listed more than once")]
    DuplicateTable(String),

    #[error("column `{column}` of table `{table}` references unknown table `{target}`")]
    UnknownTable {
        table: String,
        column: String,
        target: String,
    },
}

/// A record file that could not be loaded, or an id/short-name clash.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("IO error when reading `{0}`")]
    Io(PathBuf, #[source] io::Error),

    #[error("malformed JSON in `{0}`")]
    Malformed(PathBuf, #[source] serde_json::Error),

    #[error("`{0}` is not a JSON object")]
    NotAnObject(PathBuf),

    #[error("`{0}` has no `id` field")]
    MissingId(PathBuf),

    #[error("`{0}` has an `id` that is neither a string nor an integer")]
    InvalidId(PathBuf),

    #[error("duplicate id `{id}` in table `{table}`: `{first}` and `{second}`")]
    DuplicateId {
        table: String,
        id: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("record `{id}` of table `{table}` would be written to `{page}`, the table's own page (`{path}`)")]
    ReservedPage {
        table: String,
        id: String,
        page: String,
        path: PathBuf,
    },

    #[error("records `{first_id}` and `{second_id}` of table `{table}` share the page `{page}`: `{first}` and `{second}`")]
    PageCollision {
        table: String,
        page: String,
        first_id: String,
        second_id: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("duplicate short name `{short_name}` in table `{table}`: `{first}` and `{second}`")]
    DuplicateShortName {
        table: String,
        short_name: String,
        first: PathBuf,
        second: PathBuf,
    },
}

impl RecordError {
    /// File the error is attributed to.
    pub fn path(&self) -> &Path {
        match self {
            Self::Io(path, _)
            | Self::Malformed(path, _)
            | Self::NotAnObject(path)
            | Self::MissingId(path)
            | Self::InvalidId(path)
            | Self::ReservedPage { path, .. } => path,
            Self::DuplicateId { second, .. }
            | Self::DuplicateShortName { second, .. }
            | Self::PageCollision { second, .. } => second,
        }
    }

    pub const fn is_duplicate_id(&self) -> bool {
        matches!(self, Self::DuplicateId { .. })
    }
}

/// A single field that violates its column definition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("required column `{column}` is missing")]
    Missing { column: String },

    #[error("column `{column}` expects {expected}, found {found}")]
    TypeMismatch {
        column: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("column `{column}` has value `{value}` which is not one of its options")]
    UnknownOption { column: String, value: String },

    #[error("column `{column}` may only reference {allowed}, but `{token}` resolves to `{target}`")]
    RestrictedReference {
        column: String,
        token: String,
        target: String,
        allowed: String,
    },
}

/// Malformed bibliography source.
#[derive(Debug, Error)]
pub enum BibliographyError {
    #[error("IO error when reading `{0}`")]
    Io(PathBuf, #[source] io::Error),

    #[error("malformed JSON bibliography `{0}`")]
    Json(PathBuf, #[source] serde_json::Error),

    #[error("{path}:{line}: {reason}")]
    Malformed {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("duplicate bibliography key `{key}` in `{path}`")]
    DuplicateKey { path: PathBuf, key: String },

    #[error("unsupported bibliography format `{0}` (expected .bib or .json)")]
    UnsupportedFormat(PathBuf),
}

/// A graph hook produced an unusable descriptor.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("edge `{source_id}` -> `{target_id}` references unknown node `{missing}`")]
    DanglingEdge {
        source_id: String,
        target_id: String,
        missing: String,
    },

    #[error("node `{0}` is declared more than once")]
    DuplicateNode(String),

    #[error("malformed graph hook `{0}`")]
    Malformed(PathBuf, #[source] serde_json::Error),

    #[error("IO error when reading `{0}`")]
    Io(PathBuf, #[source] io::Error),

    #[error("graph hook names unknown table `{0}`")]
    UnknownTable(String),

    #[error("graph hook names column `{column}` which is not a reference column of `{table}`")]
    UnknownColumn { table: String, column: String },

    #[error("failed to serialize graph data")]
    Serialize(#[source] serde_json::Error),
}

/// A render hook failed; the table falls back to the default renderer.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template `{template}` uses unknown placeholder `{name}`")]
    UnknownPlaceholder { template: &'static str, name: String },

    #[error("template `{template}` has an unclosed `{{{{` placeholder")]
    Unclosed { template: &'static str },

    #[error("malformed render hook `{0}`")]
    Malformed(PathBuf, #[source] serde_json::Error),

    #[error("IO error when reading `{0}`")]
    Io(PathBuf, #[source] io::Error),

    #[error("{0}")]
    Custom(String),
}

/// Output filesystem failure. Always fatal.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("failed to write `{path}`")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("page path `{0}` must be relative and stay inside the output directory")]
    InvalidPath(PathBuf),

    #[error("output directory `{0}` has no usable parent directory")]
    NoParent(PathBuf),
}

impl WriteError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error, ErrorKind};

    #[test]
    fn test_schema_error_display() {
        let err = SchemaError::UnknownType {
            path: PathBuf::from("data/people/schema.json"),
            column: "born".into(),
            kind: "datetime".into(),
        };
        let display = format!("{err}");
        assert!(display.contains("datetime"));
        assert!(display.contains("born"));
        assert!(display.contains("data/people/schema.json"));
    }

    #[test]
    fn test_record_error_path() {
        let err = RecordError::DuplicateId {
            table: "people".into(),
            id: "E1".into(),
            first: PathBuf::from("001_euler.json"),
            second: PathBuf::from("002_euler2.json"),
        };
        assert!(err.is_duplicate_id());
        assert_eq!(err.path(), Path::new("002_euler2.json"));

        let err = RecordError::Io(
            PathBuf::from("003_x.json"),
            Error::new(ErrorKind::PermissionDenied, "denied"),
        );
        assert!(!err.is_duplicate_id());
        assert_eq!(err.path(), Path::new("003_x.json"));
    }

    #[test]
    fn test_render_error_unclosed_display() {
        let err = RenderError::Unclosed { template: "row" };
        assert_eq!(
            format!("{err}"),
            "template `row` has an unclosed `{{` placeholder"
        );
    }
}
