//! Global Index: every resolvable name of every record and bibliography entry.
//!
//! Built once per run after all tables and the bibliography are loaded, then
//! shared read-only by every resolution and rendering stage.
//!
//! # Token forms
//!
//! | Form               | Example            | Ambiguity                     |
//! |--------------------|--------------------|-------------------------------|
//! | `table/id`         | `people/E1`        | never                         |
//! | `table/short_name` | `people/euler`     | never (id form wins)          |
//! | `bib/key`          | `bib/gauss1801`    | never                         |
//! | `id`               | `E1`               | when shared by several tables |
//! | `short_name`       | `euler`            | when shared by several tables |
//! | `key`              | `gauss1801`        | when it also names a record   |
//!
//! Bare precedence: a unique id beats any short name, a unique short name
//! comes next, several candidates make the token ambiguous.

use crate::bibliography::{BIBLIOGRAPHY_PAGE, BibliographyEntry};
use crate::record::Record;
use crate::schema::Schema;
use crate::utils::slug;
use compact_str::CompactString;
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

/// Namespace of bibliography entries in qualified tokens.
pub const BIB_NAMESPACE: &str = "bib";

type Candidates = SmallVec<[usize; 2]>;

/// Something a token can point at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Record {
        table: CompactString,
        id: CompactString,
        short_name: CompactString,
        label: String,
    },
    Bib {
        key: CompactString,
    },
}

impl Target {
    /// Namespace of the target: its table, or `bib`.
    pub fn table(&self) -> &str {
        match self {
            Self::Record { table, .. } => table,
            Self::Bib { .. } => BIB_NAMESPACE,
        }
    }

    /// Canonical token: `people/E1`, `bib/gauss1801`.
    pub fn qualified(&self) -> String {
        match self {
            Self::Record { table, id, .. } => format!("{table}/{id}"),
            Self::Bib { key } => format!("{BIB_NAMESPACE}/{key}"),
        }
    }

    /// Output path relative to the site root: `people/E1.html`,
    /// `bibliography.html#bib-gauss1801`.
    pub fn path(&self) -> String {
        match self {
            Self::Record { table, id, .. } => format!("{table}/{}", slug::record_page(id)),
            Self::Bib { key } => format!("{BIBLIOGRAPHY_PAGE}#{}", slug::bib_anchor(key)),
        }
    }

    /// Link to the target from a page under `link_root`.
    pub fn href(&self, link_root: &str) -> String {
        format!("{link_root}{}", self.path())
    }

    /// Link text.
    pub fn display(&self) -> String {
        match self {
            Self::Record { label, .. } => label.clone(),
            Self::Bib { key } => format!("[{key}]"),
        }
    }

    pub const fn is_bib(&self) -> bool {
        matches!(self, Self::Bib { .. })
    }
}

/// Outcome of looking a token up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<'a> {
    Found(&'a Target),
    /// Candidates in registration order.
    Ambiguous(Vec<&'a Target>),
    Missing,
}

impl<'a> Lookup<'a> {
    pub fn found(&self) -> Option<&'a Target> {
        match self {
            Self::Found(target) => Some(*target),
            _ => None,
        }
    }

    pub const fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }
}

/// Immutable name → target registry.
#[derive(Debug, Default)]
pub struct Index {
    targets: Vec<Target>,
    tables: FxHashSet<CompactString>,
    /// `table/id`, `table/short_name` and `bib/key`.
    qualified: FxHashMap<String, usize>,
    bare_ids: FxHashMap<CompactString, Candidates>,
    bare_names: FxHashMap<CompactString, Candidates>,
    bare_bib: FxHashMap<CompactString, usize>,
}

impl Index {
    /// Register every record (in table order, then record order) and every
    /// bibliography entry (in file order).
    ///
    /// Duplicate ids must have been rejected already; if one slips through,
    /// the first record keeps the qualified id form.
    pub fn build<'a>(
        tables: impl IntoIterator<Item = (&'a Schema, &'a [Record])>,
        bibliography: &[BibliographyEntry],
    ) -> Self {
        let mut index = Self::default();

        for (schema, records) in tables {
            index.tables.insert(schema.table_name.clone());
            let first = index.targets.len();

            for record in records {
                let slot = index.targets.len();
                index.targets.push(Target::Record {
                    table: schema.table_name.clone(),
                    id: record.id.clone(),
                    short_name: record.short_name.clone(),
                    label: record.label(schema),
                });
                index
                    .qualified
                    .entry(record.qualified_id())
                    .or_insert(slot);
                index.bare_ids.entry(record.id.clone()).or_default().push(slot);
            }

            // Short names after all ids so `table/X` prefers the record whose id is X.
            for (offset, record) in records.iter().enumerate() {
                let slot = first + offset;
                index
                    .qualified
                    .entry(format!("{}/{}", schema.table_name, record.short_name))
                    .or_insert(slot);
                if record.short_name != record.id {
                    index
                        .bare_names
                        .entry(record.short_name.clone())
                        .or_default()
                        .push(slot);
                }
            }
        }

        for entry in bibliography {
            let slot = index.targets.len();
            index.targets.push(Target::Bib {
                key: entry.key.clone(),
            });
            index
                .qualified
                .entry(format!("{BIB_NAMESPACE}/{}", entry.key))
                .or_insert(slot);
            index.bare_bib.entry(entry.key.clone()).or_insert(slot);
        }

        index
    }

    /// Whether `name` may prefix a qualified token.
    pub fn is_namespace(&self, name: &str) -> bool {
        name == BIB_NAMESPACE || self.tables.contains(name)
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.tables.contains(name)
    }

    /// Look up `namespace/token`. Never ambiguous.
    pub fn lookup_qualified(&self, namespace: &str, token: &str) -> Lookup<'_> {
        match self.qualified.get(&format!("{namespace}/{token}")) {
            Some(&slot) => Lookup::Found(&self.targets[slot]),
            None => Lookup::Missing,
        }
    }

    /// Look up a bare token with the id > short name > ambiguous precedence.
    pub fn lookup_bare(&self, token: &str) -> Lookup<'_> {
        self.lookup_bare_where(token, |_| true)
    }

    /// Like [`lookup_bare`](Self::lookup_bare), considering only targets
    /// accepted by `keep`.
    pub fn lookup_bare_where(&self, token: &str, keep: impl Fn(&Target) -> bool) -> Lookup<'_> {
        let select = |slots: Option<&Candidates>| -> Vec<&Target> {
            slots
                .into_iter()
                .flatten()
                .map(|&slot| &self.targets[slot])
                .filter(|target| keep(*target))
                .collect()
        };

        let ids = select(self.bare_ids.get(token));
        let names = select(self.bare_names.get(token));
        let bib = self
            .bare_bib
            .get(token)
            .map(|&slot| &self.targets[slot])
            .filter(|target| keep(*target));

        if let Some(bib) = bib {
            if ids.is_empty() && names.is_empty() {
                return Lookup::Found(bib);
            }
            let mut candidates = ids;
            candidates.extend(names);
            candidates.push(bib);
            return Lookup::Ambiguous(candidates);
        }

        match (ids.len(), names.len()) {
            (1, _) => Lookup::Found(ids[0]),
            (0, 0) => Lookup::Missing,
            (0, 1) => Lookup::Found(names[0]),
            (0, _) => Lookup::Ambiguous(names),
            _ => {
                let mut candidates = ids;
                candidates.extend(names);
                Lookup::Ambiguous(candidates)
            }
        }
    }

    /// Whether a bare token names anything at all, ambiguous or not.
    pub fn contains_bare(&self, token: &str) -> bool {
        self.bare_ids.contains_key(token)
            || self.bare_names.contains_key(token)
            || self.bare_bib.contains_key(token)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Every registered target, in registration order.
    pub fn targets(&self) -> impl Iterator<Item = &Target> {
        self.targets.iter()
    }
}

// ============================================================================
// Tests
// ============================================================================
