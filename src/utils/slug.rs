//! File-name and anchor slugification.
//!
//! Record ids and bibliography keys become output file names and HTML
//! anchors, so both are reduced to a portable character set.

use deunicode::deunicode;

/// Characters kept verbatim in slugs besides ASCII alphanumerics.
const KEPT_CHARS: &[char] = &['-', '_', '.'];

/// Reduce arbitrary text to `[A-Za-z0-9._-]`.
///
/// Non-ASCII text is transliterated first; every other character becomes `_`.
/// Leading dots are stripped so a slug never names a hidden file.
pub fn sanitize(text: &str) -> String {
    let ascii = deunicode(text.trim());
    let slug: String = ascii
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || KEPT_CHARS.contains(&c) {
                c
            } else {
                '_'
            }
        })
        .collect();
    let slug = slug.trim_start_matches('.');
    if slug.is_empty() {
        "_".to_owned()
    } else {
        slug.to_owned()
    }
}

/// File name of a table's own page inside its directory.
pub const TABLE_PAGE: &str = "index.html";

/// Output file name of a record page: `E1` → `E1.html`.
pub fn record_page(id: &str) -> String {
    format!("{}.html", sanitize(id))
}

/// HTML anchor for a bibliography entry: `gauss1801` → `bib-gauss1801`.
pub fn bib_anchor(key: &str) -> String {
    format!("bib-{}", sanitize(key))
}

/// HTML anchor for a record inside its table page: `E1` → `rec-E1`.
pub fn record_anchor(id: &str) -> String {
    format!("rec-{}", sanitize(id))
}
