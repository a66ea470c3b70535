//! Optional HTML minification for generated pages.

use std::borrow::Cow;

/// Minify an HTML page when `enabled`, otherwise return it untouched.
///
/// Falls back to the original text if the minifier output is not UTF-8.
pub fn minify_html(html: &str, enabled: bool) -> Cow<'_, str> {
    if !enabled {
        return Cow::Borrowed(html);
    }
    match String::from_utf8(minify_inner(html.as_bytes())) {
        Ok(minified) => Cow::Owned(minified),
        Err(_) => Cow::Borrowed(html),
    }
}

/// Minify HTML content using `minify_html` crate.
///
/// Inline scripts are left alone: graph pages embed their descriptor as a
/// JSON script block.
fn minify_inner(html: &[u8]) -> Vec<u8> {
    let mut cfg = minify_html::Cfg::new();
    cfg.keep_closing_tags = true;
    cfg.keep_html_and_head_opening_tags = true;
    cfg.keep_comments = false;
    cfg.minify_css = true;
    cfg.minify_js = false;
    minify_html::minify(html, &cfg)
}
