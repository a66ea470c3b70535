//! Shared page chrome: head, navigation, footer.

use crate::utils::html::{escape, escape_attr};

/// MathJax loader; LaTeX fields are typeset client-side.
const MATHJAX: &str = r#"<script>window.MathJax = { tex: { inlineMath: [["$", "$"], ["\\(", "\\)"]] } };</script>
<script id="MathJax-script" async src="https://cdn.jsdelivr.net/npm/mathjax@3/es5/tex-mml-chtml.js"></script>"#;

/// One navigation entry, `path` relative to the site root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavItem {
    pub title: String,
    pub path: String,
}

impl NavItem {
    pub fn new(title: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            path: path.into(),
        }
    }
}

/// Site-wide page template.
#[derive(Debug, Clone, Default)]
pub struct Layout {
    pub site_title: String,
    pub subtitle: String,
    pub footer: String,
    pub nav: Vec<NavItem>,
}

impl Layout {
    /// Wrap `body` into a full document.
    ///
    /// `root` is the relative path back to the site root: `""` for top-level
    /// pages, `"../"` for pages inside a table directory.
    pub fn render(&self, title: &str, root: &str, body: &str) -> String {
        let page_title = if title.is_empty() || title == self.site_title {
            escape(&self.site_title)
        } else {
            format!("{} | {}", escape(title), escape(&self.site_title))
        };

        let mut nav = format!(
            "<a href=\"{}index.html\">Home</a>",
            escape_attr(root)
        );
        for item in &self.nav {
            nav.push_str(&format!(
                "\n<a href=\"{}{}\">{}</a>",
                escape_attr(root),
                escape_attr(&item.path),
                escape(&item.title)
            ));
        }

        let subtitle = if self.subtitle.is_empty() {
            String::new()
        } else {
            format!("\n<p class=\"subtitle\">{}</p>", escape(&self.subtitle))
        };

        let footer = if self.footer.is_empty() {
            String::new()
        } else {
            format!("<footer>{}</footer>\n", self.footer)
        };

        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>{page_title}</title>
<link rel="stylesheet" href="{root}styles.css">
{MATHJAX}
</head>
<body>
<header>
<a class="site-title" href="{root}index.html">{site_title}</a>{subtitle}
<nav>
{nav}
</nav>
</header>
<main>
{body}
</main>
{footer}</body>
</html>
"#,
            root = escape_attr(root),
            site_title = escape(&self.site_title),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> Layout {
        Layout {
            site_title: "Mathematics Database".into(),
            subtitle: "Equations & people".into(),
            footer: "Built from <code>data/</code>".into(),
            nav: vec![NavItem::new("People", "people/index.html")],
        }
    }

    #[test]
    fn test_render_top_level_page() {
        let html = layout().render("Mathematics Database", "", "<p>hi</p>");
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<title>Mathematics Database</title>"));
        assert!(html.contains("href=\"styles.css\""));
        assert!(html.contains("<a href=\"people/index.html\">People</a>"));
        assert!(html.contains("<p class=\"subtitle\">Equations &amp; people</p>"));
        assert!(html.contains("<footer>Built from <code>data/</code></footer>"));
        assert!(html.contains("mathjax@3"));
    }

    #[test]
    fn test_render_nested_page() {
        let html = layout().render("People", "../", "");
        assert!(html.contains("<title>People | Mathematics Database</title>"));
        assert!(html.contains("href=\"../styles.css\""));
        assert!(html.contains("<a href=\"../index.html\">Home</a>"));
        assert!(html.contains("<a href=\"../people/index.html\">People</a>"));
    }
}
