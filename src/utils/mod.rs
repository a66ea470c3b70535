//! Small shared helpers: HTML escaping, slugs, minification.

pub mod html;
pub mod minify;
pub mod slug;
