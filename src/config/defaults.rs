//! Default values for configuration fields.
//!
//! These functions are used by serde for default deserialization.

// ============================================================================
// Common Defaults
// ============================================================================

pub fn r#false() -> bool {
    false
}

// ============================================================================
// main.json Defaults
// ============================================================================

pub mod site {
    use std::path::PathBuf;

    pub fn title() -> String {
        "Mathematics Database".into()
    }

    pub fn footer() -> String {
        "Generated by mathdb".into()
    }

    pub fn static_dir() -> PathBuf {
        "static".into()
    }

    pub fn base_url() -> Option<String> {
        None
    }

    pub mod bibliography {
        pub fn title() -> String {
            "Bibliography".into()
        }
    }
}

// ============================================================================
// Build Defaults
// ============================================================================

pub mod build {
    use std::path::PathBuf;

    pub fn config_file() -> PathBuf {
        "main.json".into()
    }

    pub fn output_dir() -> PathBuf {
        "docs".into()
    }
}
