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
// [base] Section Defaults
// ============================================================================

pub mod base {
    pub fn author() -> String {
        "<YOUR_NAME>".into()
    }

    pub fn lang() -> String {
        "en-US".into()
    }

    pub fn timezone() -> String {
        "+00:00".into()
    }
}

// ============================================================================
// [build] Section Defaults
// ============================================================================

pub mod build {
    use std::path::PathBuf;

    pub fn root() -> Option<PathBuf> {
        None
    }

    pub fn content() -> Vec<PathBuf> {
        vec!["contents".into()]
    }

    pub fn output() -> PathBuf {
        "docs".into()
    }

    pub fn templates() -> PathBuf {
        "templates".into()
    }
}
