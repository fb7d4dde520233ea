//! marksite: markdown trees rendered to static HTML through an embedded
//! expression and template language.
//!
//! ```text
//! markdown ──► header (expr) ──► MetadataContext ──► Reducer
//!     │                                                 │
//!     └──► body (template) ──► pulldown-cmark ──► layout (template) ──► html
//! ```

pub mod aggregate;
pub mod build;
pub mod builtins;
pub mod cli;
pub mod config;
pub mod dirs;
pub mod entry;
pub mod error;
pub mod expr;
pub mod init;
pub mod logger;
pub mod markdown;
pub mod template;

pub use error::{Error, Result};
