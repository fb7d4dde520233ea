//! Site configuration management for `marksite.toml`.
//!
//! # Sections
//!
//! | Section      | Purpose                                         |
//! |--------------|-------------------------------------------------|
//! | `[base]`     | Site title, author, language, timezone          |
//! | `[build]`    | Content roots, output and layout directories    |
//! | `[metadata]` | Extra root-context bindings                     |
//!
//! # Example
//!
//! ```toml
//! [base]
//! title = "My site"
//! timezone = "+09:00"
//!
//! [build]
//! content = ["contents"]
//! output = "docs"
//!
//! [metadata]
//! siteUrl = "https://example.com"
//! ```

mod base;
mod build;
pub mod defaults;
mod error;

pub use base::BaseConfig;
pub use build::BuildConfig;
pub use error::ConfigError;

use crate::cli::{BuildArgs, Cli, Commands};
use crate::expr::{
    Expr, Value,
    parser::{is_identifier, parse_date},
};
use anyhow::{Result, bail};
use chrono::{FixedOffset, Offset, Utc};
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration structure representing marksite.toml
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct SiteConfig {
    /// Absolute path to the config file (set after loading)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Site-wide values
    #[serde(default)]
    pub base: BaseConfig,

    /// Build settings
    #[serde(default)]
    pub build: BuildConfig,

    /// Extra root-context bindings
    #[serde(default)]
    pub metadata: BTreeMap<String, toml::Value>,
}

impl SiteConfig {
    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self> {
        let config: SiteConfig = toml::from_str(content).map_err(ConfigError::from)?;
        Ok(config)
    }

    /// Load configuration from file path
    pub fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        Self::from_str(&content)
    }

    /// Get the root directory path
    pub fn get_root(&self) -> &Path {
        self.build.root.as_deref().unwrap_or(Path::new("./"))
    }

    /// Set the root directory path
    pub fn set_root(&mut self, path: &Path) {
        self.build.root = Some(path.to_path_buf())
    }

    /// The `[base].timezone` offset, UTC when it does not parse.
    pub fn timezone(&self) -> FixedOffset {
        self.base.offset().unwrap_or_else(|| Utc.fix())
    }

    /// Update configuration with CLI arguments
    pub fn update_with_cli(&mut self, cli: &Cli) {
        let base = cli
            .root
            .as_ref()
            .cloned()
            .unwrap_or_else(|| self.get_root().to_owned());
        let root = match &cli.command {
            Commands::Init { name: Some(name) } => base.join(name),
            _ => base,
        };

        if let Commands::Build { build_args } = &cli.command {
            self.apply_build_args(build_args);
        }

        self.update_path_with_root(&root, &cli.config);
    }

    fn apply_build_args(&mut self, args: &BuildArgs) {
        Self::update_option(&mut self.build.output, args.output.as_ref());
        if !args.content.is_empty() {
            self.build.content = args.content.clone();
        }
        if args.clean {
            self.build.clean = true;
        }
    }

    /// Update config option if CLI value is provided
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    /// Update all paths relative to root directory and normalize to absolute paths
    fn update_path_with_root(&mut self, root: &Path, config: &Path) {
        let root = Self::normalize_path(root);
        self.set_root(&root);

        self.config_path = Self::normalize_path(&root.join(config));
        self.build.content = self
            .build
            .content
            .iter()
            .map(|dir| Self::normalize_path(&root.join(dir)))
            .collect();
        self.build.output = Self::normalize_path(&root.join(&self.build.output));
        self.build.templates = Self::normalize_path(&root.join(&self.build.templates));
    }

    /// Normalize a path to absolute, using canonicalize if the path exists
    fn normalize_path(path: &Path) -> PathBuf {
        path.canonicalize().unwrap_or_else(|_| {
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                std::env::current_dir()
                    .map(|cwd| cwd.join(path))
                    .unwrap_or_else(|_| path.to_path_buf())
            }
        })
    }

    /// Validate configuration before a build
    pub fn validate(&self) -> Result<()> {
        if self.build.content.is_empty() {
            bail!(ConfigError::Validation(
                "[build.content] must name at least one directory".into()
            ));
        }
        for dir in &self.build.content {
            if !dir.is_dir() {
                bail!(ConfigError::Validation(format!(
                    "[build.content] `{}` is not a directory",
                    dir.display()
                )));
            }
        }
        if !self.build.templates.is_dir() {
            bail!(ConfigError::Validation(format!(
                "[build.templates] `{}` is not a directory",
                self.build.templates.display()
            )));
        }

        if self.base.offset().is_none() {
            bail!(ConfigError::Validation(format!(
                "[base.timezone] `{}` must be an offset like +09:00",
                self.base.timezone
            )));
        }

        for (name, value) in &self.metadata {
            if !is_identifier(name) {
                bail!(ConfigError::Validation(format!(
                    "[metadata] `{name}` is not a valid name"
                )));
            }
            if metadata_value(value).is_none() {
                bail!(ConfigError::Validation(format!(
                    "[metadata.{name}] tables are not supported"
                )));
            }
        }

        Ok(())
    }

    /// `[metadata]` entries as root-context bindings.
    pub fn metadata_bindings(&self) -> impl Iterator<Item = (&str, Expr)> {
        self.metadata
            .iter()
            .filter_map(|(name, value)| Some((name.as_str(), Expr::Value(metadata_value(value)?))))
    }
}

/// Convert a TOML value to a runtime value. Tables have no counterpart.
fn metadata_value(value: &toml::Value) -> Option<Value> {
    Some(match value {
        toml::Value::String(text) => Value::Str(text.clone()),
        toml::Value::Integer(i) => Value::Int(*i),
        toml::Value::Float(f) => Value::Float(*f),
        toml::Value::Boolean(b) => Value::Bool(*b),
        toml::Value::Datetime(datetime) => {
            let text = datetime.to_string();
            parse_date(&text).map_or(Value::Str(text), Value::Date)
        }
        toml::Value::Array(items) => {
            Value::List(items.iter().map(metadata_value).collect::<Option<_>>()?)
        }
        toml::Value::Table(_) => return None,
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_from_str_full() {
        let config = SiteConfig::from_str(
            r#"
            [base]
            title = "Site"

            [build]
            content = ["a", "b"]

            [metadata]
            siteUrl = "https://example.com"
            year = 2024
            "#,
        )
        .unwrap();
        assert_eq!(config.base.title, "Site");
        assert_eq!(config.build.content.len(), 2);
        assert_eq!(config.metadata.len(), 2);
    }

    #[test]
    fn test_from_str_rejects_unknown_section() {
        let err = SiteConfig::from_str("[serve]\nport = 1").unwrap_err();
        assert!(err.downcast_ref::<ConfigError>().is_some());
    }

    #[test]
    fn test_from_path_missing() {
        let err = SiteConfig::from_path(Path::new("/nonexistent/marksite.toml")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::Io(..))
        ));
    }

    #[test]
    fn test_metadata_bindings() {
        let config = SiteConfig::from_str(
            r#"
            [metadata]
            siteUrl = "https://example.com"
            ratio = 1.5
            released = 2024-01-02
            list = [1, "two"]
            "#,
        )
        .unwrap();
        let bindings: BTreeMap<_, _> = config.metadata_bindings().collect();
        assert_eq!(bindings["siteUrl"], Expr::value("https://example.com"));
        assert_eq!(bindings["ratio"], Expr::value(1.5));
        assert!(matches!(bindings["released"], Expr::Value(Value::Date(_))));
        assert_eq!(
            bindings["list"],
            Expr::Value(Value::List(vec![Value::Int(1), Value::from("two")]))
        );
    }

    #[test]
    fn test_update_with_cli_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let cli = Cli::parse_from([
            "marksite",
            "--root",
            dir.path().to_str().unwrap(),
            "build",
            "--clean",
            "-o",
            "public",
            "posts",
            "pages",
        ]);
        let mut config = SiteConfig::default();
        config.update_with_cli(&cli);

        let root = dir.path().canonicalize().unwrap();
        assert!(config.build.clean);
        assert_eq!(config.build.output, root.join("public"));
        assert_eq!(
            config.build.content,
            vec![root.join("posts"), root.join("pages")]
        );
        assert_eq!(config.config_path, root.join("marksite.toml"));
        assert_eq!(config.build.templates, root.join("templates"));
    }

    #[test]
    fn test_update_with_cli_init_name() {
        let dir = tempfile::tempdir().unwrap();
        let cli = Cli::parse_from(["marksite", "--root", dir.path().to_str().unwrap(), "init", "blog"]);
        let mut config = SiteConfig::default();
        config.update_with_cli(&cli);
        assert_eq!(config.get_root(), dir.path().canonicalize().unwrap().join("blog"));
    }

    #[test]
    fn test_validate() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("contents")).unwrap();
        fs::create_dir(dir.path().join("templates")).unwrap();
        let cli = Cli::parse_from(["marksite", "--root", dir.path().to_str().unwrap(), "build"]);

        let mut config = SiteConfig::default();
        config.update_with_cli(&cli);
        config.validate().unwrap();

        let mut bad = config.clone();
        bad.base.timezone = "JST".into();
        assert!(bad.validate().is_err());

        let mut bad = config.clone();
        bad.build.content.clear();
        assert!(bad.validate().is_err());

        let mut bad = config.clone();
        bad.metadata.insert("nested".into(), toml::Value::Table(Default::default()));
        assert!(bad.validate().is_err());

        let mut bad = config;
        bad.build.content.push(dir.path().join("missing"));
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_default_round_trips_through_toml() {
        let text = toml::to_string_pretty(&SiteConfig::default()).unwrap();
        let config = SiteConfig::from_str(&text).unwrap();
        assert_eq!(config.base.lang, "en-US");
        assert_eq!(config.build.content, vec![PathBuf::from("contents")]);
    }
}
