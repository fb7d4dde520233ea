//! Site initialization module.
//!
//! Creates new site structure with default configuration.

use crate::config::SiteConfig;
use anyhow::{Context, Result, bail};
use std::{fs, path::Path};

/// Files to write ignore patterns to
const IGNORE_FILES: &[&str] = &[".gitignore", ".ignore"];

/// Default config filename
const CONFIG_FILE: &str = "marksite.toml";

/// Default site directory structure
const SITE_DIRS: &[&str] = &["contents", "templates"];

const PAGE_LAYOUT: &str = r#"<!DOCTYPE html>
<html lang="{lang}">
<head>
<meta charset="utf-8">
<title>{title} | {siteTitle}</title>
</head>
<body>
<nav><a href="{relative 'index.html'}">{siteTitle}</a> / {foreach category.breadcrumbs crumb}{crumb} / {end}</nav>
<article>
<h1>{title}</h1>
{contentBody}
</article>
<footer>{author}, {format generated '%Y-%m-%d'}</footer>
</body>
</html>
"#;

const SAMPLE_DOCUMENT: &str = "---
title: Hello
date: 2024-01-01
tags: [welcome]
---
Hello from **{siteTitle}**.

Tagged: {foreach tags tag}*{tag}* {end}
";

/// Create a new site with default structure
pub fn new_site(config: &SiteConfig, has_name: bool) -> Result<()> {
    let root = config.get_root();

    if !is_dir_empty(root)? {
        if has_name {
            bail!("Path `{}` is not empty.", root.display());
        }
        bail!(
            "Current directory is not empty. Use `marksite init <SITE_NAME>` to create in a subdirectory."
        );
    }

    init_site_structure(root)?;
    init_default_config(root)?;
    init_sample_files(root)?;
    init_ignored_files(root, &[config.build.output.as_path()])?;

    Ok(())
}

/// Check if a directory is completely empty
fn is_dir_empty(path: &Path) -> Result<bool> {
    if !path.exists() {
        return Ok(true);
    }
    Ok(fs::read_dir(path)?.next().is_none())
}

/// Write default configuration file
fn init_default_config(root: &Path) -> Result<()> {
    let content = toml::to_string_pretty(&SiteConfig::default())?;
    fs::write(root.join(CONFIG_FILE), content)?;
    Ok(())
}

/// Create site directory structure
fn init_site_structure(root: &Path) -> Result<()> {
    for dir in SITE_DIRS {
        let path = root.join(dir);
        if path.exists() {
            bail!(
                "Path `{}` already exists. Try `marksite init <SITE_NAME>` instead.",
                path.display()
            );
        }
        fs::create_dir_all(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
    }
    Ok(())
}

/// One layout and one document, enough for a first build
fn init_sample_files(root: &Path) -> Result<()> {
    let files = [
        ("templates/page.html", PAGE_LAYOUT),
        ("contents/index.md", SAMPLE_DOCUMENT),
    ];
    for (name, content) in files {
        let path = root.join(name);
        fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    }
    Ok(())
}

/// Initialize .gitignore and .ignore files with specified paths
fn init_ignored_files(root: &Path, paths: &[&Path]) -> Result<()> {
    let content = paths
        .iter()
        .map(|p| p.strip_prefix(root).unwrap_or(p))
        .filter_map(|p| p.to_str())
        .collect::<Vec<_>>()
        .join("\n");

    for filename in IGNORE_FILES {
        let path = root.join(filename);
        if !path.exists() {
            fs::write(&path, &content)?;
        }
    }

    Ok(())
}
