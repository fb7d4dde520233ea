//! Slash-normalized paths used inside documents.

use crate::expr::Value;
use std::{
    fmt,
    path::{Component, Path, PathBuf},
};

/// A normalized, `/`-separated relative path.
///
/// The OS form is only produced at the I/O boundary via [`to_physical`](Self::to_physical).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PathEntry {
    segments: Vec<String>,
}

impl PathEntry {
    /// Parse `a/b\c` style text, folding `.` and `..` segments.
    pub fn parse(text: &str) -> Self {
        Self::from_segments(text.split(['/', '\\']))
    }

    /// Build from an OS path relative to some root.
    pub fn from_path(path: &Path) -> Self {
        Self::from_segments(path.components().filter_map(|c| match c {
            Component::Normal(part) => part.to_str(),
            Component::ParentDir => Some(".."),
            _ => None,
        }))
    }

    fn from_segments<'a>(parts: impl IntoIterator<Item = &'a str>) -> Self {
        let mut segments: Vec<String> = Vec::new();
        for part in parts {
            match part {
                "" | "." => {}
                ".." if segments.last().is_some_and(|s| s != "..") => {
                    segments.pop();
                }
                _ => segments.push(part.to_owned()),
            }
        }
        Self { segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Last segment, i.e. the file name.
    pub fn name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// File name without extension.
    pub fn stem(&self) -> Option<&str> {
        let name = self.name()?;
        Some(match name.rfind('.') {
            Some(0) | None => name,
            Some(dot) => &name[..dot],
        })
    }

    /// All segments except the last.
    pub fn directory(&self) -> Self {
        let len = self.segments.len().saturating_sub(1);
        Self {
            segments: self.segments[..len].to_vec(),
        }
    }

    /// Replace the extension of the last segment.
    pub fn with_extension(&self, extension: &str) -> Self {
        let mut segments = self.segments.clone();
        if let Some(stem) = self.stem() {
            let stem = stem.to_owned();
            if let Some(last) = segments.last_mut() {
                *last = format!("{stem}.{extension}");
            }
        }
        Self { segments }
    }

    pub fn join(&self, other: &PathEntry) -> Self {
        Self::from_segments(
            self.segments
                .iter()
                .chain(other.segments.iter())
                .map(String::as_str),
        )
    }

    /// Path from the directory holding `from` to `to`.
    ///
    /// ```ignore
    /// relative("blog/a/index.html", "images/x.png") // "../../images/x.png"
    /// ```
    pub fn relative(from: &PathEntry, to: &PathEntry) -> String {
        let base = &from.segments[..from.segments.len().saturating_sub(1)];
        let common = base
            .iter()
            .zip(to.segments.iter())
            .take_while(|(a, b)| a == b)
            .count();

        let ups = base.len() - common;
        let mut parts: Vec<&str> = std::iter::repeat_n("..", ups).collect();
        parts.extend(to.segments[common..].iter().map(String::as_str));
        if parts.is_empty() {
            return ".".to_owned();
        }
        parts.join("/")
    }

    /// OS path under `root`.
    pub fn to_physical(&self, root: &Path) -> PathBuf {
        self.segments
            .iter()
            .fold(root.to_path_buf(), |path, segment| path.join(segment))
    }

    pub(super) fn property(&self, name: &str) -> Option<Value> {
        match name {
            "name" => Some(self.name().map_or(Value::Null, Value::from)),
            "stem" => Some(self.stem().map_or(Value::Null, Value::from)),
            "directory" => Some(Value::Entry(self.directory().into())),
            _ => None,
        }
    }
}

impl fmt::Display for PathEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}
