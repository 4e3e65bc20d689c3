// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Locates a composition file by `(name, type)` and parses it (spec.md
//! §4.5). Markdown files carry a `---`-delimited YAML frontmatter header
//! for metadata; the body becomes a synthetic `_body` component.

use ksi_core::{Component, ComponentSource, Composition, CompositionType};
use std::path::{Path, PathBuf};

const EXTENSIONS: &[&str] = &["yaml", "yml", "md", "json"];

#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    #[error("composition not found: {name} ({type_:?})")]
    NotFound { name: String, type_: CompositionType },
    #[error("io error reading {path}: {source}")]
    Io { path: PathBuf, #[source] source: std::io::Error },
    #[error("invalid yaml in {path}: {source}")]
    Yaml { path: PathBuf, #[source] source: serde_yaml::Error },
    #[error("invalid json in {path}: {source}")]
    Json { path: PathBuf, #[source] source: serde_json::Error },
    #[error("markdown file {path} is missing a frontmatter block")]
    MissingFrontmatter { path: PathBuf },
}

/// Reads and parses composition files under a root directory.
pub struct Loader {
    root: PathBuf,
}

impl Loader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `(name, type)` -> absolute path, trying `EXTENSIONS` in order.
    pub fn locate(&self, name: &str, type_: CompositionType) -> Option<PathBuf> {
        let dir = self.root.join(type_.dir_name());
        EXTENSIONS.iter().map(|ext| dir.join(format!("{name}.{ext}"))).find(|p| p.is_file())
    }

    pub fn load(&self, name: &str, type_: CompositionType) -> Result<Composition, LoaderError> {
        let path = self
            .locate(name, type_)
            .ok_or_else(|| LoaderError::NotFound { name: name.to_string(), type_ })?;
        Self::load_path(&path)
    }

    pub fn load_path(path: &Path) -> Result<Composition, LoaderError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|source| LoaderError::Io { path: path.to_path_buf(), source })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&contents)
                .map_err(|source| LoaderError::Yaml { path: path.to_path_buf(), source }),
            Some("json") => serde_json::from_str(&contents)
                .map_err(|source| LoaderError::Json { path: path.to_path_buf(), source }),
            Some("md") => Self::parse_markdown(path, &contents),
            _ => serde_yaml::from_str(&contents)
                .map_err(|source| LoaderError::Yaml { path: path.to_path_buf(), source }),
        }
    }

    fn parse_markdown(path: &Path, contents: &str) -> Result<Composition, LoaderError> {
        let (frontmatter, body) = split_frontmatter(contents)
            .ok_or_else(|| LoaderError::MissingFrontmatter { path: path.to_path_buf() })?;
        let mut composition: Composition = serde_yaml::from_str(frontmatter)
            .map_err(|source| LoaderError::Yaml { path: path.to_path_buf(), source })?;
        if !body.trim().is_empty() {
            composition.components.push(Component {
                name: "_body".to_string(),
                source: ComponentSource::Template { template: body.trim().to_string() },
                condition: None,
            });
        }
        Ok(composition)
    }

    /// Serialize `composition` to YAML under its type directory, creating
    /// the directory if needed. Used by the `composition:create` write
    /// path (spec.md §4.5 supplement).
    pub fn save(&self, composition: &Composition) -> Result<PathBuf, LoaderError> {
        let dir = self.root.join(composition.r#type.dir_name());
        std::fs::create_dir_all(&dir)
            .map_err(|source| LoaderError::Io { path: dir.clone(), source })?;
        let path = dir.join(format!("{}.yaml", composition.name));
        let yaml = serde_yaml::to_string(composition)
            .map_err(|source| LoaderError::Yaml { path: path.clone(), source })?;
        std::fs::write(&path, yaml).map_err(|source| LoaderError::Io { path: path.clone(), source })?;
        Ok(path)
    }
}

/// Splits `---\n<frontmatter>\n---\n<body>` into its two halves. Returns
/// `None` if the document doesn't open with a frontmatter fence.
fn split_frontmatter(contents: &str) -> Option<(&str, &str)> {
    let rest = contents.strip_prefix("---")?;
    let rest = rest.strip_prefix('\n').unwrap_or(rest);
    let end = rest.find("\n---")?;
    let frontmatter = &rest[..end];
    let after = &rest[end + 4..];
    let body = after.strip_prefix('\n').unwrap_or(after);
    Some((frontmatter, body))
}

#[cfg(test)]
#[path = "loader_tests.rs"]
mod tests;
