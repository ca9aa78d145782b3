//! Template search path composition.

use std::path::{Component, Path, PathBuf};

use serde::Serialize;

use crate::types::OverrideDescriptor;

/// Ordered list of directories consulted, in order, to resolve a template name.
///
/// A composed path always ends with exactly one default directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TemplateSearchPath(Vec<PathBuf>);

impl TemplateSearchPath {
    /// The canonical search path: just the default directory.
    pub fn baseline(default_dir: impl Into<PathBuf>) -> Self {
        Self(vec![default_dir.into()])
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The default directory (always the last entry).
    pub fn default_dir(&self) -> Option<&Path> {
        self.0.last().map(PathBuf::as_path)
    }

    /// Whether this path carries any override directories ahead of the default.
    pub fn is_overridden(&self) -> bool {
        self.0.len() > 1
    }

    /// Candidate file locations for `template`, in lookup order.
    ///
    /// Returns nothing for absolute names or names that escape the search
    /// directory through `..`.
    pub fn candidates(&self, template: &str) -> Vec<PathBuf> {
        if !is_safe_template_name(template) {
            return Vec::new();
        }
        self.0.iter().map(|dir| dir.join(template)).collect()
    }
}

fn is_safe_template_name(name: &str) -> bool {
    !name.is_empty()
        && Path::new(name)
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Build the request's template search path.
///
/// Override directories come first, in resolver order, followed by
/// `default_path`. With no descriptors the result is `[default_path]`.
pub fn compose_template_paths(
    descriptors: &[OverrideDescriptor],
    default_path: &Path,
) -> TemplateSearchPath {
    let mut dirs: Vec<PathBuf> = descriptors
        .iter()
        .map(|d| PathBuf::from(&d.override_dir))
        .collect();
    dirs.push(default_path.to_path_buf());
    TemplateSearchPath(dirs)
}
