//! Template identifiers.

use std::path::{Component, Path, PathBuf};

/// Where a template comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSource {
    /// A path read through the source resolver; the path is also the id.
    Path(String),
    /// Content supplied by the caller. Only cached when `id` is present.
    Inline { id: Option<String>, content: String },
}

impl TemplateSource {
    pub fn path(path: impl Into<String>) -> Self {
        TemplateSource::Path(path.into())
    }

    pub fn inline(id: impl Into<String>, content: impl Into<String>) -> Self {
        TemplateSource::Inline {
            id: Some(id.into()),
            content: content.into(),
        }
    }

    /// Inline content with no id: never cached, includes resolve against
    /// the engine's base directory.
    pub fn anonymous(content: impl Into<String>) -> Self {
        TemplateSource::Inline {
            id: None,
            content: content.into(),
        }
    }

    /// The cache key, if any. An empty inline id counts as none.
    pub fn id(&self) -> Option<&str> {
        match self {
            TemplateSource::Path(path) => Some(path),
            TemplateSource::Inline { id, .. } => id.as_deref().filter(|id| !id.is_empty()),
        }
    }
}

impl From<&str> for TemplateSource {
    fn from(path: &str) -> Self {
        TemplateSource::Path(path.to_string())
    }
}

impl From<String> for TemplateSource {
    fn from(path: String) -> Self {
        TemplateSource::Path(path)
    }
}

impl From<&Path> for TemplateSource {
    fn from(path: &Path) -> Self {
        TemplateSource::Path(path.to_string_lossy().into_owned())
    }
}

/// Directory of a template id (`dir/a` → `dir`, `a` → ``).
pub fn parent_dir(id: &str) -> PathBuf {
    Path::new(id)
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default()
}

/// Join `file` onto `base` and fold `.` and `..` lexically, so that one
/// template always maps to one cache key.
pub fn resolve_relative(base: &Path, file: &str) -> String {
    let mut parts: Vec<Component<'_>> = Vec::new();
    let joined = base.join(file);
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => parts.push(component),
            },
            other => parts.push(other),
        }
    }
    parts
        .iter()
        .collect::<PathBuf>()
        .to_string_lossy()
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids() {
        assert_eq!(TemplateSource::from("views/a.html").id(), Some("views/a.html"));
        assert_eq!(TemplateSource::inline("x", "body").id(), Some("x"));
        assert_eq!(TemplateSource::anonymous("body").id(), None);
        assert_eq!(TemplateSource::inline("", "body").id(), None);
    }

    #[test]
    fn test_parent_dir() {
        assert_eq!(parent_dir("dir/a"), PathBuf::from("dir"));
        assert_eq!(parent_dir("a"), PathBuf::from(""));
    }

    #[test]
    fn test_resolve_relative() {
        assert_eq!(resolve_relative(Path::new("dir"), "b"), "dir/b");
        assert_eq!(resolve_relative(Path::new(""), "b"), "b");
        assert_eq!(resolve_relative(Path::new("dir/sub"), "../b"), "dir/b");
        assert_eq!(resolve_relative(Path::new("dir"), "./b"), "dir/b");
        assert_eq!(resolve_relative(Path::new(""), "../b"), "../b");
        assert_eq!(resolve_relative(Path::new("/srv"), "/etc/x"), "/etc/x");
    }
}
