use std::path::{Path, PathBuf};

use relative_path::{Component, RelativePath, RelativePathBuf};

/// Turns note-relative references (`/i/cat.png`, `img/cat.png`) into
/// absolute, openable URLs.
pub trait AssetResolver: Send + Sync {
    /// `None` when the reference cannot be resolved; callers then skip the
    /// link.
    fn resolve(&self, reference: &str) -> Option<String>;

    /// Like [`AssetResolver::resolve`] but without requiring the target to
    /// exist. Used for bare `/i/...` and `/files/...` references in prose.
    fn rewrite(&self, reference: &str) -> Option<String> {
        self.resolve(reference)
    }
}

/// Resolves nothing. Used when a note has no project on disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAssets;

impl AssetResolver for NoAssets {
    fn resolve(&self, _reference: &str) -> Option<String> {
        None
    }
}

/// Resolves references against a notes folder on disk.
///
/// References starting with `/` are relative to the notes root; anything else
/// is relative to the folder of the current note. Only references to existing
/// files inside the root resolve; [`AssetResolver::rewrite`] accepts any
/// reference that stays inside the root.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectAssetResolver {
    root: PathBuf,
    note: RelativePathBuf,
}

impl ProjectAssetResolver {
    /// `note` is the current note's path relative to `root`.
    pub fn new(root: impl Into<PathBuf>, note: impl Into<RelativePathBuf>) -> Self {
        Self {
            root: root.into(),
            note: note.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn note(&self) -> &RelativePath {
        &self.note
    }

    /// The path `reference` names under the root, existing or not.
    fn locate(&self, reference: &str) -> Option<PathBuf> {
        let decoded = urlencoding::decode(reference).ok()?;
        let decoded = decoded.split(['?', '#']).next().unwrap_or_default();
        if decoded.is_empty() {
            return None;
        }

        let relative = match decoded.strip_prefix('/') {
            Some(from_root) => RelativePathBuf::from(from_root),
            None => self
                .note
                .parent()
                .map_or_else(|| RelativePathBuf::from(decoded), |dir| dir.join(decoded)),
        }
        .normalize();

        if matches!(relative.components().next(), Some(Component::ParentDir)) {
            log::debug!("Asset reference {reference:?} escapes the notes root");
            return None;
        }

        Some(relative.to_path(&self.root))
    }
}

impl AssetResolver for ProjectAssetResolver {
    fn resolve(&self, reference: &str) -> Option<String> {
        self.locate(reference)
            .filter(|path| path.is_file())
            .map(|path| file_url(&path))
    }

    fn rewrite(&self, reference: &str) -> Option<String> {
        self.locate(reference).map(|path| file_url(&path))
    }
}

/// A `file://` URL for `path` with each segment percent-encoded.
pub fn file_url(path: &Path) -> String {
    let text = path.to_string_lossy();
    let encoded: Vec<_> = text
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect();
    let joined = encoded.join("/");
    if joined.starts_with('/') {
        format!("file://{joined}")
    } else {
        format!("file:///{joined}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn project() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("i")).unwrap();
        fs::create_dir_all(dir.path().join("journal/img")).unwrap();
        fs::write(dir.path().join("i/cat.png"), b"png").unwrap();
        fs::write(dir.path().join("journal/img/my dog.png"), b"png").unwrap();
        dir
    }

    #[test]
    fn root_relative_reference() {
        let dir = project();
        let resolver = ProjectAssetResolver::new(dir.path(), "journal/today.md");

        let url = resolver.resolve("/i/cat.png").unwrap();
        assert_eq!(url, file_url(&dir.path().join("i/cat.png")));
        assert!(url.starts_with("file://"));
    }

    #[test]
    fn note_relative_reference_with_encoding() {
        let dir = project();
        let resolver = ProjectAssetResolver::new(dir.path(), "journal/today.md");

        let url = resolver.resolve("img/my%20dog.png").unwrap();
        assert!(url.ends_with("/journal/img/my%20dog.png"), "{url}");
        assert!(resolver.resolve("img/my dog.png").is_some());
    }

    #[test]
    fn missing_or_escaping_references_do_not_resolve() {
        let dir = project();
        let resolver = ProjectAssetResolver::new(dir.path(), "journal/today.md");

        assert_eq!(resolver.resolve("/i/missing.png"), None);
        assert_eq!(resolver.resolve("../../etc/passwd"), None);
        assert_eq!(resolver.resolve(""), None);
    }

    #[test]
    fn query_and_fragment_are_ignored() {
        let dir = project();
        let resolver = ProjectAssetResolver::new(dir.path(), "index.md");
        assert!(resolver.resolve("/i/cat.png?width=200").is_some());
    }

    #[test]
    fn rewrite_skips_the_existence_check() {
        let dir = project();
        let resolver = ProjectAssetResolver::new(dir.path(), "journal/today.md");

        assert_eq!(resolver.resolve("/files/report.pdf"), None);
        assert_eq!(
            resolver.rewrite("/files/report.pdf"),
            Some(file_url(&dir.path().join("files/report.pdf")))
        );
        assert_eq!(resolver.rewrite("/../outside.pdf"), None);
    }

    #[test]
    fn no_assets_resolves_nothing() {
        assert_eq!(NoAssets.resolve("/i/cat.png"), None);
        assert_eq!(NoAssets.rewrite("/i/cat.png"), None);
    }
}
