//! Root-anchored entry identifiers
//!
//! An identifier is `<root-marker>:<relative-path>`, where the relative path
//! uses `/` separators and is empty for the anchor itself. Identifiers carry no
//! reference to the anchor they were minted under: resolving an identifier
//! after [`IdResolver::set_anchor`] is a caller error that is not detected.

use std::path::{Component, Path, PathBuf};

use crate::error::{DirScrollError, DirScrollResult};
use crate::fs::FileSystem;

/// Root marker used when none is configured.
pub const DEFAULT_ROOT_MARKER: &str = "root";

const SEPARATOR: char = ':';

/// Bidirectional mapping between absolute paths and root-relative identifiers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdResolver {
    marker: String,
    anchor: PathBuf,
}

impl IdResolver {
    /// Create a resolver anchored at `anchor` using [`DEFAULT_ROOT_MARKER`].
    pub fn new(anchor: impl Into<PathBuf>) -> Self {
        Self::with_marker(anchor, DEFAULT_ROOT_MARKER)
    }

    /// Create a resolver with a custom root marker.
    ///
    /// The marker must not contain `:`; any `:` is stripped.
    pub fn with_marker(anchor: impl Into<PathBuf>, marker: impl Into<String>) -> Self {
        let marker: String = marker.into().chars().filter(|c| *c != SEPARATOR).collect();
        Self {
            marker,
            anchor: anchor.into(),
        }
    }

    /// Returns the current anchor.
    pub fn anchor(&self) -> &Path {
        &self.anchor
    }

    /// Replace the anchor.
    ///
    /// Previously issued identifier strings stay valid strings but no longer
    /// mean anything under the new anchor.
    pub fn set_anchor(&mut self, anchor: impl Into<PathBuf>) {
        self.anchor = anchor.into();
    }

    /// Returns the root marker.
    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// Identifier of the anchor itself (`root:` by default).
    pub fn root_identifier(&self) -> String {
        format!("{}{SEPARATOR}", self.marker)
    }

    /// Identifier for `path`.
    ///
    /// Total over all paths. Paths outside the anchor produce a lexical offset
    /// with `..` segments, which is rarely what a caller wants.
    pub fn identifier_for(&self, path: &Path) -> String {
        format!(
            "{}{SEPARATOR}{}",
            self.marker,
            relative_offset(&self.anchor, path)
        )
    }

    /// Parse `identifier` into an absolute path without touching the filesystem.
    pub fn path_for(&self, identifier: &str) -> DirScrollResult<PathBuf> {
        let Some((marker, relative)) = identifier.split_once(SEPARATOR) else {
            return Err(DirScrollError::malformed(
                identifier,
                "missing ':' separator",
            ));
        };
        if marker != self.marker {
            return Err(DirScrollError::malformed(identifier, "unknown root marker"));
        }

        let mut path = self.anchor.clone();
        for segment in relative.split('/').filter(|s| !s.is_empty() && *s != ".") {
            path.push(segment);
        }
        Ok(path)
    }

    /// Resolve `identifier` to an existing absolute path.
    pub fn resolve(&self, fs: &dyn FileSystem, identifier: &str) -> DirScrollResult<PathBuf> {
        let path = self.path_for(identifier)?;
        if !fs.exists(&path) {
            return Err(DirScrollError::not_found(identifier));
        }
        Ok(path)
    }
}

fn relative_offset(anchor: &Path, path: &Path) -> String {
    if let Ok(rest) = path.strip_prefix(anchor) {
        return join_segments(rest.components());
    }

    let anchor_parts: Vec<Component<'_>> = anchor.components().collect();
    let path_parts: Vec<Component<'_>> = path.components().collect();
    let common = anchor_parts
        .iter()
        .zip(&path_parts)
        .take_while(|(a, b)| a == b)
        .count();

    let mut segments: Vec<String> =
        std::iter::repeat_n("..".to_string(), anchor_parts.len() - common).collect();
    segments.extend(
        path_parts[common..]
            .iter()
            .map(|c| c.as_os_str().to_string_lossy().into_owned()),
    );
    segments.join("/")
}

fn join_segments<'a>(components: impl Iterator<Item = Component<'a>>) -> String {
    components
        .filter(|c| !matches!(c, Component::CurDir))
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MemFs;

    fn pics_fs() -> MemFs {
        MemFs::new()
            .with_dir("/data/pics", &[("2024", true), ("cover.jpg", false)])
            .with_dir("/data/pics/2024", &[("beach.jpg", false)])
    }

    #[test]
    fn root_identifier_resolves_to_anchor() {
        let fs = pics_fs();
        let resolver = IdResolver::new("/data/pics");

        assert_eq!(resolver.root_identifier(), "root:");
        assert_eq!(
            resolver.resolve(&fs, "root:").unwrap(),
            PathBuf::from("/data/pics")
        );
        assert_eq!(resolver.identifier_for(Path::new("/data/pics")), "root:");
    }

    #[test]
    fn identifier_round_trips_under_unchanged_anchor() {
        let fs = pics_fs();
        let resolver = IdResolver::new("/data/pics");

        for path in [
            "/data/pics/cover.jpg",
            "/data/pics/2024",
            "/data/pics/2024/beach.jpg",
        ] {
            let id = resolver.identifier_for(Path::new(path));
            assert_eq!(resolver.resolve(&fs, &id).unwrap(), PathBuf::from(path));
        }
        assert_eq!(
            resolver.identifier_for(Path::new("/data/pics/2024/beach.jpg")),
            "root:2024/beach.jpg"
        );
    }

    #[test]
    fn identifiers_are_deterministic() {
        let resolver = IdResolver::new("/data/pics");
        let a = resolver.identifier_for(Path::new("/data/pics/cover.jpg"));
        let b = resolver.identifier_for(Path::new("/data/pics/cover.jpg"));
        assert_eq!(a, b);
    }

    #[test]
    fn missing_separator_is_malformed() {
        let fs = pics_fs();
        let resolver = IdResolver::new("/data/pics");
        let err = resolver.resolve(&fs, "cover.jpg").unwrap_err();
        assert!(matches!(err, DirScrollError::MalformedIdentifier { .. }));
    }

    #[test]
    fn foreign_marker_is_malformed() {
        let resolver = IdResolver::new("/data/pics");
        let err = resolver.path_for("sdcard:cover.jpg").unwrap_err();
        assert!(matches!(
            err,
            DirScrollError::MalformedIdentifier {
                reason: "unknown root marker",
                ..
            }
        ));
    }

    #[test]
    fn missing_entry_is_not_found() {
        let fs = pics_fs();
        let resolver = IdResolver::new("/data/pics");
        let err = resolver.resolve(&fs, "root:gone.jpg").unwrap_err();
        assert!(matches!(err, DirScrollError::NotFound { identifier } if identifier == "root:gone.jpg"));
    }

    #[test]
    fn paths_outside_anchor_get_a_lexical_offset() {
        let resolver = IdResolver::new("/data/pics");
        assert_eq!(
            resolver.identifier_for(Path::new("/data/music/a.mp3")),
            "root:../music/a.mp3"
        );
    }

    #[test]
    fn set_anchor_changes_resolution_base() {
        let fs = pics_fs();
        let mut resolver = IdResolver::new("/data/pics");
        let id = resolver.identifier_for(Path::new("/data/pics/2024/beach.jpg"));

        resolver.set_anchor("/data/pics/2024");
        assert_eq!(resolver.anchor(), Path::new("/data/pics/2024"));
        assert_eq!(
            resolver.identifier_for(Path::new("/data/pics/2024/beach.jpg")),
            "root:beach.jpg"
        );
        // Identifiers minted under the old anchor now point elsewhere.
        assert!(resolver.resolve(&fs, &id).is_err());
    }

    #[test]
    fn custom_marker_strips_separator() {
        let resolver = IdResolver::with_marker("/sd", "card:0");
        assert_eq!(resolver.marker(), "card0");
        assert_eq!(resolver.root_identifier(), "card0:");
    }
}
