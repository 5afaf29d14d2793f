//! Artifact maps and the `importcfg` manifest format.
//!
//! A manifest is line oriented: one `packagefile <import path>=<archive>`
//! per artifact. Blank lines and `#` comments are skipped, and directives
//! other than `packagefile` are accepted and ignored so manifests produced
//! by newer toolchains still load.

use std::collections::BTreeMap;
use std::collections::btree_map;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::BuildError;

const PACKAGEFILE: &str = "packagefile";

/// Maps import path -> archive path.
///
/// Ordered so that iteration and serialization are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactMap {
    artifacts: BTreeMap<String, PathBuf>,
}

impl ArtifactMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an artifact, replacing any earlier entry for `import_path`.
    pub fn insert(&mut self, import_path: &str, archive: impl Into<PathBuf>) {
        self.artifacts.insert(import_path.to_string(), archive.into());
    }

    pub fn get(&self, import_path: &str) -> Option<&Path> {
        self.artifacts.get(import_path).map(|p| p.as_path())
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.artifacts.iter().map(|(k, v)| (k.as_str(), v.as_path()))
    }

    /// Overlay `other` on top of `self`; entries in `other` win.
    pub fn merge(&mut self, other: &ArtifactMap) {
        for (k, v) in &other.artifacts {
            self.artifacts.insert(k.clone(), v.clone());
        }
    }
}

impl FromIterator<(String, PathBuf)> for ArtifactMap {
    fn from_iter<I: IntoIterator<Item = (String, PathBuf)>>(iter: I) -> Self {
        Self {
            artifacts: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for ArtifactMap {
    type Item = (String, PathBuf);
    type IntoIter = btree_map::IntoIter<String, PathBuf>;

    fn into_iter(self) -> Self::IntoIter {
        self.artifacts.into_iter()
    }
}

/// Serialize `map`, keys in lexicographic order.
///
/// Entries that would not read back unchanged are rejected: empty fields,
/// whitespace at either end, line breaks, non-UTF-8 archive paths, and `=`
/// in the import path.
pub fn write(map: &ArtifactMap) -> Result<String, BuildError> {
    let mut out = String::new();
    for (idx, (import_path, archive)) in map.iter().enumerate() {
        let format_error = |message: String| BuildError::Format {
            line: idx + 1,
            message,
        };
        let Some(archive) = archive.to_str() else {
            return Err(format_error(format!(
                "archive path for {import_path} is not valid UTF-8: {}",
                archive.display()
            )));
        };
        if let Some(problem) = unrepresentable(import_path) {
            return Err(format_error(format!("import path {import_path:?} {problem}")));
        }
        if import_path.contains('=') {
            return Err(format_error(format!("import path {import_path:?} contains '='")));
        }
        if let Some(problem) = unrepresentable(archive) {
            return Err(format_error(format!("archive path {archive:?} {problem}")));
        }

        out.push_str(PACKAGEFILE);
        out.push(' ');
        out.push_str(import_path);
        out.push('=');
        out.push_str(archive);
        out.push('\n');
    }
    Ok(out)
}

/// Why `field` cannot appear in a `packagefile` line, if it cannot.
fn unrepresentable(field: &str) -> Option<&'static str> {
    if field.is_empty() {
        Some("is empty")
    } else if field.contains(['\n', '\r']) {
        Some("contains a line break")
    } else if field.starts_with(char::is_whitespace) || field.ends_with(char::is_whitespace) {
        Some("has surrounding whitespace")
    } else {
        None
    }
}

/// Parse manifest text.
pub fn read(text: &str) -> Result<ArtifactMap, BuildError> {
    let mut map = ArtifactMap::new();
    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let (directive, args) = match line.split_once(char::is_whitespace) {
            Some((d, a)) => (d, a.trim()),
            None => (line, ""),
        };
        if directive != PACKAGEFILE {
            continue;
        }

        let format_error = |message: &str| BuildError::Format {
            line: idx + 1,
            message: message.to_string(),
        };
        let Some((import_path, archive)) = args.split_once('=') else {
            return Err(format_error("expected packagefile <import path>=<file>"));
        };
        if import_path.is_empty() {
            return Err(format_error("empty import path"));
        }
        if archive.is_empty() {
            return Err(format_error("empty archive path"));
        }
        map.insert(import_path, archive);
    }
    Ok(map)
}

/// Load a manifest from disk.
pub fn read_file(path: &Path) -> Result<ArtifactMap, BuildError> {
    let text = fs::read_to_string(path).map_err(|e| BuildError::io(path, e))?;
    read(&text).map_err(|err| match err {
        BuildError::Format { line, message } => BuildError::Format {
            line,
            message: format!("{}: {message}", path.display()),
        },
        other => other,
    })
}

/// Write a manifest to disk atomically (temporary sibling, then rename).
pub fn write_file(path: &Path, map: &ArtifactMap) -> Result<(), BuildError> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| BuildError::io(dir, e))?;
    let text = write(map).map_err(|err| match err {
        BuildError::Format { line, message } => BuildError::Format {
            line,
            message: format!("{}: {message}", path.display()),
        },
        other => other,
    })?;
    tmp.write_all(text.as_bytes())
        .map_err(|e| BuildError::io(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| BuildError::io(path, e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn sample() -> ArtifactMap {
        let mut map = ArtifactMap::new();
        map.insert("fmt", "/goroot/pkg/linux_amd64/fmt.a");
        map.insert("rules_go_simple/tests/baz", "bazel-out/baz.a");
        map.insert("errors", "/goroot/pkg/linux_amd64/errors.a");
        map
    }

    #[test]
    fn write_sorts_keys() {
        assert_eq!(
            write(&sample()).unwrap(),
            "packagefile errors=/goroot/pkg/linux_amd64/errors.a\n\
             packagefile fmt=/goroot/pkg/linux_amd64/fmt.a\n\
             packagefile rules_go_simple/tests/baz=bazel-out/baz.a\n"
        );
    }

    #[test]
    fn write_is_independent_of_insertion_order() {
        let mut reversed = ArtifactMap::new();
        let entries: Vec<_> = sample().into_iter().collect();
        for (k, v) in entries.into_iter().rev() {
            reversed.insert(&k, v);
        }
        assert_eq!(write(&reversed).unwrap(), write(&sample()).unwrap());
    }

    #[test]
    fn read_round_trips() {
        assert_eq!(read(&write(&sample()).unwrap()).unwrap(), sample());
    }

    #[test]
    fn write_rejects_entries_that_would_not_read_back() {
        for (key, value) in [
            ("a", "x.a "),
            ("a", " x.a"),
            (" a", "x.a"),
            ("a=b", "x.a"),
            ("a", "x\n.a"),
            ("a\rb", "x.a"),
            ("", "x.a"),
            ("a", ""),
        ] {
            let mut map = ArtifactMap::new();
            map.insert(key, value);
            assert!(
                matches!(write(&map), Err(BuildError::Format { line: 1, .. })),
                "{key:?}={value:?}"
            );
        }
    }

    #[test]
    fn write_file_leaves_nothing_on_rejection() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("importcfg");
        let mut map = sample();
        map.insert("zzz", "trailing.a ");
        let err = write_file(&path, &map).unwrap_err();
        assert!(matches!(err, BuildError::Format { line: 4, .. }), "{err}");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn read_skips_comments_and_unknown_directives() {
        let text = "# import config\n\
                    \n\
                    importmap golang.org/x/net=vendor/golang.org/x/net\n\
                    packagefile fmt=fmt.a\n\
                    modinfo \"0w\"\n\
                    \tpackagefile  os=os.a  \n";
        let map = read(text).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("fmt"), Some(Path::new("fmt.a")));
        assert_eq!(map.get("os"), Some(Path::new("os.a")));
    }

    #[test]
    fn value_may_contain_equals() {
        let map = read("packagefile a=dir/x=y.a\n").unwrap();
        assert_eq!(map.get("a"), Some(Path::new("dir/x=y.a")));
    }

    #[test]
    fn malformed_packagefile_reports_line() {
        for (text, line) in [
            ("packagefile fmt\n", 1),
            ("# c\npackagefile =fmt.a\n", 2),
            ("packagefile a=a.a\n\npackagefile fmt=\n", 3),
        ] {
            match read(text) {
                Err(BuildError::Format { line: got, .. }) => assert_eq!(got, line, "{text:?}"),
                other => panic!("expected format error for {text:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn later_entries_win() {
        let map = read("packagefile fmt=old.a\npackagefile fmt=new.a\n").unwrap();
        assert_eq!(map.get("fmt"), Some(Path::new("new.a")));

        let mut base = sample();
        let mut overlay = ArtifactMap::new();
        overlay.insert("fmt", "mine/fmt.a");
        base.merge(&overlay);
        assert_eq!(base.get("fmt"), Some(Path::new("mine/fmt.a")));
        assert_eq!(base.len(), 3);
    }

    #[test]
    fn file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("importcfg");
        write_file(&path, &sample()).unwrap();
        assert_eq!(read_file(&path).unwrap(), sample());
        // Only the manifest itself is left behind.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    proptest! {
        #[test]
        fn written_maps_read_back_unchanged(
            entries in proptest::collection::vec(("[^=\\s]([^=\n\r]*[^=\\s])?", "[^\\s]([^\n\r]*[^\\s])?"), 0..8)
        ) {
            let map: ArtifactMap = entries
                .into_iter()
                .map(|(k, v)| (k, PathBuf::from(v)))
                .collect();
            let text = write(&map).unwrap();
            prop_assert_eq!(read(&text).unwrap(), map);
        }

        #[test]
        fn write_never_emits_unreadable_text(
            entries in proptest::collection::vec((".*", ".*"), 0..8)
        ) {
            let map: ArtifactMap = entries
                .into_iter()
                .map(|(k, v)| (k, PathBuf::from(v)))
                .collect();
            if let Ok(text) = write(&map) {
                prop_assert_eq!(read(&text).unwrap(), map);
            }
        }
    }

    #[test]
    fn read_file_missing_is_io_error() {
        let err = read_file(Path::new("/nonexistent/importcfg")).unwrap_err();
        assert!(matches!(err, BuildError::Io { .. }));
    }
}
