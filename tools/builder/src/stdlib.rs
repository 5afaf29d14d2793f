//! Standard library index (`stdimportcfg` action).
//!
//! Compiled standard library archives are laid out by import path under
//! `$GOROOT/pkg/<goos>_<goarch>`, so a directory walk is enough to build the
//! manifest without asking the `go` command.

use std::path::Path;

use anyhow::{Context, Result};
use walkdir::WalkDir;

use crate::cli::StdImportcfgArgs;
use crate::config::BuildConfig;
use crate::manifest::{self, ArtifactMap};
use crate::verbose::vprintln;

/// Map every `.a` file under `root` to its import path.
pub fn index(root: &Path) -> Result<ArtifactMap> {
    let mut map = ArtifactMap::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.with_context(|| format!("walking {}", root.display()))?;
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().is_none_or(|ext| ext != "a") {
            continue;
        }
        let rel = path.strip_prefix(root).unwrap_or(path).with_extension("");
        let import_path = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        map.insert(&import_path, path);
    }
    Ok(map)
}

/// Execute the `stdimportcfg` action.
pub fn cmd_stdimportcfg(config: &BuildConfig, args: &StdImportcfgArgs) -> Result<()> {
    let root = match &args.root {
        Some(root) => root.clone(),
        None => config.std_pkg_dir()?,
    };
    let map = index(&root)?;
    vprintln!("  indexed {} archive(s) under {}", map.len(), root.display());
    manifest::write_file(&args.output, &map)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn keys_are_relative_import_paths() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        for rel in ["fmt.a", "net/http.a", "net/http/internal.a", "net/README", "go/ast.o"] {
            let path = root.join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, "").unwrap();
        }
        fs::create_dir_all(root.join("dir.a")).unwrap();

        let map = index(root).unwrap();
        let keys: Vec<_> = map.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, ["fmt", "net/http", "net/http/internal"]);
        assert_eq!(map.get("net/http"), Some(root.join("net/http.a").as_path()));
    }

    #[test]
    fn missing_root_is_an_error() {
        assert!(index(Path::new("/nonexistent/pkg/linux_amd64")).is_err());
    }

    #[test]
    fn writes_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let pkg = dir.path().join("pkg");
        fs::create_dir_all(pkg.join("strings")).unwrap();
        fs::write(pkg.join("errors.a"), "").unwrap();

        let out = dir.path().join("std.importcfg");
        let config = BuildConfig {
            goroot: None,
            target: crate::config::Platform::host(),
            host: crate::config::Platform::host(),
            tool_dir: None,
            tags: Vec::new(),
        };
        let args = StdImportcfgArgs {
            root: Some(pkg.clone()),
            output: out.clone(),
        };
        cmd_stdimportcfg(&config, &args).unwrap();
        assert_eq!(
            fs::read_to_string(out).unwrap(),
            format!("packagefile errors={}\n", pkg.join("errors.a").display())
        );
    }
}
