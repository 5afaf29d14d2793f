//! The `compile` action: Go sources to a package archive.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::cli::{self, CompileArgs};
use crate::config::BuildConfig;
use crate::error::BuildError;
use crate::manifest::{self, ArtifactMap};
use crate::resolve;
use crate::scratch::{self, Scratch, StagedOutput};
use crate::source::{self, SourceUnit};
use crate::toolchain::{Tool, ToolCommand};
use crate::verbose::{self, vprintln};

/// Execute the `compile` action.
pub fn cmd_compile(config: &BuildConfig, args: &CompileArgs) -> Result<()> {
    let units = source::classify_all(&args.sources, &config.context())?;
    let matched = matched_sources(units, &args.sources)?;

    let standard = manifest::read_file(&args.stdimportcfg)
        .context("reading standard library manifest")?;
    let direct = cli::archive_map(&args.archives);
    let imports = resolve::resolve(&matched, &standard, &direct)?;

    let scratch = Scratch::new()?;
    let staged = StagedOutput::new(&args.output)?;
    let importcfg = scratch.join("importcfg");
    write_importcfg(&importcfg, &imports)?;

    let srcs: Vec<&Path> = matched.iter().map(|u| u.path.as_path()).collect();
    run_compiler(
        config,
        args.package_path.as_deref(),
        &importcfg,
        &srcs,
        staged.path(),
    )?;

    scratch::finish(scratch, staged)?;
    Ok(())
}

/// Drop units excluded by constraints; fail if nothing is left.
pub fn matched_sources(units: Vec<SourceUnit>, paths: &[PathBuf]) -> Result<Vec<SourceUnit>> {
    let matched: Vec<SourceUnit> = units.into_iter().filter(|u| u.matches_constraints).collect();
    if matched.is_empty() {
        return Err(BuildError::NoBuildableFiles(paths.to_vec()).into());
    }
    Ok(matched)
}

/// Write a manifest into the scratch area, echoing it in verbose mode.
pub fn write_importcfg(path: &Path, map: &ArtifactMap) -> Result<()> {
    manifest::write_file(path, map)?;
    if verbose::is_verbose() {
        let text = manifest::write(map)?;
        vprintln!("  importcfg {}:\n{}", path.display(), text.trim_end());
    }
    Ok(())
}

/// Run `compile [-p <path>] -importcfg <manifest> -o <out> -- <srcs>`.
pub fn run_compiler(
    config: &BuildConfig,
    package_path: Option<&str>,
    importcfg: &Path,
    srcs: &[&Path],
    output: &Path,
) -> Result<()> {
    let mut cmd = ToolCommand::new(config, Tool::Compile)?;
    if let Some(p) = package_path {
        cmd.package_path(p);
    }
    cmd.importcfg(importcfg).output(output).inputs(srcs);
    cmd.run_checked()?;
    Ok(())
}
