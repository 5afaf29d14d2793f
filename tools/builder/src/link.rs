//! The `link` action: a main package archive to an executable.

use std::path::Path;

use anyhow::{Context, Result};

use crate::cli::{self, LinkArgs};
use crate::compile::write_importcfg;
use crate::config::BuildConfig;
use crate::manifest;
use crate::resolve::merge_tiers;
use crate::scratch::{self, Scratch, StagedOutput};
use crate::toolchain::{Tool, ToolCommand};

/// Execute the `link` action.
///
/// The linker needs every archive in the transitive closure, so the manifest
/// is the whole standard index overlaid with the given archives.
pub fn cmd_link(config: &BuildConfig, args: &LinkArgs) -> Result<()> {
    let standard = manifest::read_file(&args.stdimportcfg)
        .context("reading standard library manifest")?;
    let archives = merge_tiers([&standard, &cli::archive_map(&args.archives)]);

    let scratch = Scratch::new()?;
    let staged = StagedOutput::new(&args.output)?;
    let importcfg = scratch.join("importcfg");
    write_importcfg(&importcfg, &archives)?;

    run_linker(config, &importcfg, &args.main, staged.path())?;

    scratch::finish(scratch, staged)?;
    Ok(())
}

/// Run `link -importcfg <manifest> -o <out> -- <main archive>`.
pub fn run_linker(config: &BuildConfig, importcfg: &Path, main: &Path, output: &Path) -> Result<()> {
    ToolCommand::new(config, Tool::Link)?
        .importcfg(importcfg)
        .output(output)
        .inputs([main])
        .run_checked()?;
    Ok(())
}
