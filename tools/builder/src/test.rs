//! The `test` action: library and test sources to a test executable.
//!
//! Pipeline: classify → partition and synthesize the harness → resolve every
//! group (and the generated main) up front → compile internal group →
//! compile external group → compile main → link.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::cli::{self, TestArgs};
use crate::compile::{matched_sources, run_compiler, write_importcfg};
use crate::config::BuildConfig;
use crate::error::BuildError;
use crate::harness::{self, TestGroup};
use crate::link::run_linker;
use crate::manifest::{self, ArtifactMap};
use crate::resolve::{Resolver, merge_tiers};
use crate::scratch::{self, Scratch, StagedOutput};
use crate::source;
use crate::verbose::vprintln;

/// Import path of the generated entry point.
const MAIN_PACKAGE: &str = "main";

/// Execute the `test` action.
pub fn cmd_test(config: &BuildConfig, args: &TestArgs) -> Result<()> {
    let ctx = config.context();
    let units = source::classify_all(&args.sources, &ctx)?;
    let matched = matched_sources(units, &args.sources)?;
    let harness = harness::synthesize(matched, &args.package_path, &args.dir)?;

    let standard = manifest::read_file(&args.stdimportcfg)
        .context("reading standard library manifest")?;
    let direct = cli::archive_map(&args.direct);
    let transitive = cli::archive_map(&args.transitive);

    let scratch = Scratch::new()?;
    let staged = StagedOutput::new(&args.output)?;

    // Where each non-empty group's archive will be written. The external
    // group may import the internal one, so its resolution sees these too.
    let mut built = ArtifactMap::new();
    for import in &harness.main.imports {
        built.insert(&import.import_path, scratch.join(&format!("{}.a", import.alias)));
    }
    let mut internal_only = ArtifactMap::new();
    if let Some(archive) = built.get(&harness.internal.import_path) {
        internal_only.insert(&harness.internal.import_path, archive);
    }

    let main_src = scratch.join("testmain.go");
    fs::write(&main_src, &harness.source).map_err(|e| BuildError::io(&main_src, e))?;
    let main_unit = source::classify_source(&main_src, &harness.source, &ctx)?;

    // Everything the final link may need.
    let closure = merge_tiers([&standard, &direct, &transitive, &built]);

    // Resolve all imports before compiling anything so every failure is
    // reported in one go.
    let mut missing = Vec::new();
    let internal_imports = Resolver::new()
        .tier(&standard)
        .tier(&direct)
        .resolve_into(&harness.internal.sources, &mut missing);
    let external_imports = Resolver::new()
        .tier(&standard)
        .tier(&direct)
        .tier(&internal_only)
        .resolve_into(&harness.external.sources, &mut missing);
    Resolver::new()
        .tier(&closure)
        .resolve_into(std::slice::from_ref(&main_unit), &mut missing);
    if !missing.is_empty() {
        return Err(BuildError::UnresolvedImports(missing).into());
    }

    compile_group(config, &scratch, &harness.internal, &internal_imports, &built)?;
    compile_group(config, &scratch, &harness.external, &external_imports, &built)?;

    let importcfg = scratch.join("importcfg");
    write_importcfg(&importcfg, &closure)?;
    let main_archive = scratch.join("testmain.a");
    run_compiler(
        config,
        Some(MAIN_PACKAGE),
        &importcfg,
        &[main_src.as_path()],
        &main_archive,
    )
    .context("compiling generated test main")?;

    run_linker(config, &importcfg, &main_archive, staged.path())?;

    scratch::finish(scratch, staged)?;
    Ok(())
}

/// Compile one test group into its planned scratch archive.
fn compile_group(
    config: &BuildConfig,
    scratch: &Scratch,
    group: &TestGroup,
    imports: &ArtifactMap,
    built: &ArtifactMap,
) -> Result<()> {
    let Some(archive) = built.get(&group.import_path) else {
        return Ok(());
    };
    vprintln!(
        "  compiling {} group {} (package {}, {} file(s))",
        group.alias(),
        group.import_path,
        group.package_label,
        group.sources.len()
    );

    let importcfg = scratch.join(&format!("{}.importcfg", group.alias()));
    write_importcfg(&importcfg, imports)?;
    let srcs: Vec<&Path> = group.sources.iter().map(|s| s.path.as_path()).collect();
    run_compiler(config, Some(&group.import_path), &importcfg, &srcs, archive)
        .with_context(|| format!("compiling {}", group.import_path))
}
