//! Import resolution against layered artifact maps.
//!
//! Tiers are added from least to most specific; lookups consult the most
//! recently added tier first. Resolution never stops at the first missing
//! import: every unresolved `(file, import)` pair is collected and reported
//! together.

use crate::error::{BuildError, UnresolvedImport, UnresolvedReason};
use crate::manifest::ArtifactMap;
use crate::source::SourceUnit;
use crate::verbose::vprintln;

/// Needs no archive.
const UNSAFE: &str = "unsafe";
/// cgo pseudo-package.
const CGO: &str = "C";

/// Layered lookup over artifact maps.
#[derive(Default)]
pub struct Resolver<'a> {
    tiers: Vec<&'a ArtifactMap>,
}

impl<'a> Resolver<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tier that takes precedence over every tier added before it.
    pub fn tier(mut self, map: &'a ArtifactMap) -> Self {
        self.tiers.push(map);
        self
    }

    /// Find the archive for `import_path` in the most specific tier.
    pub fn lookup(&self, import_path: &str) -> Option<&'a std::path::Path> {
        self.tiers.iter().rev().find_map(|t| t.get(import_path))
    }

    /// Map every import of every matched unit to an archive.
    ///
    /// The result holds exactly the referenced imports.
    pub fn resolve(&self, units: &[SourceUnit]) -> Result<ArtifactMap, BuildError> {
        let mut missing = Vec::new();
        let resolved = self.resolve_into(units, &mut missing);
        if !missing.is_empty() {
            return Err(BuildError::UnresolvedImports(missing));
        }
        Ok(resolved)
    }

    /// Like [`Resolver::resolve`], but append failures to `missing` instead
    /// of returning them, so several resolutions can report together.
    pub fn resolve_into(
        &self,
        units: &[SourceUnit],
        missing: &mut Vec<UnresolvedImport>,
    ) -> ArtifactMap {
        let mut resolved = ArtifactMap::new();
        for unit in units.iter().filter(|u| u.matches_constraints) {
            for import in &unit.imports {
                match import.as_str() {
                    UNSAFE => {}
                    CGO => missing.push(UnresolvedImport {
                        file: unit.path.clone(),
                        import: import.clone(),
                        reason: UnresolvedReason::Cgo,
                    }),
                    path => match self.lookup(path) {
                        Some(archive) => resolved.insert(path, archive),
                        None => missing.push(UnresolvedImport {
                            file: unit.path.clone(),
                            import: import.clone(),
                            reason: UnresolvedReason::NotProvided,
                        }),
                    },
                }
            }
        }

        vprintln!("  resolved {} import(s)", resolved.len());
        resolved
    }
}

/// Resolve against the standard tier, overridden by direct dependencies.
pub fn resolve(
    units: &[SourceUnit],
    standard: &ArtifactMap,
    direct: &ArtifactMap,
) -> Result<ArtifactMap, BuildError> {
    Resolver::new().tier(standard).tier(direct).resolve(units)
}

/// Flatten tiers into one map; later tiers override earlier ones.
pub fn merge_tiers<'a>(tiers: impl IntoIterator<Item = &'a ArtifactMap>) -> ArtifactMap {
    let mut merged = ArtifactMap::new();
    for tier in tiers {
        merged.merge(tier);
    }
    merged
}
