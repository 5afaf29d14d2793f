//! Test harness synthesis.
//!
//! Test sources split into two groups: the internal group, compiled as the
//! package under test, and the external group (`package foo_test`), compiled
//! separately so it can import the internal one. The generated `main`
//! package imports both, registers their tests, and hands control to the
//! testing framework or to a user-supplied `TestMain`.

use std::fmt::Write;
use std::path::PathBuf;

use crate::error::BuildError;
use crate::source::{RUNNER_OVERRIDE, SourceUnit};
use crate::verbose::{dprintln, vprintln};

/// Package name suffix marking an external test file.
pub const EXTERNAL_SUFFIX: &str = "_test";

/// Which half of a test package a group is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKind {
    Internal,
    External,
}

impl GroupKind {
    /// Identifier the generated main package imports the group under.
    pub fn alias(self) -> &'static str {
        match self {
            Self::Internal => "test",
            Self::External => "xtest",
        }
    }
}

/// One compiled half of a test package.
#[derive(Debug, Clone)]
pub struct TestGroup {
    pub kind: GroupKind,
    pub import_path: String,
    /// Base package name shared by both groups (suffix stripped).
    pub package_label: String,
    /// Test functions, in source scan order.
    pub tests: Vec<String>,
    pub declares_runner_override: bool,
    pub sources: Vec<SourceUnit>,
}

impl TestGroup {
    fn new(kind: GroupKind, import_path: String) -> Self {
        Self {
            kind,
            import_path,
            package_label: String::new(),
            tests: Vec::new(),
            declares_runner_override: false,
            sources: Vec::new(),
        }
    }

    pub fn alias(&self) -> &'static str {
        self.kind.alias()
    }

    /// A group with no sources is neither compiled nor imported.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    fn add(&mut self, unit: SourceUnit) {
        self.tests.extend(unit.test_names.iter().cloned());
        self.declares_runner_override |= unit.declares_runner_override;
        self.sources.push(unit);
    }
}

/// Split matched units into internal and external groups.
///
/// `import_path` is the internal group's import path; the external group's
/// is the same with [`EXTERNAL_SUFFIX`] appended.
pub fn partition(
    units: Vec<SourceUnit>,
    import_path: &str,
) -> Result<(TestGroup, TestGroup), BuildError> {
    let mut internal = TestGroup::new(GroupKind::Internal, import_path.to_string());
    let mut external =
        TestGroup::new(GroupKind::External, format!("{import_path}{EXTERNAL_SUFFIX}"));

    // Base package name and the file that established it.
    let mut base: Option<(String, PathBuf)> = None;

    for unit in units.into_iter().filter(|u| u.matches_constraints) {
        let (group, name) = match unit.package_name.strip_suffix(EXTERNAL_SUFFIX) {
            Some(stripped) => (&mut external, stripped.to_string()),
            None => (&mut internal, unit.package_name.clone()),
        };

        if let Some((expected, first_file)) = &base {
            if *expected != name {
                return Err(BuildError::PackageMismatch {
                    file: unit.path.clone(),
                    found: unit.package_name.clone(),
                    expected: expected.clone(),
                    first_file: first_file.clone(),
                });
            }
        } else {
            base = Some((name, unit.path.clone()));
        }
        group.add(unit);
    }

    if let Some((name, _)) = base {
        internal.package_label = name.clone();
        external.package_label = name;
    }
    Ok((internal, external))
}

/// Everything the generated entry point needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestMain {
    /// Directory the test binary changes into before running tests.
    pub run_dir: String,
    pub imports: Vec<MainImport>,
    /// Alias of the group whose `TestMain` takes over, if any.
    pub runner: Option<&'static str>,
}

/// A test group as seen from the generated main package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MainImport {
    pub alias: &'static str,
    pub import_path: String,
    pub tests: Vec<String>,
}

impl TestMain {
    fn from_groups(groups: [&TestGroup; 2], run_dir: &str) -> Self {
        let present = groups.into_iter().filter(|g| !g.is_empty());
        Self {
            run_dir: run_dir.to_string(),
            imports: present
                .clone()
                .map(|g| MainImport {
                    alias: g.alias(),
                    import_path: g.import_path.clone(),
                    tests: g.tests.clone(),
                })
                .collect(),
            runner: present
                .filter(|g| g.declares_runner_override)
                .map(|g| g.alias())
                .next(),
        }
    }
}

/// A partitioned test package and its generated entry point.
#[derive(Debug, Clone)]
pub struct Harness {
    pub internal: TestGroup,
    pub external: TestGroup,
    pub main: TestMain,
    /// Go source of the generated main package.
    pub source: String,
}

/// Partition `units`, pick the runner, and generate the entry point.
pub fn synthesize(
    units: Vec<SourceUnit>,
    import_path: &str,
    run_dir: &str,
) -> Result<Harness, BuildError> {
    let (internal, external) = partition(units, import_path)?;

    if internal.declares_runner_override && external.declares_runner_override {
        let overriding = |g: &TestGroup| {
            g.sources
                .iter()
                .filter(|s| s.declares_runner_override)
                .map(|s| s.path.clone())
                .collect()
        };
        return Err(BuildError::RunnerConflict {
            internal: overriding(&internal),
            external: overriding(&external),
        });
    }

    let main = TestMain::from_groups([&internal, &external], run_dir);
    if main.imports.iter().all(|i| i.tests.is_empty()) && main.runner.is_none() {
        dprintln!("warning: no test functions found for {import_path}");
    }
    vprintln!(
        "  harness: {} internal + {} external test(s), runner {}",
        internal.tests.len(),
        external.tests.len(),
        main.runner.map_or("default".to_string(), |a| format!("{a}.{RUNNER_OVERRIDE}"))
    );

    let source = generate_test_main(&main);
    Ok(Harness {
        internal,
        external,
        main,
        source,
    })
}

/// Render the Go source of the test binary's main package.
pub fn generate_test_main(main: &TestMain) -> String {
    let mut src = String::new();
    // Writing to a String cannot fail.
    let _ = write_test_main(&mut src, main);
    src
}

fn write_test_main(out: &mut String, main: &TestMain) -> std::fmt::Result {
    writeln!(out, "// Code generated by builder. DO NOT EDIT.")?;
    writeln!(out)?;
    writeln!(out, "package main")?;
    writeln!(out)?;
    writeln!(out, "import (")?;
    for std_import in ["log", "os", "testing", "testing/internal/testdeps"] {
        writeln!(out, "\t{}", go_quote(std_import))?;
    }
    if !main.imports.is_empty() {
        writeln!(out)?;
    }
    for import in &main.imports {
        let used = !import.tests.is_empty() || main.runner == Some(import.alias);
        let name = if used { import.alias } else { "_" };
        writeln!(out, "\t{name} {}", go_quote(&import.import_path))?;
    }
    writeln!(out, ")")?;
    writeln!(out)?;

    writeln!(out, "var allTests = []testing.InternalTest{{")?;
    for import in &main.imports {
        for test in &import.tests {
            writeln!(out, "\t{{{}, {}.{test}}},", go_quote(test), import.alias)?;
        }
    }
    writeln!(out, "}}")?;
    writeln!(out)?;

    writeln!(out, "func main() {{")?;
    writeln!(out, "\tif err := os.Chdir({}); err != nil {{", go_quote(&main.run_dir))?;
    writeln!(out, "\t\tlog.Fatalf(\"could not change to test directory: %v\", err)")?;
    writeln!(out, "\t}}")?;
    writeln!(out)?;
    writeln!(
        out,
        "\tm := testing.MainStart(testdeps.TestDeps{{}}, allTests, nil, nil, nil)"
    )?;
    match main.runner {
        Some(alias) => writeln!(out, "\t{alias}.{RUNNER_OVERRIDE}(m)")?,
        None => writeln!(out, "\tos.Exit(m.Run())")?,
    }
    writeln!(out, "}}")
}

/// Quote `s` as a Go interpreted string literal.
fn go_quote(s: &str) -> String {
    let mut quoted = String::with_capacity(s.len() + 2);
    quoted.push('"');
    for c in s.chars() {
        match c {
            '\\' => quoted.push_str("\\\\"),
            '"' => quoted.push_str("\\\""),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            c if (c as u32) < 0x20 || c == '\x7f' => {
                let _ = write!(quoted, "\\x{:02x}", c as u32);
            }
            c => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}
