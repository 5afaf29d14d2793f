//! Source classification.
//!
//! [`classify`] decides whether a file participates in the build and, if it
//! does, extracts the metadata the rest of the builder needs: the package
//! name, imported paths in declaration order, test functions, and whether the
//! file defines `TestMain`. This is a narrow scan over the token stream from
//! [`crate::scanner`], not a parser; nothing outside this module sees tokens.

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use crate::constraint::BuildContext;
use crate::error::BuildError;
use crate::scanner::{self, Span, Token, TokenKind};
use crate::verbose::vprintln;

/// Prefix shared by test functions and the runner override.
pub const TEST_PREFIX: &str = "Test";

/// Name of the function that takes over test execution.
pub const RUNNER_OVERRIDE: &str = "TestMain";

/// Metadata extracted from one source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUnit {
    pub path: PathBuf,
    /// `false` if build constraints exclude the file; all other fields are
    /// then empty.
    pub matches_constraints: bool,
    pub package_name: String,
    /// Import paths in declaration order. Duplicates are kept.
    pub imports: Vec<String>,
    /// Test functions in source order (`_test.go` files only).
    pub test_names: Vec<String>,
    pub declares_runner_override: bool,
}

impl SourceUnit {
    fn excluded(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            matches_constraints: false,
            package_name: String::new(),
            imports: Vec::new(),
            test_names: Vec::new(),
            declares_runner_override: false,
        }
    }
}

/// Classify the source file at `path`.
///
/// Files excluded by build constraints are returned with
/// `matches_constraints == false` rather than as an error.
pub fn classify(path: &Path, ctx: &BuildContext) -> Result<SourceUnit, BuildError> {
    let name = path.file_name().and_then(OsStr::to_str).unwrap_or_default();
    if !ctx.match_file_name(name) {
        vprintln!("  exclude {} (file name)", path.display());
        return Ok(SourceUnit::excluded(path));
    }

    let content = fs::read_to_string(path).map_err(|e| BuildError::io(path, e))?;
    classify_source(path, &content, ctx)
}

/// Classify every file in `paths`, in order.
pub fn classify_all(paths: &[PathBuf], ctx: &BuildContext) -> Result<Vec<SourceUnit>, BuildError> {
    paths.iter().map(|p| classify(p, ctx)).collect()
}

/// Classify already-loaded source text. The file name is only consulted to
/// decide whether test functions should be collected.
pub fn classify_source(
    path: &Path,
    content: &str,
    ctx: &BuildContext,
) -> Result<SourceUnit, BuildError> {
    let matched = ctx.should_build(content).map_err(|message| BuildError::Parse {
        file: path.to_path_buf(),
        line: 1,
        col: 1,
        message,
    })?;
    if !matched {
        vprintln!("  exclude {} (build constraints)", path.display());
        return Ok(SourceUnit::excluded(path));
    }

    let is_test_file = path
        .file_name()
        .and_then(OsStr::to_str)
        .is_some_and(|n| n.ends_with("_test.go"));

    let tokens = scanner::tokenize(content, path)?;
    let unit = FileScan {
        tokens,
        pos: 0,
        file: path,
    }
    .scan(is_test_file)?;

    vprintln!(
        "  classify {}: package {}, {} import(s), {} test(s){}",
        path.display(),
        unit.package_name,
        unit.imports.len(),
        unit.test_names.len(),
        if unit.declares_runner_override { ", TestMain" } else { "" }
    );
    Ok(unit)
}

/// What a top-level function declaration turned out to be.
enum FuncKind {
    Test(String),
    RunnerOverride,
    Other,
}

struct FileScan<'a> {
    tokens: Vec<Token>,
    pos: usize,
    file: &'a Path,
}

impl FileScan<'_> {
    fn scan(mut self, is_test_file: bool) -> Result<SourceUnit, BuildError> {
        let package_name = self.package_clause()?;
        let imports = self.imports()?;

        let mut unit = SourceUnit {
            path: self.file.to_path_buf(),
            matches_constraints: true,
            package_name,
            imports,
            test_names: Vec::new(),
            declares_runner_override: false,
        };

        let mut depth = 0usize;
        let mut at_statement_start = true;
        loop {
            let token = self.next();
            match token.kind {
                TokenKind::Eof => {
                    if depth != 0 {
                        return Err(self.error(token.span, "unexpected EOF"));
                    }
                    break;
                }
                TokenKind::Semicolon => {
                    if depth == 0 {
                        at_statement_start = true;
                    }
                    continue;
                }
                TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace => depth += 1,
                TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => {
                    if depth == 0 {
                        return Err(self.error(token.span, "unbalanced closing bracket"));
                    }
                    depth -= 1;
                }
                TokenKind::Keyword("import") if depth == 0 && at_statement_start => {
                    return Err(
                        self.error(token.span, "imports must appear before other declarations")
                    );
                }
                TokenKind::Keyword("func") if depth == 0 && at_statement_start => {
                    match self.func_decl()? {
                        FuncKind::Test(name) if is_test_file => unit.test_names.push(name),
                        FuncKind::RunnerOverride if is_test_file => {
                            unit.declares_runner_override = true;
                        }
                        _ => {}
                    }
                }
                _ => {}
            }
            at_statement_start = false;
        }

        Ok(unit)
    }

    fn peek(&self) -> &TokenKind {
        // The scanner always terminates the stream with Eof.
        &self.tokens[self.pos.min(self.tokens.len() - 1)].kind
    }

    fn next(&mut self) -> Token {
        let token = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn span(&self) -> Span {
        self.tokens[self.pos.min(self.tokens.len() - 1)].span
    }

    fn error(&self, span: Span, message: impl Into<String>) -> BuildError {
        BuildError::Parse {
            file: self.file.to_path_buf(),
            line: span.line,
            col: span.col,
            message: message.into(),
        }
    }

    fn expect_semicolon(&mut self) -> Result<(), BuildError> {
        match self.peek() {
            TokenKind::Semicolon => {
                self.pos += 1;
                Ok(())
            }
            TokenKind::Eof => Ok(()),
            _ => Err(self.error(self.span(), "expected ';' or newline")),
        }
    }

    fn package_clause(&mut self) -> Result<String, BuildError> {
        if *self.peek() != TokenKind::Keyword("package") {
            return Err(self.error(self.span(), "expected 'package'"));
        }
        self.pos += 1;

        let span = self.span();
        let TokenKind::Ident(name) = self.next().kind else {
            return Err(self.error(span, "expected package name"));
        };
        if name == "_" {
            return Err(self.error(span, "invalid package name _"));
        }
        self.expect_semicolon()?;
        Ok(name)
    }

    fn imports(&mut self) -> Result<Vec<String>, BuildError> {
        let mut imports = Vec::new();
        while *self.peek() == TokenKind::Keyword("import") {
            self.pos += 1;
            if *self.peek() == TokenKind::LParen {
                self.pos += 1;
                loop {
                    match self.peek() {
                        TokenKind::Semicolon => self.pos += 1,
                        TokenKind::RParen => {
                            self.pos += 1;
                            break;
                        }
                        _ => {
                            imports.push(self.import_spec()?);
                            if *self.peek() != TokenKind::RParen {
                                self.expect_semicolon()?;
                            }
                        }
                    }
                }
            } else {
                imports.push(self.import_spec()?);
            }
            self.expect_semicolon()?;
        }
        Ok(imports)
    }

    /// `[name | . | _] "path"`
    fn import_spec(&mut self) -> Result<String, BuildError> {
        if matches!(self.peek(), TokenKind::Ident(_) | TokenKind::Dot) {
            self.pos += 1;
        }
        let span = self.span();
        match self.next().kind {
            TokenKind::String(path) if !path.is_empty() => Ok(path),
            TokenKind::String(_) => Err(self.error(span, "invalid import path: empty string")),
            _ => Err(self.error(span, "expected import path")),
        }
    }

    /// Inspect a top-level `func` declaration. On entry the cursor is just
    /// past `func`; on return it is past the parameter list (or unchanged for
    /// methods and generic functions, which are never tests).
    fn func_decl(&mut self) -> Result<FuncKind, BuildError> {
        let name = match self.peek() {
            TokenKind::Ident(name) => name.clone(),
            // Method receiver.
            TokenKind::LParen => return Ok(FuncKind::Other),
            _ => return Err(self.error(self.span(), "expected function name")),
        };
        self.pos += 1;

        match self.peek() {
            TokenKind::LParen => {}
            // Type parameters.
            TokenKind::LBracket => return Ok(FuncKind::Other),
            _ => return Err(self.error(self.span(), "expected '('")),
        }
        let params = self.parenthesized()?;
        let has_results = !matches!(
            self.peek(),
            TokenKind::LBrace | TokenKind::Semicolon | TokenKind::Eof
        );

        if !name.starts_with(TEST_PREFIX) {
            return Ok(FuncKind::Other);
        }
        let param_type = single_pointer_param(&params);
        if name == RUNNER_OVERRIDE {
            if param_type == Some("M") {
                return Ok(FuncKind::RunnerOverride);
            }
            return Ok(FuncKind::Other);
        }
        if is_test_name(&name) && param_type == Some("T") && !has_results {
            return Ok(FuncKind::Test(name));
        }
        Ok(FuncKind::Other)
    }

    /// Consume a balanced `( ... )` and return the tokens inside it.
    fn parenthesized(&mut self) -> Result<Vec<TokenKind>, BuildError> {
        let open = self.span();
        self.pos += 1;
        let mut inner = Vec::new();
        let mut depth = 1usize;
        loop {
            let token = self.next();
            match token.kind {
                TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace => depth += 1,
                TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(inner);
                    }
                }
                TokenKind::Eof => return Err(self.error(open, "unclosed parameter list")),
                _ => {}
            }
            inner.push(token.kind);
        }
    }
}

/// `Test`, or `Test` followed by something other than a lowercase letter.
fn is_test_name(name: &str) -> bool {
    match name.strip_prefix(TEST_PREFIX).and_then(|rest| rest.chars().next()) {
        Some(c) => !c.is_lowercase(),
        None => name == TEST_PREFIX,
    }
}

/// If `params` is exactly one parameter of type `*pkg.Sel` (optionally
/// named), return `Sel`.
fn single_pointer_param(params: &[TokenKind]) -> Option<&str> {
    let mut tokens = params;
    if let Some((TokenKind::Comma, rest)) = tokens.split_last() {
        tokens = rest;
    }
    if let [TokenKind::Ident(_), rest @ ..] = tokens {
        if rest.first() == Some(&TokenKind::Star) {
            tokens = rest;
        }
    }
    match tokens {
        [TokenKind::Star, TokenKind::Ident(_), TokenKind::Dot, TokenKind::Ident(sel)] => {
            Some(sel.as_str())
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> BuildContext {
        BuildContext::new("linux", "amd64", [])
    }

    fn scan(name: &str, src: &str) -> SourceUnit {
        classify_source(Path::new(name), src, &ctx()).unwrap()
    }

    #[test]
    fn package_and_imports_in_declaration_order() {
        let unit = scan(
            "bar.go",
            r#"// Package bar does things.
package bar

import "fmt"

import (
	"rules_go_simple/tests/baz"
	. "strings"
	_ "embed"
	str "strconv"; "fmt"
)

func Bar() { fmt.Println("bar"); baz.Baz() }
"#,
        );
        assert!(unit.matches_constraints);
        assert_eq!(unit.package_name, "bar");
        assert_eq!(
            unit.imports,
            ["fmt", "rules_go_simple/tests/baz", "strings", "embed", "strconv", "fmt"]
        );
        assert!(unit.test_names.is_empty());
    }

    #[test]
    fn test_functions_and_runner_override() {
        let unit = scan(
            "external_test.go",
            r#"package ix_test

import (
	"testing"
	"rules_go_simple/tests/ix"
)

var TestFooHelperCalled = false

func TestFooHelper(t *testing.T) {
	if got := ix.Helper(ix.Foo); got != "foofoo" {
		t.Errorf("got %q", got)
	}
	TestFooHelperCalled = true
}

func TestMain(m *testing.M) {
	os.Exit(m.Run())
}

func Test(t *testing.T) {}
"#,
        );
        assert_eq!(unit.package_name, "ix_test");
        assert_eq!(unit.test_names, ["TestFooHelper", "Test"]);
        assert!(unit.declares_runner_override);
    }

    #[test]
    fn shapes_that_are_not_tests() {
        let unit = scan(
            "shapes_test.go",
            r#"package p

import "testing"

type S struct{}

func (s *S) TestMethod(t *testing.T) {}
func TestGeneric[X any](t *testing.T) {}
func TestResult(t *testing.T) error { return nil }
func TestTwo(t *testing.T, u *testing.T) {}
func TestBench(b *testing.B) {}
func Testlower(t *testing.T) {}
func TestValue(t testing.T) {}
func TestMain(t *testing.T) {}
func helper(t *testing.T) {}

var TestVar = func(t *testing.T) {}

func TestNested(t *testing.T) {
	f := func() {}
	_ = f
}

func TestTrailingComma(
	t *testing.T,
) {
}
"#,
        );
        assert_eq!(unit.test_names, ["TestNested", "TestTrailingComma"]);
        assert!(!unit.declares_runner_override);
    }

    #[test]
    fn tests_only_collected_from_test_files() {
        let unit = scan(
            "lib.go",
            "package ix\n\nimport \"testing\"\n\nfunc TestLib(t *testing.T) {}\n",
        );
        assert!(unit.test_names.is_empty());
        assert_eq!(unit.imports, ["testing"]);
    }

    #[test]
    fn excluded_by_constraint_is_not_an_error() {
        let unit = scan("win.go", "//go:build windows\n\npackage p\n\nthis is not go\n");
        assert!(!unit.matches_constraints);
        assert!(unit.package_name.is_empty());
        assert!(unit.imports.is_empty());
    }

    #[test]
    fn constraint_directly_above_package_excludes() {
        let unit = scan("win.go", "//go:build windows\npackage p\n\nimport \"golang.org/x/sys/windows\"\n");
        assert!(!unit.matches_constraints);
        assert!(unit.imports.is_empty());
    }

    #[test]
    fn excluded_by_file_name_skips_reading() {
        // The file does not exist; a name mismatch must not try to read it.
        let unit = classify(Path::new("/nonexistent/foo_windows.go"), &ctx()).unwrap();
        assert!(!unit.matches_constraints);
    }

    #[test]
    fn classify_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("foo_test.go");
        std::fs::write(&path, "package foo\n\nimport \"testing\"\n\nfunc TestFoo(t *testing.T) {}\n")
            .unwrap();
        let unit = classify(&path, &ctx()).unwrap();
        assert_eq!(unit.path, path);
        assert_eq!(unit.test_names, ["TestFoo"]);
    }

    #[test]
    fn missing_package_clause() {
        let err = classify_source(Path::new("x.go"), "import \"fmt\"\n", &ctx()).unwrap_err();
        assert!(err.to_string().contains("expected 'package'"), "{err}");
    }

    #[test]
    fn late_import_is_an_error() {
        let err = classify_source(
            Path::new("x.go"),
            "package p\n\nvar x = 1\n\nimport \"fmt\"\n",
            &ctx(),
        )
        .unwrap_err();
        match err {
            BuildError::Parse { line, message, .. } => {
                assert_eq!(line, 5);
                assert!(message.contains("imports must appear"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn non_string_import_path() {
        let err = classify_source(Path::new("x.go"), "package p\nimport fmt\n", &ctx()).unwrap_err();
        assert!(err.to_string().contains("expected import path"), "{err}");
    }

    #[test]
    fn unbalanced_braces() {
        let err =
            classify_source(Path::new("x_test.go"), "package p\nfunc f() {\n", &ctx()).unwrap_err();
        assert!(err.to_string().contains("unexpected EOF"), "{err}");
    }
}
