//! Build constraint evaluation.
//!
//! A source file participates in a build only if its name and its leading
//! constraint comments are satisfied by the target platform and tag set.
//! File names are checked with [`BuildContext::match_file_name`]; contents
//! with [`BuildContext::should_build`], which honors `//go:build` expressions
//! and falls back to legacy `// +build` lines.

use std::collections::BTreeSet;

/// Operating systems recognized in file-name suffixes and tags.
const KNOWN_OS: &[&str] = &[
    "aix", "android", "darwin", "dragonfly", "freebsd", "hurd", "illumos", "ios", "js", "linux",
    "nacl", "netbsd", "openbsd", "plan9", "solaris", "wasip1", "windows", "zos",
];

/// Operating systems that satisfy the `unix` tag.
const UNIX_OS: &[&str] = &[
    "aix", "android", "darwin", "dragonfly", "freebsd", "hurd", "illumos", "ios", "linux",
    "netbsd", "openbsd", "solaris",
];

/// Architectures recognized in file-name suffixes and tags.
const KNOWN_ARCH: &[&str] = &[
    "386", "amd64", "amd64p32", "arm", "armbe", "arm64", "arm64be", "loong64", "mips", "mipsle",
    "mips64", "mips64le", "mips64p32", "mips64p32le", "ppc", "ppc64", "ppc64le", "riscv",
    "riscv64", "s390", "s390x", "sparc", "sparc64", "wasm",
];

/// Newest Go minor release whose `go1.N` tag is satisfied.
pub const RELEASE_MINOR: u32 = 23;

/// The target platform and tag set constraints are evaluated against.
#[derive(Debug, Clone)]
pub struct BuildContext {
    pub goos: String,
    pub goarch: String,
    /// Extra user tags (`--tags`).
    pub tags: BTreeSet<String>,
}

impl BuildContext {
    pub fn new(goos: &str, goarch: &str, tags: impl IntoIterator<Item = String>) -> Self {
        Self {
            goos: goos.to_string(),
            goarch: goarch.to_string(),
            tags: tags.into_iter().collect(),
        }
    }

    /// Report whether `tag` is satisfied.
    pub fn match_tag(&self, tag: &str) -> bool {
        if tag == self.goos || tag == self.goarch {
            return true;
        }
        match tag {
            "linux" if self.goos == "android" => return true,
            "solaris" if self.goos == "illumos" => return true,
            "darwin" if self.goos == "ios" => return true,
            "unix" => return UNIX_OS.contains(&self.goos.as_str()),
            "gc" => return true,
            // cgo is never enabled.
            "cgo" => return false,
            _ => {}
        }
        if let Some(minor) = tag.strip_prefix("go1.") {
            if let Ok(minor) = minor.parse::<u32>() {
                return (1..=RELEASE_MINOR).contains(&minor);
            }
        }
        self.tags.contains(tag)
    }

    /// Check the `_GOOS`, `_GOARCH`, and `_GOOS_GOARCH` file-name suffixes.
    ///
    /// Only `.go` files whose names do not start with `_` or `.` are
    /// considered; a trailing `_test` is ignored when reading the suffix.
    pub fn match_file_name(&self, name: &str) -> bool {
        if name.starts_with('_') || name.starts_with('.') {
            return false;
        }
        let Some(stem) = name.strip_suffix(".go") else {
            return false;
        };
        let stem = stem.strip_suffix("_test").unwrap_or(stem);
        let Some(idx) = stem.find('_') else {
            return true;
        };

        let parts: Vec<&str> = stem[idx..].split('_').collect();
        let n = parts.len();
        if n >= 2 && KNOWN_OS.contains(&parts[n - 2]) && KNOWN_ARCH.contains(&parts[n - 1]) {
            return self.match_tag(parts[n - 2]) && self.match_tag(parts[n - 1]);
        }
        let last = parts[n - 1];
        if KNOWN_OS.contains(&last) || KNOWN_ARCH.contains(&last) {
            return self.match_tag(last);
        }
        true
    }

    /// Evaluate the constraint comments at the top of a source file.
    ///
    /// A `//go:build` line counts anywhere in the leading block of comments
    /// and blank lines, even directly above `package`. Legacy `// +build`
    /// lines only count when followed by a blank line, so a package doc
    /// comment is never mistaken for one. A `//go:build` line takes
    /// precedence over any `// +build` lines.
    pub fn should_build(&self, content: &str) -> Result<bool, String> {
        let (header, plus_build_end) = constraint_header(content);

        let mut go_build = None;
        let mut plus_build = Vec::new();
        for (i, line) in header.into_iter().enumerate() {
            if let Some(expr) = line.strip_prefix("//go:build") {
                if expr.starts_with(|c: char| c.is_whitespace()) || expr.is_empty() {
                    if go_build.is_some() {
                        return Err("multiple //go:build comments".into());
                    }
                    go_build = Some(expr.trim());
                }
            } else if let Some(rest) = line.strip_prefix("//") {
                if i >= plus_build_end {
                    continue;
                }
                let rest = rest.trim_start();
                if let Some(terms) = rest.strip_prefix("+build") {
                    if terms.is_empty() || terms.starts_with(|c: char| c.is_whitespace()) {
                        plus_build.push(terms.trim());
                    }
                }
            }
        }

        if let Some(expr) = go_build {
            let parsed = Expr::parse(expr)?;
            return Ok(parsed.eval(self));
        }
        Ok(plus_build.iter().all(|line| self.eval_plus_build(line)))
    }

    /// A `// +build` line: options separated by spaces are ORed, terms
    /// separated by commas within one option are ANDed.
    fn eval_plus_build(&self, line: &str) -> bool {
        line.split_whitespace().any(|option| {
            option.split(',').all(|term| match term.strip_prefix('!') {
                Some(neg) if neg.starts_with('!') => false,
                Some(neg) => valid_tag(neg) && !self.match_tag(neg),
                None => valid_tag(term) && self.match_tag(term),
            })
        })
    }
}

/// Lines of the leading comment block, and how many of them precede its
/// last blank line.
fn constraint_header(content: &str) -> (Vec<&str>, usize) {
    let mut header = Vec::new();
    let mut last_blank = 0;
    let mut in_block_comment = false;

    for line in content.lines() {
        let trimmed = line.trim();
        if in_block_comment {
            if let Some(idx) = trimmed.find("*/") {
                in_block_comment = false;
                if !trimmed[idx + 2..].trim().is_empty() {
                    break;
                }
            }
            continue;
        }
        if trimmed.is_empty() {
            header.push(trimmed);
            last_blank = header.len();
        } else if trimmed.starts_with("//") {
            header.push(trimmed);
        } else if let Some(rest) = trimmed.strip_prefix("/*") {
            // Block comments may sit between constraint lines; skip them.
            match rest.find("*/") {
                Some(idx) if rest[idx + 2..].trim().is_empty() => {}
                Some(_) => break,
                None => in_block_comment = true,
            }
        } else {
            break;
        }
    }

    (header, last_blank)
}

fn valid_tag(tag: &str) -> bool {
    !tag.is_empty()
        && tag
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '.')
}

/// A parsed `//go:build` expression.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Expr {
    Tag(String),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

impl Expr {
    fn parse(src: &str) -> Result<Expr, String> {
        let tokens = lex_expr(src)?;
        let mut parser = ExprParser { tokens, pos: 0 };
        let expr = parser.or()?;
        if parser.pos != parser.tokens.len() {
            return Err(format!("invalid //go:build expression: {src:?}"));
        }
        Ok(expr)
    }

    fn eval(&self, ctx: &BuildContext) -> bool {
        match self {
            Expr::Tag(tag) => ctx.match_tag(tag),
            Expr::Not(inner) => !inner.eval(ctx),
            Expr::And(a, b) => a.eval(ctx) && b.eval(ctx),
            Expr::Or(a, b) => a.eval(ctx) || b.eval(ctx),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ExprToken {
    Tag(String),
    Not,
    And,
    Or,
    LParen,
    RParen,
}

fn lex_expr(src: &str) -> Result<Vec<ExprToken>, String> {
    let mut tokens = Vec::new();
    let mut chars = src.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '!' => {
                chars.next();
                tokens.push(ExprToken::Not);
            }
            '(' => {
                chars.next();
                tokens.push(ExprToken::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(ExprToken::RParen);
            }
            '&' | '|' => {
                chars.next();
                if chars.next() != Some(c) {
                    return Err(format!("invalid //go:build expression: {src:?}"));
                }
                tokens.push(if c == '&' { ExprToken::And } else { ExprToken::Or });
            }
            c if c.is_alphanumeric() || c == '_' || c == '.' => {
                let mut tag = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_alphanumeric() || c == '_' || c == '.' {
                        tag.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(ExprToken::Tag(tag));
            }
            _ => return Err(format!("invalid character {c:?} in //go:build expression")),
        }
    }
    Ok(tokens)
}

/// Recursive descent over `or := and ('||' and)*`, `and := not ('&&' not)*`,
/// `not := '!' not | '(' or ')' | tag`.
struct ExprParser {
    tokens: Vec<ExprToken>,
    pos: usize,
}

impl ExprParser {
    fn peek(&self) -> Option<&ExprToken> {
        self.tokens.get(self.pos)
    }

    fn or(&mut self) -> Result<Expr, String> {
        let mut lhs = self.and()?;
        while self.peek() == Some(&ExprToken::Or) {
            self.pos += 1;
            let rhs = self.and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and(&mut self) -> Result<Expr, String> {
        let mut lhs = self.not()?;
        while self.peek() == Some(&ExprToken::And) {
            self.pos += 1;
            let rhs = self.not()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn not(&mut self) -> Result<Expr, String> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        match token {
            Some(ExprToken::Not) => Ok(Expr::Not(Box::new(self.not()?))),
            Some(ExprToken::LParen) => {
                let inner = self.or()?;
                if self.peek() != Some(&ExprToken::RParen) {
                    return Err("missing ')' in //go:build expression".into());
                }
                self.pos += 1;
                Ok(inner)
            }
            Some(ExprToken::Tag(tag)) => Ok(Expr::Tag(tag)),
            Some(other) => Err(format!("unexpected {other:?} in //go:build expression")),
            None => Err("unexpected end of //go:build expression".into()),
        }
    }
}
