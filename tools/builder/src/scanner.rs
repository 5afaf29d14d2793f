//! Tokenizer for Go source files.
//!
//! Produces just enough of Go's lexical structure for metadata extraction:
//! identifiers, keywords, decoded string literals, brackets, and the handful
//! of operators the classifier looks at. Everything else collapses into
//! [`TokenKind::Op`]. Comments are dropped, and semicolons are inserted at
//! line ends following the language's automatic semicolon rule, so callers
//! can find statement boundaries without tracking newlines themselves.

use std::path::Path;

use crate::error::BuildError;

/// A token with source location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

/// Source location for error reporting (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub line: usize,
    pub col: usize,
}

/// Token variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Ident(String),
    Keyword(&'static str),
    /// String literal content, quotes stripped and escapes decoded.
    String(String),
    /// Rune literal (content is irrelevant to the classifier).
    Char,
    /// Numeric literal (content is irrelevant to the classifier).
    Number,

    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Dot,
    Star,
    /// Explicit `;` or one inserted at a line end.
    Semicolon,
    /// Any other operator or punctuation.
    Op(&'static str),

    Eof,
}

const KEYWORDS: &[&str] = &[
    "break",
    "case",
    "chan",
    "const",
    "continue",
    "default",
    "defer",
    "else",
    "fallthrough",
    "for",
    "func",
    "go",
    "goto",
    "if",
    "import",
    "interface",
    "map",
    "package",
    "range",
    "return",
    "select",
    "struct",
    "switch",
    "type",
    "var",
];

/// Multi-character operators, longest first so the first prefix match wins.
const OPERATORS: &[&str] = &[
    "<<=", ">>=", "&^=", "...", "&&", "||", "<-", "++", "--", "==", "!=", "<=", ">=", ":=", "+=",
    "-=", "*=", "/=", "%=", "&=", "|=", "^=", "<<", ">>", "&^", "+", "-", "/", "%", "&", "|",
    "^", "<", ">", "=", "!", ":", "~",
];

/// Tokenize Go source text.
///
/// `file` is only used to label errors.
pub fn tokenize(source: &str, file: &Path) -> Result<Vec<Token>, BuildError> {
    Scanner {
        src: source.chars().collect(),
        pos: 0,
        line: 1,
        col: 1,
        file,
        tokens: Vec::new(),
    }
    .run()
}

struct Scanner<'a> {
    src: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
    file: &'a Path,
    tokens: Vec<Token>,
}

impl Scanner<'_> {
    fn run(mut self) -> Result<Vec<Token>, BuildError> {
        loop {
            let span = self.span();
            let Some(ch) = self.peek(0) else {
                self.terminate_line(span);
                self.push(TokenKind::Eof, span);
                return Ok(self.tokens);
            };

            match ch {
                ' ' | '\t' | '\r' => {
                    self.bump();
                }
                '\n' => {
                    self.terminate_line(span);
                    self.bump();
                }
                '/' if self.peek(1) == Some('/') => {
                    while self.peek(0).is_some_and(|c| c != '\n') {
                        self.bump();
                    }
                }
                '/' if self.peek(1) == Some('*') => self.block_comment(span)?,
                '"' => {
                    let value = self.interpreted_string(span)?;
                    self.push(TokenKind::String(value), span);
                }
                '`' => {
                    let value = self.raw_string(span)?;
                    self.push(TokenKind::String(value), span);
                }
                '\'' => {
                    self.rune(span)?;
                    self.push(TokenKind::Char, span);
                }
                c if c.is_ascii_digit()
                    || (c == '.' && self.peek(1).is_some_and(|d| d.is_ascii_digit())) =>
                {
                    self.number();
                    self.push(TokenKind::Number, span);
                }
                c if c == '_' || c.is_alphabetic() => {
                    let word = self.word();
                    let kind = match KEYWORDS.iter().find(|k| **k == word) {
                        Some(k) => TokenKind::Keyword(*k),
                        None => TokenKind::Ident(word),
                    };
                    self.push(kind, span);
                }
                _ => {
                    let kind = self.operator(span)?;
                    self.push(kind, span);
                }
            }
        }
    }

    fn peek(&self, n: usize) -> Option<char> {
        self.src.get(self.pos + n).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.src.get(self.pos).copied()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn span(&self) -> Span {
        Span {
            line: self.line,
            col: self.col,
        }
    }

    fn push(&mut self, kind: TokenKind, span: Span) {
        self.tokens.push(Token { kind, span });
    }

    fn error(&self, span: Span, message: impl Into<String>) -> BuildError {
        BuildError::Parse {
            file: self.file.to_path_buf(),
            line: span.line,
            col: span.col,
            message: message.into(),
        }
    }

    /// Insert a semicolon if the previous token ends a statement.
    fn terminate_line(&mut self, span: Span) {
        let ends_statement = self.tokens.last().is_some_and(|t| {
            matches!(
                t.kind,
                TokenKind::Ident(_)
                    | TokenKind::String(_)
                    | TokenKind::Char
                    | TokenKind::Number
                    | TokenKind::RParen
                    | TokenKind::RBracket
                    | TokenKind::RBrace
                    | TokenKind::Keyword("break" | "continue" | "fallthrough" | "return")
                    | TokenKind::Op("++" | "--")
            )
        });
        if ends_statement {
            self.push(TokenKind::Semicolon, span);
        }
    }

    fn block_comment(&mut self, span: Span) -> Result<(), BuildError> {
        self.bump();
        self.bump();
        let mut has_newline = false;
        loop {
            match self.bump() {
                Some('*') if self.peek(0) == Some('/') => {
                    self.bump();
                    break;
                }
                Some('\n') => has_newline = true,
                Some(_) => {}
                None => return Err(self.error(span, "comment not terminated")),
            }
        }
        // A comment spanning lines acts like a newline.
        if has_newline {
            self.terminate_line(span);
        }
        Ok(())
    }

    fn interpreted_string(&mut self, span: Span) -> Result<String, BuildError> {
        self.bump(); // opening quote
        let mut s = String::new();
        loop {
            match self.bump() {
                Some('"') => return Ok(s),
                Some('\\') => {
                    let c = self.escape(span, '"')?;
                    s.push(c);
                }
                Some('\n') | None => return Err(self.error(span, "string literal not terminated")),
                Some(c) => s.push(c),
            }
        }
    }

    fn raw_string(&mut self, span: Span) -> Result<String, BuildError> {
        self.bump(); // opening backquote
        let mut s = String::new();
        loop {
            match self.bump() {
                Some('`') => return Ok(s),
                Some('\r') => {}
                Some(c) => s.push(c),
                None => return Err(self.error(span, "raw string literal not terminated")),
            }
        }
    }

    fn rune(&mut self, span: Span) -> Result<(), BuildError> {
        self.bump(); // opening quote
        let mut count = 0usize;
        loop {
            match self.bump() {
                Some('\'') => break,
                Some('\\') => {
                    self.escape(span, '\'')?;
                    count += 1;
                }
                Some('\n') | None => return Err(self.error(span, "rune literal not terminated")),
                Some(_) => count += 1,
            }
        }
        if count != 1 {
            return Err(self.error(span, "invalid rune literal"));
        }
        Ok(())
    }

    /// Decode the escape sequence following a backslash.
    fn escape(&mut self, span: Span, quote: char) -> Result<char, BuildError> {
        let Some(c) = self.bump() else {
            return Err(self.error(span, "escape sequence not terminated"));
        };
        let simple = match c {
            'a' => Some('\u{7}'),
            'b' => Some('\u{8}'),
            'f' => Some('\u{c}'),
            'n' => Some('\n'),
            'r' => Some('\r'),
            't' => Some('\t'),
            'v' => Some('\u{b}'),
            '\\' => Some('\\'),
            c if c == quote => Some(c),
            _ => None,
        };
        if let Some(decoded) = simple {
            return Ok(decoded);
        }

        let (digits, radix) = match c {
            '0'..='7' => (2, 8),
            'x' => (2, 16),
            'u' => (4, 16),
            'U' => (8, 16),
            _ => return Err(self.error(span, format!("unknown escape sequence '\\{c}'"))),
        };
        let mut value = if radix == 8 { c.to_digit(8).unwrap_or(0) } else { 0 };
        for _ in 0..digits {
            let digit = self.bump().and_then(|d| d.to_digit(radix));
            match digit {
                Some(d) => value = value * radix + d,
                None => return Err(self.error(span, "invalid escape sequence")),
            }
        }
        char::from_u32(value).ok_or_else(|| self.error(span, "escape sequence is invalid Unicode code point"))
    }

    fn number(&mut self) {
        let is_hex = self.peek(0) == Some('0') && matches!(self.peek(1), Some('x' | 'X'));
        while let Some(c) = self.peek(0) {
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' {
                self.bump();
                let exponent = if is_hex {
                    matches!(c, 'p' | 'P')
                } else {
                    matches!(c, 'e' | 'E' | 'p' | 'P')
                };
                if exponent && matches!(self.peek(0), Some('+' | '-')) {
                    self.bump();
                }
            } else {
                break;
            }
        }
    }

    fn word(&mut self) -> String {
        let mut word = String::new();
        while let Some(c) = self.peek(0) {
            if c == '_' || c.is_alphanumeric() {
                word.push(c);
                self.bump();
            } else {
                break;
            }
        }
        word
    }

    fn operator(&mut self, span: Span) -> Result<TokenKind, BuildError> {
        let Some(c) = self.peek(0) else {
            return Ok(TokenKind::Eof);
        };
        let single = match c {
            '(' => Some(TokenKind::LParen),
            ')' => Some(TokenKind::RParen),
            '[' => Some(TokenKind::LBracket),
            ']' => Some(TokenKind::RBracket),
            '{' => Some(TokenKind::LBrace),
            '}' => Some(TokenKind::RBrace),
            ',' => Some(TokenKind::Comma),
            ';' => Some(TokenKind::Semicolon),
            '.' if self.peek(1) != Some('.') => Some(TokenKind::Dot),
            '*' if self.peek(1) != Some('=') => Some(TokenKind::Star),
            _ => None,
        };
        if let Some(kind) = single {
            self.bump();
            return Ok(kind);
        }

        for op in OPERATORS {
            let matches = op.chars().enumerate().all(|(i, oc)| self.peek(i) == Some(oc));
            if matches {
                for _ in 0..op.chars().count() {
                    self.bump();
                }
                return Ok(TokenKind::Op(*op));
            }
        }
        Err(self.error(span, format!("invalid character {c:?}")))
    }
}
