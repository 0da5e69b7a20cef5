use std::sync::Arc;

use crate::Result;
use crate::error::{Error, Position};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Literal text between markers.
    Html,
    /// `{{ }} {% %}` markers and operators.
    Symbol,
    Identifier,
    Keyword,
    String,
    Number,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub val: String,
    pub pos: Position,
    /// Set on `{{-`, `{%-`, `-}}` and `-%}` markers.
    pub trim: bool,
}

impl Token {
    pub fn is(&self, kind: TokenKind, val: &str) -> bool {
        self.kind == kind && self.val == val
    }
}

const KEYWORDS: &[&str] = &[
    "in", "and", "or", "not", "true", "false", "nil", "as", "export", "reversed", "sorted",
    "only", "with",
];

// Longest first.
const SYMBOLS: &[&str] = &[
    "==", "!=", "<=", ">=", "&&", "||", "<", ">", "+", "-", "*", "/", "%", "!", "(", ")", "[",
    "]", ",", ".", ":", "|", "=",
];

struct Lexer<'a> {
    name: Arc<str>,
    src: &'a str,
    pos: usize,
    line: usize,
    col: usize,
    tokens: Vec<Token>,
}

/// Splits template source into tokens. `{# ... #}` comments are dropped.
pub fn lex(name: Arc<str>, src: &str) -> Result<Vec<Token>> {
    let mut lexer = Lexer {
        name,
        src,
        pos: 0,
        line: 1,
        col: 1,
        tokens: Vec::new(),
    };
    lexer.run()?;
    Ok(lexer.tokens)
}

impl<'a> Lexer<'a> {
    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn here(&self) -> Position {
        Position::new(self.name.clone(), self.line, self.col)
    }

    fn advance(&mut self, bytes: usize) {
        for c in self.src[self.pos..self.pos + bytes].chars() {
            if c == '\n' {
                self.line += 1;
                self.col = 1;
            } else {
                self.col += 1;
            }
        }
        self.pos += bytes;
    }

    fn emit(&mut self, kind: TokenKind, val: String, pos: Position, trim: bool) {
        self.tokens.push(Token {
            kind,
            val,
            pos,
            trim,
        });
    }

    fn run(&mut self) -> Result<()> {
        while self.pos < self.src.len() {
            let rest = self.rest();
            let next = ["{{", "{%", "{#"]
                .iter()
                .filter_map(|m| rest.find(m))
                .min()
                .unwrap_or(rest.len());

            if next > 0 {
                let pos = self.here();
                let text = rest[..next].to_string();
                self.advance(next);
                self.emit(TokenKind::Html, text, pos, false);
                continue;
            }

            if rest.starts_with("{#") {
                let start = self.here();
                match rest.find("#}") {
                    Some(end) => self.advance(end + 2),
                    None => return Err(Error::syntax(&start, "Unterminated comment")),
                }
                continue;
            }

            self.lex_tag()?;
        }
        Ok(())
    }

    /// Lexes one `{{ ... }}` or `{% ... %}` including its markers.
    fn lex_tag(&mut self) -> Result<()> {
        let start = self.here();
        let open = &self.rest()[..2];
        let close = if open == "{{" { "}}" } else { "%}" };
        let trim = self.rest()[2..].starts_with('-');
        self.emit(TokenKind::Symbol, open.to_string(), start.clone(), trim);
        self.advance(if trim { 3 } else { 2 });

        loop {
            let rest = self.rest();
            let trimmed = rest.trim_start();
            self.advance(rest.len() - trimmed.len());
            let rest = self.rest();
            if rest.is_empty() {
                return Err(Error::syntax(
                    &start,
                    format!("Unterminated tag, expected '{}'", close),
                ));
            }

            let pos = self.here();
            if rest.starts_with(close) {
                self.emit(TokenKind::Symbol, close.to_string(), pos, false);
                self.advance(2);
                return Ok(());
            }
            if rest.starts_with('-') && rest[1..].starts_with(close) {
                self.emit(TokenKind::Symbol, close.to_string(), pos, true);
                self.advance(3);
                return Ok(());
            }

            let c = rest.chars().next().unwrap_or_default();
            if c == '"' || c == '\'' {
                self.lex_string(c)?;
            } else if c.is_ascii_digit() {
                let len = number_len(rest);
                self.emit(TokenKind::Number, rest[..len].to_string(), pos, false);
                self.advance(len);
            } else if c.is_alphabetic() || c == '_' {
                let len = rest
                    .find(|c: char| !(c.is_alphanumeric() || c == '_'))
                    .unwrap_or(rest.len());
                let word = &rest[..len];
                let kind = if KEYWORDS.contains(&word) {
                    TokenKind::Keyword
                } else {
                    TokenKind::Identifier
                };
                self.emit(kind, word.to_string(), pos, false);
                self.advance(len);
            } else if let Some(sym) = SYMBOLS.iter().find(|s| rest.starts_with(**s)) {
                self.emit(TokenKind::Symbol, sym.to_string(), pos, false);
                self.advance(sym.len());
            } else {
                return Err(Error::syntax(&pos, format!("Unexpected character '{}'", c)));
            }
        }
    }

    fn lex_string(&mut self, quote: char) -> Result<()> {
        let pos = self.here();
        let mut out = String::new();
        let mut chars = self.rest().char_indices().skip(1);
        while let Some((i, c)) = chars.next() {
            match c {
                '\\' => match chars.next() {
                    Some((_, 'n')) => out.push('\n'),
                    Some((_, 't')) => out.push('\t'),
                    Some((_, 'r')) => out.push('\r'),
                    Some((_, other)) => out.push(other),
                    None => break,
                },
                c if c == quote => {
                    self.emit(TokenKind::String, out, pos, false);
                    self.advance(i + 1);
                    return Ok(());
                }
                c => out.push(c),
            }
        }
        Err(Error::syntax(&pos, "Unterminated string literal"))
    }
}

fn number_len(s: &str) -> usize {
    let digits = |s: &str| s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let int_len = digits(s);
    let after = &s[int_len..];
    // a fraction needs a digit after the dot, so `list.0.name` stays member access
    if after.starts_with('.') && after[1..].starts_with(|c: char| c.is_ascii_digit()) {
        return int_len + 1 + digits(&after[1..]);
    }
    int_len
}
