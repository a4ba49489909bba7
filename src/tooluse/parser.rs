//! Grammar-driven extraction of structured calls from generated text.
//!
//! A completed span parses into zero or more calls, or fails with
//! diagnostics; the conversation layer maps failure to a plain-text
//! fallback, never a hard error. Grammar:
//!
//! ```text
//! span  := call {separator call} ;          separator := NEWLINE | ';'
//! call  := name '(' [arg {',' arg}] ')' ;   name := IDENT {'.' IDENT}
//! arg   := IDENT '=' value ;
//! value := STRING | NUMBER | BOOL | NULL | list | call ;
//! list  := '[' [value {',' value}] ']' ;
//! ```
//!
//! The span may be wrapped in a markdown code fence (```` ```tool_code ````
//! or similar), which is stripped before lexing.

use std::fmt;

/// One structured call recovered from generated text.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    /// Function name, possibly dotted (e.g. `api.get_weather`).
    pub name: String,
    /// Named arguments in source order.
    pub args: Vec<(String, ArgValue)>,
}

impl Call {
    /// Look up an argument by name.
    pub fn arg(&self, name: &str) -> Option<&ArgValue> {
        self.args.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

/// Raw argument value; literals nest through lists and calls.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
    List(Vec<ArgValue>),
    Call(Box<Call>),
}

/// A single parse problem with its byte offset in the (fence-stripped) span.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub position: usize,
    pub message: String,
}

/// Failure outcome of [`parse_calls`]: the span is not call syntax.
///
/// This is a soft signal; callers fall back to treating the span as plain
/// text.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseFailure {
    pub diagnostics: Vec<Diagnostic>,
}

impl fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unparseable call span")?;
        for d in &self.diagnostics {
            write!(f, "; at {}: {}", d.position, d.message)?;
        }
        Ok(())
    }
}

/// Remove one matched pair of leading/trailing quote characters.
///
/// The pair must be the same character, either `'` or `"`. Anything shorter
/// than two characters, mismatched, or one-sided is returned unchanged.
pub fn strip_quotes(text: &str) -> &str {
    let bytes = text.as_bytes();
    if bytes.len() < 2 {
        return text;
    }
    let first = bytes[0];
    if (first == b'"' || first == b'\'') && bytes[bytes.len() - 1] == first {
        &text[1..text.len() - 1]
    } else {
        text
    }
}

/// Parse a completed text span into structured calls.
///
/// A whitespace-only span yields zero calls. Any lexical or syntactic
/// problem (including trailing prose after the last call) fails with
/// diagnostics instead of panicking or guessing.
pub fn parse_calls(text: &str) -> Result<Vec<Call>, ParseFailure> {
    let span = strip_code_fence(text);
    if span.trim().is_empty() {
        return Ok(Vec::new());
    }
    let tokens = lex(span).map_err(|d| ParseFailure {
        diagnostics: vec![d],
    })?;
    Parser::new(tokens).parse_span()
}

/// Strip a surrounding markdown code fence, if present.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. "tool_code") on the opening line.
    match body.split_once('\n') {
        Some((_, inner)) => inner,
        None => body,
    }
}

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Ident(String),
    /// Raw quoted lexeme, quotes included.
    Str(String),
    Number(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Equals,
    Dot,
    Separator,
}

#[derive(Debug, Clone, PartialEq)]
struct Token {
    kind: TokenKind,
    position: usize,
}

fn lex(src: &str) -> Result<Vec<Token>, Diagnostic> {
    let bytes = src.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let start = i;
        let c = bytes[i] as char;
        match c {
            ' ' | '\t' | '\r' => i += 1,
            '\n' | ';' => {
                tokens.push(Token {
                    kind: TokenKind::Separator,
                    position: start,
                });
                i += 1;
            }
            '(' | ')' | '[' | ']' | ',' | '=' | '.' => {
                let kind = match c {
                    '(' => TokenKind::LParen,
                    ')' => TokenKind::RParen,
                    '[' => TokenKind::LBracket,
                    ']' => TokenKind::RBracket,
                    ',' => TokenKind::Comma,
                    '=' => TokenKind::Equals,
                    _ => TokenKind::Dot,
                };
                tokens.push(Token {
                    kind,
                    position: start,
                });
                i += 1;
            }
            '"' | '\'' => {
                let quote = bytes[i];
                i += 1;
                while i < bytes.len() && bytes[i] != quote {
                    // Skip the escaped character, whatever it is.
                    if bytes[i] == b'\\' && i + 1 < bytes.len() {
                        i += 1;
                    }
                    i += 1;
                }
                if i >= bytes.len() {
                    return Err(Diagnostic {
                        position: start,
                        message: "unterminated string literal".to_string(),
                    });
                }
                i += 1;
                tokens.push(Token {
                    kind: TokenKind::Str(src[start..i].to_string()),
                    position: start,
                });
            }
            '-' | '0'..='9' => {
                i += 1;
                while i < bytes.len()
                    && (bytes[i].is_ascii_digit()
                        || matches!(bytes[i], b'.' | b'e' | b'E' | b'+' | b'-'))
                {
                    // A '-' only continues the number after an exponent.
                    if matches!(bytes[i], b'+' | b'-')
                        && !matches!(bytes[i - 1], b'e' | b'E')
                    {
                        break;
                    }
                    i += 1;
                }
                tokens.push(Token {
                    kind: TokenKind::Number(src[start..i].to_string()),
                    position: start,
                });
            }
            _ if c.is_alphabetic() || c == '_' => {
                i += 1;
                while i < bytes.len()
                    && ((bytes[i] as char).is_alphanumeric() || bytes[i] == b'_')
                {
                    i += 1;
                }
                tokens.push(Token {
                    kind: TokenKind::Ident(src[start..i].to_string()),
                    position: start,
                });
            }
            _ => {
                return Err(Diagnostic {
                    position: start,
                    message: format!("unexpected character '{c}'"),
                });
            }
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    cursor: usize,
    diagnostics: Vec<Diagnostic>,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            cursor: 0,
            diagnostics: Vec::new(),
        }
    }

    fn parse_span(mut self) -> Result<Vec<Call>, ParseFailure> {
        let mut calls = Vec::new();
        self.skip_separators();
        while self.cursor < self.tokens.len() {
            match self.parse_call() {
                Some(call) => calls.push(call),
                None => {
                    return Err(ParseFailure {
                        diagnostics: self.diagnostics,
                    })
                }
            }
            let had_separator = self.skip_separators();
            if self.cursor < self.tokens.len() && !had_separator {
                self.error_here("expected separator between calls");
                return Err(ParseFailure {
                    diagnostics: self.diagnostics,
                });
            }
        }
        if calls.is_empty() {
            self.error_here("expected a call");
            return Err(ParseFailure {
                diagnostics: self.diagnostics,
            });
        }
        Ok(calls)
    }

    fn parse_call(&mut self) -> Option<Call> {
        let name = self.parse_name()?;
        self.expect(&TokenKind::LParen, "expected '(' after call name")?;
        let mut args = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                args.push(self.parse_arg()?);
                if !self.consume(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen, "expected ')' to close argument list")?;
        Some(Call { name, args })
    }

    fn parse_name(&mut self) -> Option<String> {
        let mut name = match self.next() {
            Some(Token {
                kind: TokenKind::Ident(s),
                ..
            }) => s,
            _ => {
                self.error_prev("expected call name");
                return None;
            }
        };
        while self.consume(&TokenKind::Dot) {
            match self.next() {
                Some(Token {
                    kind: TokenKind::Ident(s),
                    ..
                }) => {
                    name.push('.');
                    name.push_str(&s);
                }
                _ => {
                    self.error_prev("expected identifier after '.'");
                    return None;
                }
            }
        }
        Some(name)
    }

    fn parse_arg(&mut self) -> Option<(String, ArgValue)> {
        let name = match self.next() {
            Some(Token {
                kind: TokenKind::Ident(s),
                ..
            }) => s,
            _ => {
                self.error_prev("expected argument name");
                return None;
            }
        };
        self.expect(&TokenKind::Equals, "expected '=' after argument name")?;
        let value = self.parse_value()?;
        Some((name, value))
    }

    fn parse_value(&mut self) -> Option<ArgValue> {
        match self.peek_kind()?.clone() {
            TokenKind::Str(raw) => {
                self.cursor += 1;
                Some(ArgValue::Str(unescape(strip_quotes(&raw))))
            }
            TokenKind::Number(raw) => {
                self.cursor += 1;
                self.parse_number(&raw)
            }
            TokenKind::Ident(word) => match word.as_str() {
                "true" | "True" => {
                    self.cursor += 1;
                    Some(ArgValue::Bool(true))
                }
                "false" | "False" => {
                    self.cursor += 1;
                    Some(ArgValue::Bool(false))
                }
                "null" | "None" => {
                    self.cursor += 1;
                    Some(ArgValue::Null)
                }
                _ => self.parse_call().map(|c| ArgValue::Call(Box::new(c))),
            },
            TokenKind::LBracket => {
                self.cursor += 1;
                let mut items = Vec::new();
                if !self.check(&TokenKind::RBracket) {
                    loop {
                        items.push(self.parse_value()?);
                        if !self.consume(&TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(&TokenKind::RBracket, "expected ']' to close list")?;
                Some(ArgValue::List(items))
            }
            _ => {
                self.error_here("expected a value");
                None
            }
        }
    }

    fn parse_number(&mut self, raw: &str) -> Option<ArgValue> {
        if raw.contains('.') || raw.contains('e') || raw.contains('E') {
            match raw.parse::<f64>() {
                Ok(v) => Some(ArgValue::Float(v)),
                Err(_) => {
                    self.error_prev(&format!("malformed number '{raw}'"));
                    None
                }
            }
        } else {
            match raw.parse::<i64>() {
                Ok(v) => Some(ArgValue::Int(v)),
                Err(_) => {
                    self.error_prev(&format!("malformed number '{raw}'"));
                    None
                }
            }
        }
    }

    fn peek_kind(&mut self) -> Option<&TokenKind> {
        match self.tokens.get(self.cursor) {
            Some(t) => Some(&t.kind),
            None => {
                self.diagnostics.push(Diagnostic {
                    position: self.prev_position(),
                    message: "unexpected end of span".to_string(),
                });
                None
            }
        }
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.cursor).cloned();
        if token.is_some() {
            self.cursor += 1;
        }
        token
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.tokens.get(self.cursor).map(|t| &t.kind) == Some(kind)
    }

    fn consume(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.cursor += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, message: &str) -> Option<()> {
        if self.consume(kind) {
            Some(())
        } else {
            self.error_here(message);
            None
        }
    }

    fn skip_separators(&mut self) -> bool {
        let mut skipped = false;
        while self.consume(&TokenKind::Separator) {
            skipped = true;
        }
        skipped
    }

    fn prev_position(&self) -> usize {
        self.tokens
            .get(self.cursor.saturating_sub(1))
            .map(|t| t.position)
            .unwrap_or(0)
    }

    fn error_here(&mut self, message: &str) {
        let position = self
            .tokens
            .get(self.cursor)
            .map(|t| t.position)
            .unwrap_or_else(|| self.prev_position());
        self.diagnostics.push(Diagnostic {
            position,
            message: message.to_string(),
        });
    }

    fn error_prev(&mut self, message: &str) {
        self.diagnostics.push(Diagnostic {
            position: self.prev_position(),
            message: message.to_string(),
        });
    }
}

/// Resolve the escape sequences the grammar admits inside string literals.
fn unescape(inner: &str) -> String {
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
