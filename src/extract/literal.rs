//! Scoped literal parsing
//!
//! A single recursive-descent pass that turns an object/array literal into a
//! tagged tree. Field lookup then happens against an object's own entries, so
//! a key belonging to a nested child can never be read as the parent's.
//!
//! Anything that is not a plain literal (identifiers, calls, arrow functions,
//! interpolated template strings, arithmetic) is kept verbatim as
//! [`Literal::Expr`] and never coerced.

use serde_json::Value;

use super::comments::{closing_quote, skip_quoted, QUOTES};
use super::scanner::find_closing;
use crate::error::{Result, SchemaError};

/// A parsed literal value
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Str(String),
    Num(f64),
    Bool(bool),
    Null,
    Array(Vec<Literal>),
    Object(ObjectLiteral),
    /// Source text of a non-literal expression
    Expr(String),
}

impl Literal {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Literal::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Literal::Num(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Literal::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Literal]> {
        match self {
            Literal::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectLiteral> {
        match self {
            Literal::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_expr(&self) -> Option<&str> {
        match self {
            Literal::Expr(e) => Some(e),
            _ => None,
        }
    }

    /// Quoted strings of an array, in order. Non-string items are skipped.
    pub fn string_items(&self) -> Vec<String> {
        self.as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Convert to JSON. Expressions have no JSON form and yield `None`;
    /// inside containers they are dropped.
    pub fn to_json(&self) -> Option<Value> {
        match self {
            Literal::Str(s) => Some(Value::String(s.clone())),
            Literal::Num(n) => Some(number_to_json(*n)),
            Literal::Bool(b) => Some(Value::Bool(*b)),
            Literal::Null => Some(Value::Null),
            Literal::Array(items) => Some(Value::Array(
                items.iter().filter_map(Literal::to_json).collect(),
            )),
            Literal::Object(obj) => {
                let map = obj
                    .entries
                    .iter()
                    .filter_map(|(k, v)| v.to_json().map(|v| (k.clone(), v)))
                    .collect();
                Some(Value::Object(map))
            }
            Literal::Expr(_) => None,
        }
    }
}

fn number_to_json(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

/// An object literal's direct entries, in source order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectLiteral {
    pub entries: Vec<(String, Literal)>,
}

impl ObjectLiteral {
    /// First entry with this key. Only this object's own keys are searched.
    pub fn get(&self, key: &str) -> Option<&Literal> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Literal::as_str)
    }

    pub fn num(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Literal::as_f64)
    }

    pub fn bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Literal::as_bool)
    }

    pub fn array(&self, key: &str) -> Option<&[Literal]> {
        self.get(key).and_then(Literal::as_array)
    }

    pub fn object(&self, key: &str) -> Option<&ObjectLiteral> {
        self.get(key).and_then(Literal::as_object)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

/// Parse a single literal value. Trailing whitespace and `;` are allowed.
pub fn parse_literal(text: &str) -> Result<Literal> {
    let mut parser = Parser::new(text);
    let value = parser.value()?;
    parser.skip_ws();
    while parser.peek() == Some(b';') {
        parser.pos += 1;
        parser.skip_ws();
    }
    if parser.pos < parser.bytes.len() {
        return Err(SchemaError::literal(parser.pos, "trailing input after literal"));
    }
    Ok(value)
}

/// Parse text that must be an object literal.
pub fn parse_object(text: &str) -> Result<ObjectLiteral> {
    match parse_literal(text)? {
        Literal::Object(obj) => Ok(obj),
        _ => Err(SchemaError::literal(0, "expected an object literal")),
    }
}

struct Parser<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$' || b >= 0x80
}

fn is_delimiter(b: Option<u8>) -> bool {
    matches!(b, None | Some(b',') | Some(b'}') | Some(b']') | Some(b')') | Some(b';'))
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while let Some(b) = self.peek() {
            if b.is_ascii_whitespace() {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn next_is_delimiter(&mut self) -> bool {
        self.skip_ws();
        is_delimiter(self.peek())
    }

    fn value(&mut self) -> Result<Literal> {
        self.skip_ws();
        let start = self.pos;
        let Some(b) = self.peek() else {
            return Err(SchemaError::literal(start, "unexpected end of input"));
        };

        let literal = match b {
            b'{' => Literal::Object(self.object()?),
            b'[' => Literal::Array(self.array()?),
            b if QUOTES.contains(&b) => self.string()?,
            b'-' | b'+' | b'.' | b'0'..=b'9' => match self.number() {
                Some(n) => Literal::Num(n),
                None => return Ok(self.expression(start)),
            },
            b if is_ident_byte(b) => {
                let word = self.ident();
                match word {
                    "true" => Literal::Bool(true),
                    "false" => Literal::Bool(false),
                    "null" | "undefined" => Literal::Null,
                    _ => return Ok(self.expression(start)),
                }
            }
            _ => return Ok(self.expression(start)),
        };

        // `'a' + b`, `1 * 2`, `'x'.trim()` and friends are expressions.
        if self.next_is_delimiter() {
            Ok(literal)
        } else {
            Ok(self.expression(start))
        }
    }

    fn object(&mut self) -> Result<ObjectLiteral> {
        let open = self.pos;
        self.pos += 1;
        let mut obj = ObjectLiteral::default();

        loop {
            self.skip_ws();
            match self.peek() {
                None => return Err(SchemaError::literal(open, "unterminated object literal")),
                Some(b'}') => {
                    self.pos += 1;
                    return Ok(obj);
                }
                Some(b',') => {
                    self.pos += 1;
                    continue;
                }
                Some(b'.') if self.src[self.pos..].starts_with("...") => {
                    // Spread entries contribute no key of their own.
                    let start = self.pos;
                    self.expression(start);
                }
                Some(_) => {
                    let key = self.key()?;
                    self.skip_ws();
                    match self.peek() {
                        Some(b':') => {
                            self.pos += 1;
                            let value = self.value()?;
                            obj.entries.push((key, value));
                        }
                        Some(b'(') => {
                            // Method shorthand: `name(args) { body }`
                            let start = self.pos;
                            self.expression(start);
                            let body = self.src[start..self.pos].trim().to_string();
                            obj.entries.push((key.clone(), Literal::Expr(format!("{key}{body}"))));
                        }
                        b if is_delimiter(b) => {
                            obj.entries.push((key.clone(), Literal::Expr(key)));
                        }
                        _ => {
                            // `async name() {}`, getters and the like
                            let start = self.pos;
                            self.expression(start);
                        }
                    }
                }
            }

            self.skip_ws();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b'}') => {}
                None => return Err(SchemaError::literal(open, "unterminated object literal")),
                Some(_) => return Err(SchemaError::literal(self.pos, "expected ',' or '}'")),
            }
        }
    }

    fn key(&mut self) -> Result<String> {
        let start = self.pos;
        match self.peek() {
            Some(b) if QUOTES.contains(&b) => match self.string()? {
                Literal::Str(s) => Ok(s),
                _ => Err(SchemaError::literal(start, "interpolated object key")),
            },
            Some(b'[') => {
                let end = find_closing(self.src, self.pos + 1)
                    .ok_or_else(|| SchemaError::literal(start, "unterminated computed key"))?;
                self.pos = end + 1;
                Ok(self.src[start..self.pos].to_string())
            }
            Some(b) if is_ident_byte(b) => Ok(self.ident().to_string()),
            _ => Err(SchemaError::literal(start, "expected object key")),
        }
    }

    fn array(&mut self) -> Result<Vec<Literal>> {
        let open = self.pos;
        self.pos += 1;
        let mut items = Vec::new();

        loop {
            self.skip_ws();
            match self.peek() {
                None => return Err(SchemaError::literal(open, "unterminated array literal")),
                Some(b']') => {
                    self.pos += 1;
                    return Ok(items);
                }
                Some(b',') => {
                    self.pos += 1;
                    continue;
                }
                Some(_) => items.push(self.value()?),
            }

            self.skip_ws();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b']') => {}
                None => return Err(SchemaError::literal(open, "unterminated array literal")),
                Some(_) => return Err(SchemaError::literal(self.pos, "expected ',' or ']'")),
            }
        }
    }

    fn string(&mut self) -> Result<Literal> {
        let start = self.pos;
        let quote = self.bytes[start];
        let end = closing_quote(self.bytes, start)
            .ok_or_else(|| SchemaError::literal(start, "unterminated string literal"))?;
        self.pos = end;
        let raw = &self.src[start + 1..end - 1];

        if quote == b'`' && raw.contains("${") {
            return Ok(Literal::Expr(self.src[start..end].to_string()));
        }
        Ok(Literal::Str(unescape(raw)))
    }

    fn number(&mut self) -> Option<f64> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-' | b'+') {
                self.pos += 1;
            } else {
                break;
            }
        }
        let token: String = self.src[start..self.pos].chars().filter(|c| *c != '_').collect();
        match token.parse::<f64>() {
            Ok(n) if n.is_finite() => Some(n),
            _ => {
                self.pos = start;
                None
            }
        }
    }

    fn ident(&mut self) -> &'a str {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if is_ident_byte(b) {
                self.pos += 1;
            } else {
                break;
            }
        }
        &self.src[start..self.pos]
    }

    /// Consume an opaque expression from `start` up to the next top-level
    /// `,` or closing bracket.
    fn expression(&mut self, start: usize) -> Literal {
        self.pos = start;
        while let Some(b) = self.peek() {
            if QUOTES.contains(&b) {
                self.pos = skip_quoted(self.bytes, self.pos);
                continue;
            }
            match b {
                b'{' | b'[' | b'(' => match find_closing(self.src, self.pos + 1) {
                    Some(end) => self.pos = end + 1,
                    None => {
                        self.pos = self.bytes.len();
                        break;
                    }
                },
                b',' | b'}' | b']' | b')' | b';' => break,
                _ => self.pos += 1,
            }
        }
        Literal::Expr(self.src[start..self.pos].trim().to_string())
    }
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(ch) => out.push(ch),
                    None => {
                        out.push_str("\\u");
                        out.push_str(&hex);
                    }
                }
            }
            // Line continuation
            Some('\n') => {}
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
