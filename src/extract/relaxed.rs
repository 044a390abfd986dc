//! Tolerant parser for script object-literal syntax.
//!
//! Accepts a superset of JSON: single-quoted strings, bare or numeric keys,
//! trailing commas, comments, `undefined`/`NaN`/`Infinity`, hex numbers and
//! loose decimal forms. The two dialects differ only in string escapes.

use serde_json::{Map, Number, Value};
use thiserror::Error;

/// How string escapes are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// Resolve every escape the way a script engine would; malformed
    /// escapes and raw line breaks inside strings are errors.
    Script,
    /// Resolve only quote escapes and `\/`; keep every other backslash
    /// sequence verbatim so a later decoding pass can handle it.
    Lenient,
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message} at line {line}, column {column}")]
pub struct ParseError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

const MAX_DEPTH: usize = 256;

/// Parse `input` as a single object-literal value.
pub fn parse(input: &str, dialect: Dialect) -> Result<Value, ParseError> {
    let mut parser = Parser {
        src: input.chars().collect(),
        pos: 0,
        dialect,
    };
    let value = parser.value(0)?;
    parser.skip_trivia()?;
    if parser.pos < parser.src.len() {
        return Err(parser.error("unexpected trailing characters"));
    }
    Ok(value)
}

struct Parser {
    src: Vec<char>,
    pos: usize,
    dialect: Dialect,
}

impl Parser {
    fn peek(&self) -> Option<char> {
        self.src.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.src.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        let consumed = &self.src[..self.pos.min(self.src.len())];
        let line = consumed.iter().filter(|c| **c == '\n').count() + 1;
        let column = consumed.iter().rev().take_while(|c| **c != '\n').count() + 1;
        ParseError {
            message: message.into(),
            line,
            column,
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), ParseError> {
        match self.bump() {
            Some(c) if c == expected => Ok(()),
            Some(c) => {
                self.pos -= 1;
                Err(self.error(format!("expected '{}', found '{}'", expected, c)))
            }
            None => Err(self.error(format!("expected '{}', found end of input", expected))),
        }
    }

    /// Skip whitespace and comments.
    fn skip_trivia(&mut self) -> Result<(), ParseError> {
        loop {
            match (self.peek(), self.peek_at(1)) {
                (Some(c), _) if c.is_whitespace() || c == '\u{feff}' => self.pos += 1,
                (Some('/'), Some('/')) => {
                    while let Some(c) = self.peek() {
                        if is_line_terminator(c) {
                            break;
                        }
                        self.pos += 1;
                    }
                }
                (Some('/'), Some('*')) => {
                    self.pos += 2;
                    loop {
                        match (self.peek(), self.peek_at(1)) {
                            (Some('*'), Some('/')) => {
                                self.pos += 2;
                                break;
                            }
                            (Some(_), _) => self.pos += 1,
                            (None, _) => return Err(self.error("unterminated comment")),
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn value(&mut self, depth: usize) -> Result<Value, ParseError> {
        if depth > MAX_DEPTH {
            return Err(self.error("nesting too deep"));
        }
        self.skip_trivia()?;
        match self.peek() {
            Some('{') => self.object(depth),
            Some('[') => self.array(depth),
            Some(q @ ('"' | '\'')) => self.string(q).map(Value::String),
            Some(c) if c == '-' || c == '+' || c == '.' || c.is_ascii_digit() => self.number(),
            Some(c) if is_ident_start(c) => self.keyword(),
            Some(c) => Err(self.error(format!("unexpected character '{}'", c))),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn object(&mut self, depth: usize) -> Result<Value, ParseError> {
        self.expect('{')?;
        let mut map = Map::new();
        loop {
            self.skip_trivia()?;
            if self.peek() == Some('}') {
                self.pos += 1;
                return Ok(Value::Object(map));
            }

            let key = self.key()?;
            self.skip_trivia()?;
            self.expect(':')?;
            let value = self.value(depth + 1)?;
            map.insert(key, value);

            self.skip_trivia()?;
            match self.bump() {
                Some(',') => continue,
                Some('}') => return Ok(Value::Object(map)),
                Some(c) => {
                    self.pos -= 1;
                    return Err(self.error(format!("expected ',' or '}}', found '{}'", c)));
                }
                None => return Err(self.error("unterminated object")),
            }
        }
    }

    fn key(&mut self) -> Result<String, ParseError> {
        match self.peek() {
            Some(q @ ('"' | '\'')) => self.string(q),
            Some(c) if is_ident_start(c) => Ok(self.identifier()),
            Some(c) if c.is_ascii_digit() => match self.number()? {
                Value::Number(n) => Ok(n.to_string()),
                _ => Err(self.error("invalid numeric key")),
            },
            Some(c) => Err(self.error(format!("unexpected character '{}' in key", c))),
            None => Err(self.error("unterminated object")),
        }
    }

    fn array(&mut self, depth: usize) -> Result<Value, ParseError> {
        self.expect('[')?;
        let mut items = Vec::new();
        loop {
            self.skip_trivia()?;
            if self.peek() == Some(']') {
                self.pos += 1;
                return Ok(Value::Array(items));
            }

            items.push(self.value(depth + 1)?);

            self.skip_trivia()?;
            match self.bump() {
                Some(',') => continue,
                Some(']') => return Ok(Value::Array(items)),
                Some(c) => {
                    self.pos -= 1;
                    return Err(self.error(format!("expected ',' or ']', found '{}'", c)));
                }
                None => return Err(self.error("unterminated array")),
            }
        }
    }

    fn identifier(&mut self) -> String {
        let start = self.pos;
        while self.peek().is_some_and(is_ident_part) {
            self.pos += 1;
        }
        self.src[start..self.pos].iter().collect()
    }

    fn keyword(&mut self) -> Result<Value, ParseError> {
        let start = self.pos;
        let word = self.identifier();
        match word.as_str() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            "null" | "undefined" | "NaN" | "Infinity" => Ok(Value::Null),
            _ => {
                self.pos = start;
                Err(self.error(format!("unexpected identifier '{}'", word)))
            }
        }
    }

    fn number(&mut self) -> Result<Value, ParseError> {
        let start = self.pos;
        let negative = match self.peek() {
            Some('-') => {
                self.pos += 1;
                true
            }
            Some('+') => {
                self.pos += 1;
                false
            }
            _ => false,
        };

        if self.peek() == Some('I') {
            return match self.identifier().as_str() {
                "Infinity" => Ok(Value::Null),
                _ => {
                    self.pos = start;
                    Err(self.error("invalid number"))
                }
            };
        }

        if self.peek() == Some('0') && matches!(self.peek_at(1), Some('x' | 'X')) {
            self.pos += 2;
            let digits_start = self.pos;
            while self.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
                self.pos += 1;
            }
            let digits: String = self.src[digits_start..self.pos].iter().collect();
            let magnitude = i64::from_str_radix(&digits, 16).map_err(|_| self.error("invalid hex number"))?;
            return Ok(Value::from(if negative { -magnitude } else { magnitude }));
        }

        let mut text = String::new();
        if negative {
            text.push('-');
        }
        let mut digits = 0;
        let mut integral = true;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            text.push(self.src[self.pos]);
            self.pos += 1;
            digits += 1;
        }
        if self.peek() == Some('.') {
            integral = false;
            self.pos += 1;
            text.push('.');
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                text.push(self.src[self.pos]);
                self.pos += 1;
                digits += 1;
            }
        }
        if digits == 0 {
            self.pos = start;
            return Err(self.error("invalid number"));
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            integral = false;
            text.push('e');
            self.pos += 1;
            if let Some(sign @ ('+' | '-')) = self.peek() {
                text.push(sign);
                self.pos += 1;
            }
            let exp_start = self.pos;
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                text.push(self.src[self.pos]);
                self.pos += 1;
            }
            if self.pos == exp_start {
                return Err(self.error("missing exponent digits"));
            }
        }

        if integral {
            if let Ok(n) = text.parse::<i64>() {
                return Ok(Value::from(n));
            }
            if let Ok(n) = text.parse::<u64>() {
                return Ok(Value::from(n));
            }
        }
        let float: f64 = text.parse().map_err(|_| self.error("invalid number"))?;
        Ok(Number::from_f64(float).map(Value::Number).unwrap_or(Value::Null))
    }

    fn string(&mut self, quote: char) -> Result<String, ParseError> {
        self.expect(quote)?;
        let mut out = String::new();
        loop {
            let Some(c) = self.bump() else {
                return Err(self.error("unterminated string"));
            };
            match c {
                _ if c == quote => return Ok(out),
                '\\' => match self.dialect {
                    Dialect::Script => self.script_escape(&mut out)?,
                    Dialect::Lenient => self.lenient_escape(&mut out)?,
                },
                '\n' | '\r' if self.dialect == Dialect::Script => {
                    self.pos -= 1;
                    return Err(self.error("line break in string"));
                }
                _ => out.push(c),
            }
        }
    }

    fn lenient_escape(&mut self, out: &mut String) -> Result<(), ParseError> {
        match self.bump() {
            Some(c @ ('\'' | '"' | '/')) => out.push(c),
            Some(c) => {
                out.push('\\');
                out.push(c);
            }
            None => return Err(self.error("unterminated string")),
        }
        Ok(())
    }

    fn script_escape(&mut self, out: &mut String) -> Result<(), ParseError> {
        let Some(c) = self.bump() else {
            return Err(self.error("unterminated string"));
        };
        match c {
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'v' => out.push('\u{b}'),
            '0' if !self.peek().is_some_and(|c| c.is_ascii_digit()) => out.push('\0'),
            '1'..='9' | '0' => return Err(self.error("octal escape sequence")),
            'x' => {
                let code = self.hex_digits(2)?;
                out.push(char::from_u32(code).ok_or_else(|| self.error("invalid \\x escape"))?);
            }
            'u' => {
                let code = self.unicode_escape()?;
                out.push(self.scalar_from(code)?);
            }
            '\r' => {
                // line continuation
                if self.peek() == Some('\n') {
                    self.pos += 1;
                }
            }
            '\n' | '\u{2028}' | '\u{2029}' => {}
            other => out.push(other),
        }
        Ok(())
    }

    /// Code unit or code point after `\u`.
    fn unicode_escape(&mut self) -> Result<u32, ParseError> {
        if self.peek() == Some('{') {
            self.pos += 1;
            let start = self.pos;
            while self.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
                self.pos += 1;
            }
            let digits: String = self.src[start..self.pos].iter().collect();
            self.expect('}')?;
            return u32::from_str_radix(&digits, 16)
                .ok()
                .filter(|code| *code <= 0x10FFFF)
                .ok_or_else(|| self.error("invalid \\u{...} escape"));
        }
        self.hex_digits(4)
    }

    /// Turn a code unit into a char, pairing a high surrogate with a
    /// following `\uXXXX` low surrogate. Lone surrogates become U+FFFD.
    fn scalar_from(&mut self, code: u32) -> Result<char, ParseError> {
        if (0xD800..=0xDBFF).contains(&code) && self.peek() == Some('\\') && self.peek_at(1) == Some('u') {
            let resume = self.pos;
            self.pos += 2;
            let low = self.unicode_escape()?;
            if (0xDC00..=0xDFFF).contains(&low) {
                let combined = 0x10000 + ((code - 0xD800) << 10) + (low - 0xDC00);
                return Ok(char::from_u32(combined).unwrap_or(char::REPLACEMENT_CHARACTER));
            }
            self.pos = resume;
        }
        Ok(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER))
    }

    fn hex_digits(&mut self, count: usize) -> Result<u32, ParseError> {
        let mut code = 0;
        for _ in 0..count {
            let digit = self
                .peek()
                .and_then(|c| c.to_digit(16))
                .ok_or_else(|| self.error("malformed escape sequence"))?;
            code = code * 16 + digit;
            self.pos += 1;
        }
        Ok(code)
    }
}

fn is_ident_start(c: char) -> bool {
    c == '_' || c == '$' || c.is_alphabetic()
}

fn is_ident_part(c: char) -> bool {
    is_ident_start(c) || c.is_alphanumeric()
}

fn is_line_terminator(c: char) -> bool {
    matches!(c, '\n' | '\r' | '\u{2028}' | '\u{2029}')
}
