//! Safe parser and renderer for the literal notation used on the sandbox boundary.
//!
//! The invocation payload and the legacy result form are written as plain
//! literals: `None`, `True`/`False`, integers, floats, quoted strings, tuples,
//! lists, sets and dicts. Nothing is ever evaluated; any identifier other than
//! the three keywords is rejected, so `__import__('os')` is a parse error,
//! not a call.
//!
//! Values map onto [`serde_json::Value`]: tuples, lists and sets become
//! arrays, dicts become objects (non-string keys are stored in their
//! rendered literal form).

use serde_json::{Map, Number, Value};

use crate::error::{Error, Result};

/// Nesting limit for containers.
const MAX_DEPTH: usize = 128;

/// Parse a complete literal. Surrounding whitespace is allowed, anything
/// else after the literal is an error.
pub fn parse(input: &str) -> Result<Value> {
    let mut parser = Parser { input, pos: 0 };
    let value = parser.value(0)?;
    parser.skip_ws();
    if parser.pos < input.len() {
        return Err(parser.error("unexpected trailing input"));
    }
    Ok(value)
}

/// Render a value in literal notation.
pub fn render(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("None"),
        Value::Bool(true) => out.push_str("True"),
        Value::Bool(false) => out.push_str("False"),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => write_string(out, s),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_value(out, item);
            }
            out.push(']');
        }
        Value::Object(map) => {
            out.push('{');
            for (i, (key, item)) in map.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_string(out, key);
                out.push_str(": ");
                write_value(out, item);
            }
            out.push('}');
        }
    }
}

fn write_string(out: &mut String, s: &str) {
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 || c == '\u{7f}' => {
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('\'');
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.bump();
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn error(&self, msg: &str) -> Error {
        Error::Literal(format!("{} at offset {}", msg, self.pos))
    }

    fn value(&mut self, depth: usize) -> Result<Value> {
        if depth > MAX_DEPTH {
            return Err(self.error("literal nested too deeply"));
        }
        self.skip_ws();
        match self.peek() {
            None => Err(self.error("unexpected end of input")),
            Some('(') => self.sequence(')', depth),
            Some('[') => self.sequence(']', depth),
            Some('{') => self.braced(depth),
            Some('\'') | Some('"') => self.string().map(Value::String),
            Some(c) if c == '-' || c == '+' || c == '.' || c.is_ascii_digit() => self.number(),
            Some(c) if c.is_alphabetic() || c == '_' => self.keyword(),
            Some(c) => Err(self.error(&format!("unexpected character {:?}", c))),
        }
    }

    /// Tuples and lists. `(x)` without a comma is just `x`.
    fn sequence(&mut self, close: char, depth: usize) -> Result<Value> {
        self.bump();
        let mut items = Vec::new();
        let mut saw_comma = false;
        loop {
            self.skip_ws();
            if self.eat(close) {
                break;
            }
            items.push(self.value(depth + 1)?);
            self.skip_ws();
            if self.eat(',') {
                saw_comma = true;
                continue;
            }
            if self.eat(close) {
                break;
            }
            return Err(self.error(&format!("expected ',' or '{}'", close)));
        }
        if close == ')' && items.len() == 1 && !saw_comma {
            return Ok(items.remove(0));
        }
        Ok(Value::Array(items))
    }

    /// Dicts and sets.
    fn braced(&mut self, depth: usize) -> Result<Value> {
        self.bump();
        self.skip_ws();
        if self.eat('}') {
            return Ok(Value::Object(Map::new()));
        }

        let first = self.value(depth + 1)?;
        self.skip_ws();
        if !self.eat(':') {
            return self.set_rest(first, depth);
        }

        let mut map = Map::new();
        let mut key = first;
        loop {
            let item = self.value(depth + 1)?;
            map.insert(key_string(key), item);
            self.skip_ws();
            if self.eat('}') {
                break;
            }
            if !self.eat(',') {
                return Err(self.error("expected ',' or '}'"));
            }
            self.skip_ws();
            if self.eat('}') {
                break;
            }
            key = self.value(depth + 1)?;
            self.skip_ws();
            if !self.eat(':') {
                return Err(self.error("expected ':'"));
            }
        }
        Ok(Value::Object(map))
    }

    fn set_rest(&mut self, first: Value, depth: usize) -> Result<Value> {
        let mut items = vec![first];
        loop {
            self.skip_ws();
            if self.eat('}') {
                break;
            }
            if !self.eat(',') {
                return Err(self.error("expected ',' or '}'"));
            }
            self.skip_ws();
            if self.eat('}') {
                break;
            }
            items.push(self.value(depth + 1)?);
        }
        Ok(Value::Array(items))
    }

    fn string(&mut self) -> Result<String> {
        let quote = self.bump().ok_or_else(|| self.error("expected string"))?;
        let mut out = String::new();
        loop {
            let c = self
                .bump()
                .ok_or_else(|| self.error("unterminated string"))?;
            match c {
                c if c == quote => return Ok(out),
                '\n' => return Err(self.error("newline in string")),
                '\\' => self.escape(&mut out)?,
                c => out.push(c),
            }
        }
    }

    fn escape(&mut self, out: &mut String) -> Result<()> {
        let c = self
            .bump()
            .ok_or_else(|| self.error("unterminated escape"))?;
        match c {
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            '0' => out.push('\0'),
            'a' => out.push('\u{07}'),
            'b' => out.push('\u{08}'),
            'f' => out.push('\u{0c}'),
            'v' => out.push('\u{0b}'),
            '\n' => {}
            'x' => out.push(self.hex_escape(2)?),
            'u' => out.push(self.hex_escape(4)?),
            'U' => out.push(self.hex_escape(8)?),
            other => {
                // Unknown escapes are kept literally.
                out.push('\\');
                out.push(other);
            }
        }
        Ok(())
    }

    fn hex_escape(&mut self, len: usize) -> Result<char> {
        let start = self.pos;
        for _ in 0..len {
            match self.bump() {
                Some(c) if c.is_ascii_hexdigit() => {}
                _ => return Err(self.error("invalid hex escape")),
            }
        }
        let code = u32::from_str_radix(&self.input[start..self.pos], 16)
            .map_err(|_| self.error("invalid hex escape"))?;
        char::from_u32(code).ok_or_else(|| self.error("escape is not a valid character"))
    }

    fn number(&mut self) -> Result<Value> {
        let start = self.pos;
        if matches!(self.peek(), Some('-') | Some('+')) {
            self.bump();
        }
        while let Some(c) = self.peek() {
            let exponent_sign = (c == '-' || c == '+')
                && matches!(self.input[..self.pos].chars().last(), Some('e') | Some('E'));
            if c.is_ascii_digit() || c == '.' || c == '_' || c == 'e' || c == 'E' || exponent_sign
            {
                self.bump();
            } else {
                break;
            }
        }
        let text: String = self.input[start..self.pos]
            .chars()
            .filter(|c| *c != '_')
            .collect();

        let is_float = text.contains(['.', 'e', 'E']);
        if !is_float {
            if let Ok(n) = text.parse::<i64>() {
                return Ok(Value::Number(n.into()));
            }
            if let Ok(n) = text.trim_start_matches('+').parse::<u64>() {
                return Ok(Value::Number(n.into()));
            }
        }
        text.parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| Error::Literal(format!("invalid number '{}' at offset {}", text, start)))
    }

    fn keyword(&mut self) -> Result<Value> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            self.bump();
        }
        match &self.input[start..self.pos] {
            "None" => Ok(Value::Null),
            "True" => Ok(Value::Bool(true)),
            "False" => Ok(Value::Bool(false)),
            other => Err(Error::Literal(format!(
                "'{}' at offset {} is not a literal",
                other, start
            ))),
        }
    }
}

fn key_string(key: Value) -> String {
    match key {
        Value::String(s) => s,
        other => render(&other),
    }
}
