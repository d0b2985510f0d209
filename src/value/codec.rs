use super::{Map, Value};
use std::fmt;

/// Decoding failure. Carries a diagnostic message and the byte offset
/// at which decoding stopped; no partial value survives.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    pub offset: usize,
}

impl ParseError {
    fn new(message: impl Into<String>, offset: usize) -> Self {
        Self {
            message: message.into(),
            offset,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at offset {}", self.message, self.offset)
    }
}

impl std::error::Error for ParseError {}

/// Encode a value as UTF-8 JSON text.
///
/// Never fails: non-finite numbers are written as `0`.
pub fn encode(value: &Value) -> String {
    // Value's Serialize impl only produces string keys and finite numbers,
    // so serde_json has nothing to reject.
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}

/// Decode JSON text into a value.
pub fn decode(input: &[u8]) -> Result<Value, ParseError> {
    let text = std::str::from_utf8(input)
        .map_err(|e| ParseError::new("input is not valid UTF-8", e.valid_up_to()))?;
    Parser::new(text).run()
}

/// Deepest container nesting `decode` accepts.
pub const MAX_DEPTH: usize = 128;

/// In-progress container on the builder stack.
enum Frame {
    List(Vec<Value>),
    Map { map: Map, key: Option<String> },
}

/// What the grammar allows at the current position.
#[derive(Clone, Copy, PartialEq, Debug)]
enum Expect {
    Value,
    ValueOrListEnd,
    KeyOrMapEnd,
    Key,
    Colon,
    CommaOrEnd,
    Done,
}

struct Parser<'a> {
    text: &'a str,
    bytes: &'a [u8],
    pos: usize,
    stack: Vec<Frame>,
    root: Option<Value>,
    expect: Expect,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            bytes: text.as_bytes(),
            pos: 0,
            stack: Vec::new(),
            root: None,
            expect: Expect::Value,
        }
    }

    fn run(mut self) -> Result<Value, ParseError> {
        loop {
            self.skip_whitespace();
            let Some(&c) = self.bytes.get(self.pos) else {
                break;
            };

            match self.expect {
                Expect::Done => {
                    return Err(ParseError::new("trailing data after value", self.pos));
                }
                Expect::Colon => {
                    if c != b':' {
                        return Err(ParseError::new("expected ':' after map key", self.pos));
                    }
                    self.pos += 1;
                    self.expect = Expect::Value;
                }
                Expect::CommaOrEnd => self.comma_or_end(c)?,
                Expect::Key | Expect::KeyOrMapEnd => {
                    if c == b'}' && self.expect == Expect::KeyOrMapEnd {
                        self.pos += 1;
                        self.close()?;
                    } else if c == b'"' {
                        let key = self.string()?;
                        self.add(Value::String(key))?;
                        self.expect = Expect::Colon;
                    } else {
                        return Err(ParseError::new("expected string map key", self.pos));
                    }
                }
                Expect::Value | Expect::ValueOrListEnd => {
                    if c == b']' && self.expect == Expect::ValueOrListEnd {
                        self.pos += 1;
                        self.close()?;
                    } else {
                        self.value(c)?;
                    }
                }
            }
        }

        if self.expect != Expect::Done {
            return Err(ParseError::new("unexpected end of input", self.pos));
        }

        self.root
            .take()
            .ok_or_else(|| ParseError::new("empty input", self.pos))
    }

    fn value(&mut self, c: u8) -> Result<(), ParseError> {
        if matches!(c, b'{' | b'[') && self.stack.len() >= MAX_DEPTH {
            return Err(ParseError::new("nesting too deep", self.pos));
        }
        match c {
            b'{' => {
                self.pos += 1;
                self.stack.push(Frame::Map {
                    map: Map::new(),
                    key: None,
                });
                self.expect = Expect::KeyOrMapEnd;
                Ok(())
            }
            b'[' => {
                self.pos += 1;
                self.stack.push(Frame::List(Vec::new()));
                self.expect = Expect::ValueOrListEnd;
                Ok(())
            }
            b'"' => {
                let s = self.string()?;
                self.add(Value::String(s))?;
                self.after_value();
                Ok(())
            }
            b't' => self.literal("true", Value::Boolean(true)),
            b'f' => self.literal("false", Value::Boolean(false)),
            b'n' => self.literal("null", Value::Null),
            b'-' | b'0'..=b'9' => {
                let n = self.number()?;
                self.add(Value::Number(n))?;
                self.after_value();
                Ok(())
            }
            _ => Err(ParseError::new(
                format!("unexpected character '{}'", c as char),
                self.pos,
            )),
        }
    }

    fn comma_or_end(&mut self, c: u8) -> Result<(), ParseError> {
        let in_map = matches!(self.stack.last(), Some(Frame::Map { .. }));
        match (c, in_map) {
            (b',', true) => {
                self.pos += 1;
                self.expect = Expect::Key;
            }
            (b',', false) => {
                self.pos += 1;
                self.expect = Expect::Value;
            }
            (b'}', true) | (b']', false) => {
                self.pos += 1;
                self.close()?;
            }
            (b'}', false) | (b']', true) => {
                return Err(ParseError::new("mismatched closing bracket", self.pos));
            }
            _ => return Err(ParseError::new("expected ',' or closing bracket", self.pos)),
        }
        Ok(())
    }

    /// Pop the top container and fold it into its parent.
    fn close(&mut self) -> Result<(), ParseError> {
        let value = match self.stack.pop() {
            Some(Frame::List(items)) => Value::List(items),
            Some(Frame::Map { key: Some(_), .. }) => {
                return Err(ParseError::new("map key without value", self.pos));
            }
            Some(Frame::Map { map, key: None }) => Value::Map(map),
            None => return Err(ParseError::new("unbalanced closing bracket", self.pos)),
        };
        self.add(value)?;
        self.after_value();
        Ok(())
    }

    /// Fold a finished value into the top-of-stack container.
    ///
    /// Inside a map, strings alternate between pending key and value.
    fn add(&mut self, value: Value) -> Result<(), ParseError> {
        match self.stack.last_mut() {
            None => {
                if self.root.is_some() {
                    return Err(ParseError::new("trailing data after value", self.pos));
                }
                self.root = Some(value);
            }
            Some(Frame::List(items)) => items.push(value),
            Some(Frame::Map { map, key }) => match key.take() {
                Some(k) => {
                    map.insert(k, value);
                }
                None => match value {
                    Value::String(k) => *key = Some(k),
                    _ => return Err(ParseError::new("map key must be a string", self.pos)),
                },
            },
        }
        Ok(())
    }

    fn after_value(&mut self) {
        self.expect = if self.stack.is_empty() {
            Expect::Done
        } else {
            Expect::CommaOrEnd
        };
    }

    fn literal(&mut self, word: &str, value: Value) -> Result<(), ParseError> {
        if !self.text[self.pos..].starts_with(word) {
            return Err(ParseError::new("invalid literal", self.pos));
        }
        self.pos += word.len();
        self.add(value)?;
        self.after_value();
        Ok(())
    }

    fn number(&mut self) -> Result<f64, ParseError> {
        let start = self.pos;
        if self.peek() == Some(b'-') {
            self.pos += 1;
        }
        match self.peek() {
            Some(b'0') => self.pos += 1,
            Some(b'1'..=b'9') => self.digits(),
            _ => return Err(ParseError::new("invalid number", start)),
        }
        if self.peek() == Some(b'.') {
            self.pos += 1;
            if !matches!(self.peek(), Some(b'0'..=b'9')) {
                return Err(ParseError::new("invalid number: missing fraction digits", start));
            }
            self.digits();
        }
        if matches!(self.peek(), Some(b'e' | b'E')) {
            self.pos += 1;
            if matches!(self.peek(), Some(b'+' | b'-')) {
                self.pos += 1;
            }
            if !matches!(self.peek(), Some(b'0'..=b'9')) {
                return Err(ParseError::new("invalid number: missing exponent digits", start));
            }
            self.digits();
        }

        let n: f64 = self.text[start..self.pos]
            .parse()
            .map_err(|_| ParseError::new("invalid number", start))?;
        if !n.is_finite() {
            return Err(ParseError::new("number out of range", start));
        }
        Ok(n)
    }

    fn digits(&mut self) {
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.pos += 1;
        }
    }

    /// Parse a string literal; `pos` points at the opening quote.
    fn string(&mut self) -> Result<String, ParseError> {
        let start = self.pos;
        self.pos += 1;
        let mut out = String::new();
        let mut run_start = self.pos;

        loop {
            let Some(c) = self.peek() else {
                return Err(ParseError::new("unterminated string", start));
            };
            match c {
                b'"' => {
                    out.push_str(&self.text[run_start..self.pos]);
                    self.pos += 1;
                    return Ok(out);
                }
                b'\\' => {
                    out.push_str(&self.text[run_start..self.pos]);
                    self.pos += 1;
                    self.escape(&mut out)?;
                    run_start = self.pos;
                }
                0x00..=0x1f => {
                    return Err(ParseError::new("control character in string", self.pos));
                }
                _ => self.pos += 1,
            }
        }
    }

    fn escape(&mut self, out: &mut String) -> Result<(), ParseError> {
        let Some(c) = self.peek() else {
            return Err(ParseError::new("unterminated escape", self.pos));
        };
        self.pos += 1;
        match c {
            b'"' => out.push('"'),
            b'\\' => out.push('\\'),
            b'/' => out.push('/'),
            b'b' => out.push('\u{08}'),
            b'f' => out.push('\u{0c}'),
            b'n' => out.push('\n'),
            b'r' => out.push('\r'),
            b't' => out.push('\t'),
            b'u' => {
                let high = self.hex4()?;
                let code = if (0xD800..0xDC00).contains(&high) {
                    if !self.text[self.pos..].starts_with("\\u") {
                        return Err(ParseError::new("unpaired surrogate", self.pos));
                    }
                    self.pos += 2;
                    let low = self.hex4()?;
                    if !(0xDC00..0xE000).contains(&low) {
                        return Err(ParseError::new("invalid low surrogate", self.pos));
                    }
                    0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00)
                } else {
                    high
                };
                let ch = char::from_u32(code)
                    .ok_or_else(|| ParseError::new("invalid unicode escape", self.pos))?;
                out.push(ch);
            }
            _ => return Err(ParseError::new("invalid escape sequence", self.pos - 1)),
        }
        Ok(())
    }

    fn hex4(&mut self) -> Result<u32, ParseError> {
        let digits = self
            .text
            .get(self.pos..self.pos + 4)
            .ok_or_else(|| ParseError::new("truncated unicode escape", self.pos))?;
        if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ParseError::new("invalid unicode escape", self.pos));
        }
        let code = u32::from_str_radix(digits, 16)
            .map_err(|_| ParseError::new("invalid unicode escape", self.pos))?;
        self.pos += 4;
        Ok(code)
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\n' | b'\r')) {
            self.pos += 1;
        }
    }
}
