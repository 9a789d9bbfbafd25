use super::{OrderedJson, OrderedMap};
use crate::{CoreError, CoreResult};

/// Parse a JSON document, keeping map key order and raw string contents.
///
/// Only maps, lists, strings and the `true`/`false` literals are accepted;
/// numbers and `null` are rejected since scenario values are always quoted.
pub fn parse(input: &[u8]) -> CoreResult<OrderedJson> {
    let mut parser = Parser { input, pos: 0 };
    parser.skip_whitespace();
    let value = parser.parse_value()?;
    parser.skip_whitespace();
    if parser.pos < input.len() {
        return Err(CoreError::json(
            parser.pos,
            "unexpected characters at the end",
        ));
    }
    Ok(value)
}

struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while let Some(b' ' | b'\t' | b'\n' | b'\r') = self.peek() {
            self.pos += 1;
        }
    }

    fn parse_value(&mut self) -> CoreResult<OrderedJson> {
        match self.peek() {
            Some(b'{') => self.parse_map(),
            Some(b'[') => self.parse_list(),
            Some(b'"') => Ok(OrderedJson::String(self.parse_string()?)),
            Some(b't') | Some(b'f') => self.parse_bool(),
            Some(_) => Err(CoreError::json(self.pos, "invalid value")),
            None => Err(CoreError::json(self.pos, "unexpected end of input")),
        }
    }

    fn parse_bool(&mut self) -> CoreResult<OrderedJson> {
        let rest = &self.input[self.pos..];
        let (literal, value): (&[u8], bool) = if rest.starts_with(b"true") {
            (b"true", true)
        } else if rest.starts_with(b"false") {
            (b"false", false)
        } else {
            return Err(CoreError::json(self.pos, "invalid value"));
        };
        let end = self.pos + literal.len();
        if let Some(next) = self.input.get(end) {
            if next.is_ascii_alphanumeric() || *next == b'_' {
                return Err(CoreError::json(self.pos, "invalid value"));
            }
        }
        self.pos = end;
        Ok(OrderedJson::Bool(value))
    }

    /// Reads a quoted string without unescaping it. A backslash only
    /// protects the following character from ending the string.
    fn parse_string(&mut self) -> CoreResult<String> {
        let start = self.pos;
        self.pos += 1;
        let content_start = self.pos;
        loop {
            match self.peek() {
                Some(b'"') => break,
                Some(b'\\') => self.pos += 2,
                Some(_) => self.pos += 1,
                None => return Err(CoreError::json(start, "unterminated string")),
            }
        }
        let raw = &self.input[content_start..self.pos];
        self.pos += 1;
        String::from_utf8(raw.to_vec())
            .map_err(|_| CoreError::json(content_start, "string is not valid UTF-8"))
    }

    fn parse_map(&mut self) -> CoreResult<OrderedJson> {
        self.pos += 1;
        let mut map = OrderedMap::new();
        self.skip_whitespace();
        if self.peek() == Some(b'}') {
            self.pos += 1;
            return Ok(OrderedJson::Map(map));
        }
        loop {
            self.skip_whitespace();
            match self.peek() {
                Some(b'"') => {}
                None => return Err(CoreError::json(self.pos, "unexpected end of input")),
                Some(_) => {
                    return Err(CoreError::json(self.pos, "map key must start with a quote"))
                }
            }
            let key = self.parse_string()?;
            self.skip_whitespace();
            if self.peek() != Some(b':') {
                return Err(CoreError::json(self.pos, "colon expected"));
            }
            self.pos += 1;
            self.skip_whitespace();
            let value = self.parse_value()?;
            map.put(key, value);
            self.skip_whitespace();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b'}') => {
                    self.pos += 1;
                    return Ok(OrderedJson::Map(map));
                }
                None => return Err(CoreError::json(self.pos, "unexpected end of input")),
                Some(_) => return Err(CoreError::json(self.pos, "misplaced character")),
            }
        }
    }

    fn parse_list(&mut self) -> CoreResult<OrderedJson> {
        self.pos += 1;
        let mut items = Vec::new();
        self.skip_whitespace();
        if self.peek() == Some(b']') {
            self.pos += 1;
            return Ok(OrderedJson::List(items));
        }
        loop {
            self.skip_whitespace();
            items.push(self.parse_value()?);
            self.skip_whitespace();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b']') => {
                    self.pos += 1;
                    return Ok(OrderedJson::List(items));
                }
                None => return Err(CoreError::json(self.pos, "unexpected end of input")),
                Some(_) => return Err(CoreError::json(self.pos, "misplaced character")),
            }
        }
    }
}
