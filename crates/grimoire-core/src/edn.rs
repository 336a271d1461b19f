//! Reader for the EDN subset found in OrcBrew homebrew files.
//!
//! Produces [`RawValue`] trees; turning those into the universal shapes is
//! the job of [`coerce`](crate::coerce::coerce).
//!
//! Supported: `nil`, booleans, integers (with optional `N`), floats (with
//! optional `M`), ratios (`1/4`, read as floats), strings, characters,
//! keywords, symbols, lists, vectors, maps, sets, tagged literals, `#_`
//! discard, `;` comments, and commas as whitespace.

use thiserror::Error;

use crate::coerce::RawValue;

/// Deepest nesting of collections and tagged literals accepted.
pub const MAX_DEPTH: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("EDN parse error at byte {offset}: {message}")]
pub struct EdnError {
    pub offset: usize,
    pub message: String,
}

/// Parse exactly one top-level form.
pub fn parse(input: &str) -> Result<RawValue, EdnError> {
    let mut reader = Reader::new(input);
    let value = match reader.read_form()? {
        Some(v) => v,
        None => return Err(reader.stray_or("empty input")),
    };
    reader.skip_ws();
    if reader.peek().is_some() {
        return Err(reader.error("trailing content after top-level form"));
    }
    Ok(value)
}

/// Parse every top-level form in `input`.
pub fn parse_all(input: &str) -> Result<Vec<RawValue>, EdnError> {
    let mut reader = Reader::new(input);
    let mut forms = Vec::new();
    while let Some(form) = reader.read_form()? {
        forms.push(form);
    }
    if reader.peek().is_some() {
        return Err(reader.stray_or("unexpected input"));
    }
    Ok(forms)
}

struct Reader<'a> {
    src: &'a str,
    pos: usize,
    depth: usize,
}

impl<'a> Reader<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            depth: 0,
        }
    }

    fn error(&self, message: impl Into<String>) -> EdnError {
        EdnError {
            offset: self.pos,
            message: message.into(),
        }
    }

    /// Error for a closing delimiter with nothing open, else `fallback`.
    fn stray_or(&self, fallback: &str) -> EdnError {
        match self.peek() {
            Some(c) => self.error(format!("unexpected '{}'", c)),
            None => self.error(fallback),
        }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        let mut chars = self.src[self.pos..].chars();
        chars.next();
        chars.next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() || c == ',' {
                self.bump();
            } else if c == ';' {
                while let Some(c) = self.bump() {
                    if c == '\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    /// `Ok(None)` at end of input or in front of a closing delimiter.
    fn read_form(&mut self) -> Result<Option<RawValue>, EdnError> {
        if self.depth >= MAX_DEPTH {
            return Err(self.error(format!("nesting deeper than {} levels", MAX_DEPTH)));
        }
        self.depth += 1;
        let form = self.read_form_at_depth();
        self.depth -= 1;
        form
    }

    fn read_form_at_depth(&mut self) -> Result<Option<RawValue>, EdnError> {
        loop {
            self.skip_ws();
            let Some(c) = self.peek() else {
                return Ok(None);
            };
            let value = match c {
                '(' => {
                    self.bump();
                    RawValue::List(self.read_seq(')')?)
                }
                '[' => {
                    self.bump();
                    RawValue::Vector(self.read_seq(']')?)
                }
                '{' => {
                    self.bump();
                    self.read_map()?
                }
                ')' | ']' | '}' => return Ok(None),
                '"' => {
                    self.bump();
                    RawValue::Text(self.read_string()?)
                }
                '\\' => {
                    self.bump();
                    RawValue::Char(self.read_char()?)
                }
                ':' => {
                    self.bump();
                    let name = self.read_token();
                    if name.is_empty() {
                        return Err(self.error("empty keyword"));
                    }
                    RawValue::Keyword(name)
                }
                '#' => match self.read_dispatch()? {
                    Some(v) => v,
                    None => continue,
                },
                c if c.is_ascii_digit() => self.read_number()?,
                '+' | '-' if self.peek_second().is_some_and(|n| n.is_ascii_digit()) => {
                    self.read_number()?
                }
                _ => {
                    let token = self.read_token();
                    if token.is_empty() {
                        return Err(self.error(format!("unexpected character '{}'", c)));
                    }
                    match token.as_str() {
                        "nil" => RawValue::Nil,
                        "true" => RawValue::Bool(true),
                        "false" => RawValue::Bool(false),
                        _ => RawValue::Symbol(token),
                    }
                }
            };
            return Ok(Some(value));
        }
    }

    fn read_seq(&mut self, close: char) -> Result<Vec<RawValue>, EdnError> {
        let mut items = Vec::new();
        loop {
            match self.read_form()? {
                Some(v) => items.push(v),
                None => match self.peek() {
                    Some(c) if c == close => {
                        self.bump();
                        return Ok(items);
                    }
                    Some(c) => {
                        return Err(self.error(format!("unexpected '{}', expected '{}'", c, close)))
                    }
                    None => {
                        return Err(self.error(format!(
                            "unterminated collection, expected '{}'",
                            close
                        )))
                    }
                },
            }
        }
    }

    fn read_map(&mut self) -> Result<RawValue, EdnError> {
        let items = self.read_seq('}')?;
        if items.len() % 2 != 0 {
            return Err(self.error("map literal must contain an even number of forms"));
        }
        let mut pairs = Vec::with_capacity(items.len() / 2);
        let mut iter = items.into_iter();
        while let (Some(k), Some(v)) = (iter.next(), iter.next()) {
            pairs.push((k, v));
        }
        Ok(RawValue::Map(pairs))
    }

    /// Handles `#{`, `#_`, and `#tag`. Returns `None` for a discarded form.
    fn read_dispatch(&mut self) -> Result<Option<RawValue>, EdnError> {
        self.bump();
        match self.peek() {
            Some('{') => {
                self.bump();
                Ok(Some(RawValue::Set(self.read_seq('}')?)))
            }
            Some('_') => {
                self.bump();
                self.read_form()?
                    .ok_or_else(|| self.error("#_ must be followed by a form"))?;
                Ok(None)
            }
            Some(c) if c.is_alphabetic() => {
                let tag = self.read_token();
                let value = self
                    .read_form()?
                    .ok_or_else(|| self.error(format!("tag #{} must be followed by a form", tag)))?;
                Ok(Some(RawValue::Tagged(tag, Box::new(value))))
            }
            _ => Err(self.error("unsupported dispatch character after '#'")),
        }
    }

    fn read_token(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || ".*+!-_?$%&=<>/':#".contains(c) {
                self.bump();
            } else {
                break;
            }
        }
        self.src[start..self.pos].to_string()
    }

    fn read_string(&mut self) -> Result<String, EdnError> {
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated string")),
                Some('"') => return Ok(out),
                Some('\\') => {
                    let escaped = match self.bump() {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('r') => '\r',
                        Some('"') => '"',
                        Some('\\') => '\\',
                        Some('u') => self.read_unicode_escape()?,
                        Some(other) => {
                            return Err(self.error(format!("invalid escape '\\{}'", other)))
                        }
                        None => return Err(self.error("unterminated string")),
                    };
                    out.push(escaped);
                }
                Some(c) => out.push(c),
            }
        }
    }

    fn read_unicode_escape(&mut self) -> Result<char, EdnError> {
        let end = self.pos + 4;
        let hex = self
            .src
            .get(self.pos..end)
            .ok_or_else(|| self.error("truncated unicode escape"))?;
        let code = u32::from_str_radix(hex, 16)
            .map_err(|_| self.error(format!("invalid unicode escape '{}'", hex)))?;
        self.pos = end;
        char::from_u32(code).ok_or_else(|| self.error("unicode escape is not a scalar value"))
    }

    fn read_char(&mut self) -> Result<char, EdnError> {
        let first = self.bump().ok_or_else(|| self.error("dangling '\\'"))?;
        if !first.is_alphabetic() {
            return Ok(first);
        }
        let mut name = first.to_string();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() {
                name.push(c);
                self.bump();
            } else {
                break;
            }
        }
        match name.as_str() {
            "newline" => Ok('\n'),
            "space" => Ok(' '),
            "tab" => Ok('\t'),
            "return" => Ok('\r'),
            _ if name.chars().count() == 1 => Ok(first),
            _ if name.starts_with('u') && name.len() == 5 => {
                let code = u32::from_str_radix(&name[1..], 16)
                    .map_err(|_| self.error(format!("invalid character \\{}", name)))?;
                char::from_u32(code).ok_or_else(|| self.error("invalid unicode character"))
            }
            _ => Err(self.error(format!("unknown character name \\{}", name))),
        }
    }

    fn read_number(&mut self) -> Result<RawValue, EdnError> {
        let start = self.pos;
        let token = self.read_token();
        let invalid = || EdnError {
            offset: start,
            message: format!("invalid number '{}'", token),
        };

        if let Some((num, den)) = token.split_once('/') {
            let n: i64 = num.parse().map_err(|_| invalid())?;
            let d: i64 = den.parse().map_err(|_| invalid())?;
            if d == 0 {
                return Err(invalid());
            }
            return Ok(RawValue::Float(n as f64 / d as f64));
        }

        let trimmed = token.trim_end_matches(|c| c == 'N' || c == 'M');
        let is_float =
            token.ends_with('M') || trimmed.contains(|c| matches!(c, '.' | 'e' | 'E'));
        if is_float {
            trimmed
                .parse::<f64>()
                .map(RawValue::Float)
                .map_err(|_| invalid())
        } else {
            trimmed.parse::<i64>().map(RawValue::Int).map_err(|_| invalid())
        }
    }
}
