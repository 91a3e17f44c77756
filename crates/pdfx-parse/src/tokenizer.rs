//! Content stream tokenizer.
//!
//! [`ContentParser`] walks raw content stream bytes and yields one
//! [`Operator`] per operand group: the operands accumulated since the
//! previous operator, closed by the operator keyword itself. Parsing is
//! lazy, so an interpreter can stop at the first failing handler without
//! tokenizing the rest of the stream.

use crate::error::BackendError;

/// Deepest array/dictionary nesting accepted in an operand.
const MAX_NESTING: usize = 256;

/// A PDF content stream operand value.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Integer number (e.g., `42`, `-7`).
    Integer(i64),
    /// Real number (e.g., `3.14`, `.5`).
    Real(f64),
    /// Name object, stored without the leading `/`.
    Name(String),
    /// Literal string `( … )`, stored as unescaped bytes.
    LiteralString(Vec<u8>),
    /// Hexadecimal string `< … >`, stored as decoded bytes.
    HexString(Vec<u8>),
    /// Array of operands.
    Array(Vec<Operand>),
    /// `true` or `false`.
    Boolean(bool),
    /// The null object.
    Null,
    /// Inline dictionary `<< … >>`, entries in source order.
    Dictionary(Vec<(String, Operand)>),
}

impl Operand {
    /// Numeric value of an `Integer` or `Real` operand.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Operand::Integer(i) => Some(*i as f64),
            Operand::Real(r) => Some(*r),
            _ => None,
        }
    }

    /// Name value without the leading `/`.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Operand::Name(n) => Some(n),
            _ => None,
        }
    }
}

/// One operand group: the operator keyword and the operands before it.
///
/// An inline image (`BI … ID … EI`) is reported as a single `BI` operator
/// whose operands are the flattened key/value dictionary as an
/// [`Operand::Array`] followed by the raw sample data as an
/// [`Operand::LiteralString`].
#[derive(Debug, Clone, PartialEq)]
pub struct Operator {
    /// Operator mnemonic (e.g., `"rg"`, `"re"`, `"Do"`).
    pub name: String,
    /// Operands in stream order.
    pub operands: Vec<Operand>,
}

impl Operator {
    pub fn new(name: impl Into<String>, operands: Vec<Operand>) -> Self {
        Self {
            name: name.into(),
            operands,
        }
    }
}

/// A lexical item: either a complete operand or a bare keyword.
enum Token {
    Operand(Operand),
    Keyword(String),
}

/// Lazy iterator over the operand groups of a content stream.
///
/// Yields `Err` once on malformed input and then stops.
pub struct ContentParser<'a> {
    input: &'a [u8],
    pos: usize,
    depth: usize,
    failed: bool,
}

impl<'a> ContentParser<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Self {
            input,
            pos: 0,
            depth: 0,
            failed: false,
        }
    }

    /// Byte offset of the next unread byte.
    pub fn position(&self) -> usize {
        self.pos
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.input.get(self.pos + offset).copied()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(b) = self.peek() {
            if is_whitespace(b) {
                self.pos += 1;
            } else if b == b'%' {
                while self.peek().is_some_and(|c| c != b'\n' && c != b'\r') {
                    self.pos += 1;
                }
            } else {
                break;
            }
        }
    }

    /// Read the next operand group, or `None` at end of stream.
    fn next_group(&mut self) -> Result<Option<Operator>, BackendError> {
        let mut operands = Vec::new();
        loop {
            self.skip_whitespace_and_comments();
            let Some(b) = self.peek() else {
                if operands.is_empty() {
                    return Ok(None);
                }
                return Err(BackendError::Interpreter(format!(
                    "{} operand(s) without an operator at end of stream",
                    operands.len()
                )));
            };
            match b {
                b']' => {
                    return Err(BackendError::Interpreter(
                        "unexpected ']' outside array".to_string(),
                    ));
                }
                b'>' | b')' | b'{' | b'}' => {
                    // stray delimiters carry no meaning in content streams
                    self.pos += 1;
                }
                _ if !starts_token(b) => self.pos += 1,
                _ => match self.read_token()? {
                    Token::Operand(op) => operands.push(op),
                    Token::Keyword(kw) if kw == "BI" => {
                        if !operands.is_empty() {
                            return Err(BackendError::MalformedOperands {
                                operator: "BI".to_string(),
                                message: format!("expected 0 operands, found {}", operands.len()),
                            });
                        }
                        return self.read_inline_image().map(Some);
                    }
                    Token::Keyword(kw) => return Ok(Some(Operator::new(kw, operands))),
                },
            }
        }
    }

    /// Read one token starting at the current byte.
    fn read_token(&mut self) -> Result<Token, BackendError> {
        let Some(b) = self.peek() else {
            return Err(BackendError::Interpreter("unexpected end of stream".to_string()));
        };
        let operand = match b {
            b'(' => Operand::LiteralString(self.read_literal_string()?),
            b'<' if self.peek_at(1) == Some(b'<') => Operand::Dictionary(self.nested(Self::read_dictionary)?),
            b'<' => Operand::HexString(self.read_hex_string()?),
            b'[' => Operand::Array(self.nested(Self::read_array)?),
            b'/' => Operand::Name(self.read_name()),
            b'0'..=b'9' | b'+' | b'-' | b'.' => self.read_number()?,
            _ if is_keyword_byte(b) => {
                let kw = self.read_keyword();
                match kw.as_str() {
                    "true" => Operand::Boolean(true),
                    "false" => Operand::Boolean(false),
                    "null" => Operand::Null,
                    _ => return Ok(Token::Keyword(kw)),
                }
            }
            _ => {
                return Err(BackendError::Interpreter(format!(
                    "unexpected byte 0x{b:02X} at offset {}",
                    self.pos
                )));
            }
        };
        Ok(Token::Operand(operand))
    }

    /// Read a value nested in an array or dictionary, where bare keywords
    /// are kept as names.
    fn read_nested_value(&mut self) -> Result<Operand, BackendError> {
        match self.read_token()? {
            Token::Operand(op) => Ok(op),
            Token::Keyword(kw) => Ok(Operand::Name(kw)),
        }
    }

    fn read_literal_string(&mut self) -> Result<Vec<u8>, BackendError> {
        self.pos += 1;
        let mut out = Vec::new();
        let mut depth = 1u32;
        while let Some(b) = self.peek() {
            self.pos += 1;
            match b {
                b'(' => {
                    depth += 1;
                    out.push(b);
                }
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(out);
                    }
                    out.push(b);
                }
                b'\\' => self.read_escape(&mut out)?,
                _ => out.push(b),
            }
        }
        Err(BackendError::Interpreter(
            "unterminated literal string".to_string(),
        ))
    }

    /// Decode the escape sequence following a backslash.
    fn read_escape(&mut self, out: &mut Vec<u8>) -> Result<(), BackendError> {
        let Some(b) = self.peek() else {
            return Err(BackendError::Interpreter(
                "unterminated escape in literal string".to_string(),
            ));
        };
        self.pos += 1;
        match b {
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'b' => out.push(0x08),
            b'f' => out.push(0x0C),
            b'\r' => {
                // line continuation, CR or CRLF
                if self.peek() == Some(b'\n') {
                    self.pos += 1;
                }
            }
            b'\n' => {}
            b'0'..=b'7' => {
                let mut value = u32::from(b - b'0');
                for _ in 0..2 {
                    match self.peek() {
                        Some(d @ b'0'..=b'7') => {
                            value = value * 8 + u32::from(d - b'0');
                            self.pos += 1;
                        }
                        _ => break,
                    }
                }
                out.push((value & 0xFF) as u8);
            }
            // `\(`, `\)`, `\\` and unknown escapes keep the character
            other => out.push(other),
        }
        Ok(())
    }

    fn read_hex_string(&mut self) -> Result<Vec<u8>, BackendError> {
        self.pos += 1;
        let mut digits = Vec::new();
        loop {
            match self.peek() {
                None => {
                    return Err(BackendError::Interpreter(
                        "unterminated hex string".to_string(),
                    ));
                }
                Some(b'>') => {
                    self.pos += 1;
                    break;
                }
                Some(b) if is_whitespace(b) => self.pos += 1,
                Some(b) => {
                    digits.push(hex_digit(b)?);
                    self.pos += 1;
                }
            }
        }
        if digits.len() % 2 != 0 {
            digits.push(0);
        }
        Ok(digits.chunks(2).map(|pair| (pair[0] << 4) | pair[1]).collect())
    }

    /// Run `read` one array or dictionary level deeper.
    fn nested<T>(&mut self, read: fn(&mut Self) -> Result<T, BackendError>) -> Result<T, BackendError> {
        if self.depth >= MAX_NESTING {
            return Err(BackendError::Interpreter(format!(
                "arrays and dictionaries nested deeper than {MAX_NESTING} levels at offset {}",
                self.pos
            )));
        }
        self.depth += 1;
        let result = read(self);
        self.depth -= 1;
        result
    }

    fn read_array(&mut self) -> Result<Vec<Operand>, BackendError> {
        self.pos += 1;
        let mut items = Vec::new();
        loop {
            self.skip_whitespace_and_comments();
            match self.peek() {
                None => return Err(BackendError::Interpreter("unterminated array".to_string())),
                Some(b']') => {
                    self.pos += 1;
                    return Ok(items);
                }
                Some(_) => items.push(self.read_nested_value()?),
            }
        }
    }

    fn read_dictionary(&mut self) -> Result<Vec<(String, Operand)>, BackendError> {
        self.pos += 2;
        let mut entries = Vec::new();
        loop {
            self.skip_whitespace_and_comments();
            match (self.peek(), self.peek_at(1)) {
                (None, _) => {
                    return Err(BackendError::Interpreter(
                        "unterminated dictionary".to_string(),
                    ));
                }
                (Some(b'>'), Some(b'>')) => {
                    self.pos += 2;
                    return Ok(entries);
                }
                (Some(b'/'), _) => {
                    let key = self.read_name();
                    self.skip_whitespace_and_comments();
                    if self.at_end() {
                        return Err(BackendError::Interpreter(
                            "unterminated dictionary value".to_string(),
                        ));
                    }
                    entries.push((key, self.read_nested_value()?));
                }
                (Some(_), _) => {
                    return Err(BackendError::Interpreter(
                        "expected name key in dictionary".to_string(),
                    ));
                }
            }
        }
    }

    fn read_name(&mut self) -> String {
        self.pos += 1;
        let start = self.pos;
        while self.peek().is_some_and(|b| !is_whitespace(b) && !is_delimiter(b)) {
            self.pos += 1;
        }
        String::from_utf8_lossy(&unescape_name(&self.input[start..self.pos])).into_owned()
    }

    fn read_number(&mut self) -> Result<Operand, BackendError> {
        let start = self.pos;
        if matches!(self.peek(), Some(b'+' | b'-')) {
            self.pos += 1;
        }
        let mut seen_dot = false;
        while let Some(b) = self.peek() {
            match b {
                b'0'..=b'9' => self.pos += 1,
                b'.' if !seen_dot => {
                    seen_dot = true;
                    self.pos += 1;
                }
                _ => break,
            }
        }
        let text = std::str::from_utf8(&self.input[start..self.pos])
            .map_err(|_| BackendError::Interpreter("invalid number token".to_string()))?;
        if seen_dot {
            text.parse::<f64>()
                .map(Operand::Real)
                .map_err(|_| BackendError::Interpreter(format!("invalid real number: {text}")))
        } else {
            text.parse::<i64>()
                .map(Operand::Integer)
                .map_err(|_| BackendError::Interpreter(format!("invalid integer: {text}")))
        }
    }

    fn read_keyword(&mut self) -> String {
        let start = self.pos;
        // digits may follow the first byte, as in `d0` and `d1`
        while self.peek().is_some_and(|b| is_keyword_byte(b) || b.is_ascii_digit()) {
            self.pos += 1;
        }
        String::from_utf8_lossy(&self.input[start..self.pos]).into_owned()
    }

    /// Read an inline image after the `BI` keyword: dictionary entries up
    /// to `ID`, then sample bytes up to a whitespace-delimited `EI`.
    fn read_inline_image(&mut self) -> Result<Operator, BackendError> {
        let mut entries = Vec::new();
        loop {
            self.skip_whitespace_and_comments();
            match (self.peek(), self.peek_at(1)) {
                (None, _) => {
                    return Err(BackendError::Interpreter(
                        "unterminated inline image (missing ID)".to_string(),
                    ));
                }
                (Some(b'I'), Some(b'D'))
                    if self.peek_at(2).is_none_or(is_whitespace) =>
                {
                    self.pos += 2;
                    // exactly one whitespace byte separates ID from the data
                    if self.peek().is_some_and(is_whitespace) {
                        self.pos += 1;
                    }
                    break;
                }
                (Some(b'/'), _) => {
                    entries.push(Operand::Name(self.read_name()));
                    self.skip_whitespace_and_comments();
                    if self.at_end() {
                        return Err(BackendError::Interpreter(
                            "unterminated inline image dictionary".to_string(),
                        ));
                    }
                    entries.push(self.read_nested_value()?);
                }
                (Some(_), _) => {
                    return Err(BackendError::Interpreter(
                        "expected name key in inline image dictionary".to_string(),
                    ));
                }
            }
        }

        let data_start = self.pos;
        let input = self.input;
        let mut i = data_start;
        while i + 1 < input.len() {
            let preceded = i == data_start || is_whitespace(input[i - 1]);
            let followed = input
                .get(i + 2)
                .is_none_or(|&b| is_whitespace(b) || is_delimiter(b));
            if preceded && followed && input[i] == b'E' && input[i + 1] == b'I' {
                let mut end = i;
                if end > data_start && is_whitespace(input[end - 1]) {
                    end -= 1;
                }
                self.pos = i + 2;
                return Ok(Operator::new(
                    "BI",
                    vec![
                        Operand::Array(entries),
                        Operand::LiteralString(input[data_start..end].to_vec()),
                    ],
                ));
            }
            i += 1;
        }
        Err(BackendError::Interpreter(
            "unterminated inline image (missing EI)".to_string(),
        ))
    }
}

impl Iterator for ContentParser<'_> {
    type Item = Result<Operator, BackendError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.next_group() {
            Ok(group) => group.map(Ok),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// Parse a whole content stream into operators.
///
/// # Errors
///
/// Returns [`BackendError::Interpreter`] for malformed content streams.
pub fn tokenize(input: &[u8]) -> Result<Vec<Operator>, BackendError> {
    ContentParser::new(input).collect()
}

pub(crate) fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n' | 0x0C | 0x00)
}

pub(crate) fn is_delimiter(b: u8) -> bool {
    matches!(
        b,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

fn is_keyword_byte(b: u8) -> bool {
    b.is_ascii_alphabetic() || matches!(b, b'*' | b'\'' | b'"')
}

fn starts_token(b: u8) -> bool {
    matches!(b, b'(' | b'<' | b'[' | b'/' | b'0'..=b'9' | b'+' | b'-' | b'.') || is_keyword_byte(b)
}

fn hex_digit(b: u8) -> Result<u8, BackendError> {
    match b {
        b'0'..=b'9' => Ok(b - b'0'),
        b'a'..=b'f' => Ok(b - b'a' + 10),
        b'A'..=b'F' => Ok(b - b'A' + 10),
        _ => Err(BackendError::Interpreter(format!(
            "invalid hex digit: {:?}",
            b as char
        ))),
    }
}

/// Resolve `#xx` escapes in a raw name token.
fn unescape_name(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'#' && i + 2 < raw.len() {
            if let (Ok(hi), Ok(lo)) = (hex_digit(raw[i + 1]), hex_digit(raw[i + 2])) {
                out.push((hi << 4) | lo);
                i += 3;
                continue;
            }
        }
        out.push(raw[i]);
        i += 1;
    }
    out
}
