use std::fmt;
use std::io::{self, Read};

use smallvec::SmallVec;

use crate::error::{Error, JsonResult, SyntaxErrorKind};
use crate::value::JsonNumber;

/// A JSON token.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonToken {
    Number(JsonNumber),
    True,
    False,
    String(String),
    Null,
    ArrayOpen,
    Comma,
    ArrayClose,
    ObjOpen,
    Colon,
    ObjClose,
}

/// A byte offset and the corresponding line and column number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Location {
    pub byte_offset: u64,
    pub line: u64,
    pub col: u64,
}

impl Default for Location {
    fn default() -> Self {
        Location {
            byte_offset: 0,
            line: 1,
            col: 1,
        }
    }
}

impl Location {
    fn advance_by_byte(&mut self, c: u8) {
        if c == b'\n' {
            self.col = 1;
            self.line += 1;
        } else {
            self.col += 1;
        }
        self.byte_offset += 1;
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} (byte {})", self.line, self.col, self.byte_offset)
    }
}

/// A buffered byte source over a [`Read`] which, unlike `Read::bytes`, keeps
/// a one-byte lookahead and never drops an I/O error.
struct ByteSource<R> {
    reader: R,
    buf: Vec<u8>,
    valid_slice_start: usize,
    valid_slice_end: usize,
    eof: bool,
}

impl<R: Read> ByteSource<R> {
    fn new(reader: R) -> Self {
        ByteSource {
            reader,
            buf: vec![0; 8192],
            valid_slice_start: 0,
            valid_slice_end: 0,
            eof: false,
        }
    }

    fn refill(&mut self) -> io::Result<()> {
        loop {
            match self.reader.read(&mut self.buf) {
                Ok(0) => {
                    self.eof = true;
                    return Ok(());
                }
                Ok(read_len) => {
                    self.valid_slice_start = 0;
                    self.valid_slice_end = read_len;
                    return Ok(());
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    fn peek(&mut self) -> io::Result<Option<u8>> {
        if self.valid_slice_start == self.valid_slice_end && !self.eof {
            self.refill()?;
        }
        if self.valid_slice_start == self.valid_slice_end {
            Ok(None)
        } else {
            Ok(Some(self.buf[self.valid_slice_start]))
        }
    }

    fn next(&mut self) -> io::Result<Option<u8>> {
        let b = self.peek()?;
        if b.is_some() {
            self.valid_slice_start += 1;
        }
        Ok(b)
    }
}

// Note: char::is_ascii_whitespace is not usable here because some characters
// are not defined as whitespace in the JSON spec. For example, U+000C FORM
// FEED is whitespace in Rust but it isn't in JSON.
fn is_whitespace(c: u8) -> bool {
    matches!(c, 0x20 | 0xa | 0xd | 0x9)
}

/// A pull-based tokenizer which reads bytes from a [`Read`] and emits
/// [`JsonToken`]s one at a time, tracking the byte offset, line and column.
///
/// The tokenizer never looks ahead more than one byte and never re-reads
/// input; [`location`](JsonTokenizer::location) exposes the position reached
/// so far for diagnostics.
pub struct JsonTokenizer<R> {
    bytes: ByteSource<R>,
    location: Location,
}

impl<R: Read> JsonTokenizer<R> {
    /// Create a new [`JsonTokenizer`].
    pub fn new(reader: R) -> Self {
        JsonTokenizer {
            bytes: ByteSource::new(reader),
            location: Location::default(),
        }
    }

    /// The location of the token that will be returned by the next call to
    /// `next_token()`, or of the whitespace preceding it.
    pub fn location(&self) -> Location {
        self.location
    }

    /// Parses a token and returns it, `Ok(None)` at a clean end of input, or
    /// an error.
    pub fn next_token(&mut self) -> JsonResult<Option<JsonToken>> {
        let b = match self.peek_byte_skip_whitespace()? {
            Some(b) => b,
            None => return Ok(None),
        };
        let token = match b {
            b'[' => JsonToken::ArrayOpen,
            b']' => JsonToken::ArrayClose,
            b'{' => JsonToken::ObjOpen,
            b'}' => JsonToken::ObjClose,
            b':' => JsonToken::Colon,
            b',' => JsonToken::Comma,
            b'0'..=b'9' | b'-' => return self.consume_number().map(Some),
            b'"' => return self.consume_string().map(Some),
            b't' => return self.consume_constant("true", JsonToken::True).map(Some),
            b'f' => return self.consume_constant("false", JsonToken::False).map(Some),
            b'n' => return self.consume_constant("null", JsonToken::Null).map(Some),
            c => return Err(self.syntax(SyntaxErrorKind::InvalidByte(c))),
        };
        self.consume_byte()?;
        Ok(Some(token))
    }

    /// Returns an error if there is more than just whitespace in the
    /// remaining bytes.
    pub fn expect_eof(&mut self) -> JsonResult<()> {
        match self.peek_byte_skip_whitespace()? {
            Some(_) => Err(self.syntax(SyntaxErrorKind::TrailingData)),
            None => Ok(()),
        }
    }

    fn syntax(&self, kind: SyntaxErrorKind) -> Error {
        Error::Syntax {
            kind,
            location: self.location,
        }
    }

    fn eof_err(&self) -> Error {
        Error::UnexpectedEof {
            location: self.location,
        }
    }

    fn io_err(&self, source: io::Error) -> Error {
        Error::Io {
            source,
            location: self.location,
        }
    }

    fn peek_byte(&mut self) -> JsonResult<Option<u8>> {
        match self.bytes.peek() {
            Ok(b) => Ok(b),
            Err(e) => Err(self.io_err(e)),
        }
    }

    fn peek_byte_skip_whitespace(&mut self) -> JsonResult<Option<u8>> {
        while let Some(c) = self.peek_byte()? {
            if !is_whitespace(c) {
                return Ok(Some(c));
            }
            self.bytes.next().map_err(|e| self.io_err(e))?;
            self.location.advance_by_byte(c);
        }
        Ok(None)
    }

    fn consume_byte(&mut self) -> JsonResult<u8> {
        match self.bytes.next().map_err(|e| self.io_err(e))? {
            Some(b) => {
                self.location.advance_by_byte(b);
                Ok(b)
            }
            None => Err(self.eof_err()),
        }
    }

    fn consume_string(&mut self) -> JsonResult<JsonToken> {
        let quote = self.consume_byte()?;
        debug_assert_eq!(quote, b'"');

        let mut s = SmallVec::<[u8; 16]>::new();
        loop {
            let b = match self.consume_byte()? {
                b'\\' => match self.consume_byte()? {
                    b'\\' => b'\\',
                    b'/' => b'/',
                    b'"' => b'"',
                    b'b' => 0x8,
                    b'f' => 0xc,
                    b'n' => b'\n',
                    b'r' => b'\r',
                    b't' => b'\t',
                    b'u' => {
                        let u = self.hex_escape()?;
                        let c = match u {
                            0xD800..=0xDBFF => {
                                // First surrogate. The second one must follow
                                // directly as another \uXXXX escape.
                                if self.consume_byte()? != b'\\' || self.consume_byte()? != b'u' {
                                    return Err(
                                        self.syntax(SyntaxErrorKind::UnpairedSurrogate(u))
                                    );
                                }
                                let u2 = self.hex_escape()?;
                                if !matches!(u2, 0xDC00..=0xDFFF) {
                                    return Err(
                                        self.syntax(SyntaxErrorKind::UnpairedSurrogate(u))
                                    );
                                }

                                // Assemble the pair into a char, the same way
                                // that char::decode_utf16 does it.
                                let c =
                                    (((u & 0x3ff) as u32) << 10 | (u2 & 0x3ff) as u32) + 0x1_0000;
                                char::from_u32(c).unwrap()
                            }
                            0xDC00..=0xDFFF => {
                                return Err(self.syntax(SyntaxErrorKind::UnpairedSurrogate(u)));
                            }
                            _ => char::from_u32(u as u32).unwrap(),
                        };
                        s.extend_from_slice(c.encode_utf8(&mut [0; 4]).as_bytes());
                        continue;
                    }
                    b => return Err(self.syntax(SyntaxErrorKind::InvalidEscape(b))),
                },
                b'"' => {
                    let s = String::from_utf8(s.into_vec())
                        .map_err(|_| self.syntax(SyntaxErrorKind::InvalidUtf8))?;
                    return Ok(JsonToken::String(s));
                }
                // Note: c.is_control() is not usable here because JSON accepts
                // 0x7f (DEL) in string literals even though 0x7f is a control
                // character.
                b if b < 0x20 => {
                    return Err(self.syntax(SyntaxErrorKind::ControlCharacter(b)));
                }
                b => b,
            };

            s.push(b);
        }
    }

    fn hex_escape(&mut self) -> JsonResult<u16> {
        let mut u = 0u16;
        for _ in 0..4 {
            let b = self.consume_byte()?;
            match ascii_byte_to_hex_digit(b) {
                Some(h) => u = u * 0x10 + h as u16,
                None => return Err(self.syntax(SyntaxErrorKind::InvalidUnicodeEscape(b))),
            }
        }
        Ok(u)
    }

    fn consume_constant(&mut self, s: &'static str, token: JsonToken) -> JsonResult<JsonToken> {
        for expected_byte in s.as_bytes() {
            let b = self.consume_byte()?;
            if b != *expected_byte {
                return Err(self.syntax(SyntaxErrorKind::InvalidLiteral(s)));
            }
        }
        Ok(token)
    }

    fn consume_digits(&mut self, s: &mut SmallVec<[u8; 16]>) -> JsonResult<usize> {
        let mut count = 0;
        while let Some(d @ b'0'..=b'9') = self.peek_byte()? {
            self.consume_byte()?;
            s.push(d);
            count += 1;
        }
        Ok(count)
    }

    fn consume_number(&mut self) -> JsonResult<JsonToken> {
        let mut s = SmallVec::<[u8; 16]>::new();
        let neg = self.peek_byte()? == Some(b'-');
        if neg {
            s.push(self.consume_byte()?);
        }

        let int_digits = self.consume_digits(&mut s)?;
        if int_digits == 0 {
            return Err(self.syntax(SyntaxErrorKind::InvalidNumber(
                "integer part must not be empty in number literal",
            )));
        }
        let int_part = &s[usize::from(neg)..];
        if int_part.starts_with(b"0") && int_part.len() > 1 {
            return Err(self.syntax(SyntaxErrorKind::InvalidNumber(
                "integer part of number must not start with 0 except for '0'",
            )));
        }

        if self.peek_byte()? == Some(b'.') {
            s.push(self.consume_byte()?);
            if self.consume_digits(&mut s)? == 0 {
                return Err(self.syntax(SyntaxErrorKind::InvalidNumber(
                    "fraction part must not be empty in number literal",
                )));
            }
        }

        if let Some(b'e' | b'E') = self.peek_byte()? {
            s.push(self.consume_byte()?);
            if let Some(b'+' | b'-') = self.peek_byte()? {
                s.push(self.consume_byte()?);
            }
            if self.consume_digits(&mut s)? == 0 {
                return Err(self.syntax(SyntaxErrorKind::InvalidNumber(
                    "exponent part must not be empty in number literal",
                )));
            }
        }

        // The buffer only ever holds ASCII digits, sign characters, '.' and
        // 'e'/'E', so this cannot fail.
        let text = std::str::from_utf8(&s).unwrap();
        Ok(JsonToken::Number(JsonNumber::from_text(text)))
    }
}

fn ascii_byte_to_hex_digit(c: u8) -> Option<u8> {
    if c.is_ascii_digit() {
        Some(c - b'0')
    } else if (b'a'..=b'f').contains(&c) {
        Some(10 + (c - b'a'))
    } else if (b'A'..=b'F').contains(&c) {
        Some(10 + (c - b'A'))
    } else {
        None
    }
}
