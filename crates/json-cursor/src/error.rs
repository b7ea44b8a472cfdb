use std::io;

use thiserror::Error;

use crate::tokenizer::Location;

/// A type alias for `Result<T, Error>`.
pub type JsonResult<T> = Result<T, Error>;

/// The error type used in this crate. Every variant carries the [`Location`]
/// in the input at which the problem was encountered.
#[derive(Debug, Error)]
pub enum Error {
    /// The byte sequence violates the JSON grammar. Tokenization cannot
    /// continue from this offset.
    #[error("syntax error at {location}: {kind}")]
    Syntax {
        kind: SyntaxErrorKind,
        location: Location,
    },

    /// The input ended while a token or structure was still open.
    #[error("unexpected end of input at {location}")]
    UnexpectedEof { location: Location },

    /// A cursor was used out of the allowed sequence. This indicates a
    /// programming error in the calling code, not a problem with the data.
    #[error("protocol violation at {location}: {kind}")]
    Protocol {
        kind: ProtocolViolation,
        location: Location,
    },

    /// The underlying input source failed to produce bytes. The I/O error is
    /// passed through unchanged.
    #[error("I/O error at {location}: {source}")]
    Io {
        #[source]
        source: io::Error,
        location: Location,
    },
}

impl Error {
    /// The location in the source document at which the error was encountered.
    pub fn location(&self) -> Location {
        match self {
            Error::Syntax { location, .. }
            | Error::UnexpectedEof { location }
            | Error::Protocol { location, .. }
            | Error::Io { location, .. } => *location,
        }
    }
}

/// The ways in which a byte sequence can violate the JSON grammar.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyntaxErrorKind {
    #[error("invalid byte {0:#x}")]
    InvalidByte(u8),
    #[error("invalid escape character {0:#x}")]
    InvalidEscape(u8),
    #[error("unicode escape must be \\uXXXX (X is a hex character) but found byte {0:#x}")]
    InvalidUnicodeEscape(u8),
    #[error("unpaired UTF-16 surrogate {0:#x}")]
    UnpairedSurrogate(u16),
    #[error("control character {0:#x} in string literal")]
    ControlCharacter(u8),
    #[error("invalid UTF-8 in string literal")]
    InvalidUtf8,
    #[error("invalid literal, expected '{0}'")]
    InvalidLiteral(&'static str),
    #[error("{0}")]
    InvalidNumber(&'static str),
    #[error("{expected} is expected but actually found {found}")]
    UnexpectedToken {
        expected: &'static str,
        found: String,
    },
    #[error("unexpected trailing data after the document root")]
    TrailingData,
}

/// Cursor misuse detected at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProtocolViolation {
    /// A child value was handed out but neither materialized, skipped, nor
    /// fully iterated before its parent cursor was asked to advance.
    #[error("previous child value was not consumed, materialized, or skipped")]
    UnconsumedChild,
    /// The cursor no longer corresponds to the current stream position; the
    /// traversal has advanced past it.
    #[error("cursor is stale, the stream has advanced past it")]
    StaleCursor,
}
