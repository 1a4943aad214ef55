// +-----------------------------------------------------------------------------------------------+
// | Copyright 2016 Sean Kerr                                                                      |
// |                                                                                               |
// | Licensed under the Apache License, Version 2.0 (the "License");                               |
// | you may not use this file except in compliance with the License.                              |
// | You may obtain a copy of the License at                                                       |
// |                                                                                               |
// |  http://www.apache.org/licenses/LICENSE-2.0                                                   |
// |                                                                                               |
// | Unless required by applicable law or agreed to in writing, software                           |
// | distributed under the License is distributed on an "AS IS" BASIS,                             |
// | WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.                      |
// | See the License for the specific language governing permissions and                           |
// | limitations under the License.                                                                |
// +-----------------------------------------------------------------------------------------------+

//! The error taxonomy shared by every parser in this crate.

use std::error::Error;
use std::fmt;
use std::io;

/// Common shape of a grammar-violation error: the byte offset, within the chunk that was being
/// parsed, of the byte that could not be accepted.
///
/// `MultipartParseError` and `QuerystringParseError` both implement this; it lets code that
/// doesn't care which grammar failed still report where.
pub trait ParseError: Error {
    /// Byte offset within the offending `write()` chunk, or `-1` if unknown.
    fn offset(&self) -> isize;
}

/// Grammar violation in a `multipart/form-data` body.
///
/// Carries the byte offset, within the chunk passed to the offending `write()` call, of the byte
/// that could not be parsed. The offset is `-1` when no single byte can be blamed (for example,
/// end-of-stream while a boundary match was still pending).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MultipartParseError {
    /// What the parser was doing when it gave up.
    pub kind: MultipartErrorKind,

    /// Byte offset within the offending chunk, or `-1` if unknown.
    pub offset: isize,
}

/// The specific multipart grammar rule that was violated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MultipartErrorKind {
    /// The boundary supplied at construction time was empty.
    EmptyBoundary,

    /// The leading `--boundary` sequence did not match.
    Boundary,

    /// A byte other than CRLF or `--` followed a matched boundary.
    AfterBoundary,

    /// Data followed the closing boundary other than an optional trailing CRLF.
    TrailingData,

    /// A header name contained a byte outside the HTTP token set.
    HeaderName,

    /// A CR within a header value was not followed by LF.
    HeaderValue,

    /// Total bytes consumed exceeded the parser's configured `max_size`.
    BodyTooLarge,

    /// `write()` was called after the parser already reached a terminal state.
    Dead,
}

impl MultipartParseError {
    pub(crate) fn new(kind: MultipartErrorKind, offset: isize) -> Self {
        MultipartParseError { kind, offset }
    }
}

impl fmt::Display for MultipartParseError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "multipart parse error ({:?}) at offset {}",
            self.kind, self.offset
        )
    }
}

impl Error for MultipartParseError {}

impl ParseError for MultipartParseError {
    fn offset(&self) -> isize {
        self.offset
    }
}

// -------------------------------------------------------------------------------------------------

/// Grammar violation in an `application/x-www-form-urlencoded` body.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QuerystringParseError {
    /// What the parser was doing when it gave up.
    pub kind: QuerystringErrorKind,

    /// Byte offset within the offending chunk, or `-1` if unknown.
    pub offset: isize,
}

/// The specific urlencoded grammar rule that was violated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QuerystringErrorKind {
    /// An empty field was found while `strict_parsing` was enabled.
    EmptyField,

    /// A `;` separator was found while `strict_parsing` was enabled and semicolons were not
    /// declared as an accepted separator.
    UnexpectedSemicolon,

    /// Total bytes consumed exceeded the parser's configured `max_size`.
    BodyTooLarge,

    /// `write()` was called after the parser already reached a terminal state.
    Dead,
}

impl QuerystringParseError {
    pub(crate) fn new(kind: QuerystringErrorKind, offset: isize) -> Self {
        QuerystringParseError { kind, offset }
    }
}

impl fmt::Display for QuerystringParseError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "querystring parse error ({:?}) at offset {}",
            self.kind, self.offset
        )
    }
}

impl Error for QuerystringParseError {}

impl ParseError for QuerystringParseError {
    fn offset(&self) -> isize {
        self.offset
    }
}

// -------------------------------------------------------------------------------------------------

/// A transport-encoded part body could not be decoded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecodeError {
    /// Base64 input contained a byte outside the base64 alphabet (and not whitespace).
    Base64InvalidByte(u8),

    /// Base64 input ended with a group that was not a multiple of 4 characters.
    Base64InvalidLength,

    /// A quoted-printable `=XY` escape contained a non-hex digit.
    QuotedPrintableInvalidHex(u8),

    /// A quoted-printable stream ended with a lone trailing `=`.
    QuotedPrintableTrailingEquals,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            DecodeError::Base64InvalidByte(byte) => {
                write!(formatter, "invalid base64 byte: {:#04x}", byte)
            }
            DecodeError::Base64InvalidLength => {
                write!(formatter, "base64 input length is not a multiple of 4")
            }
            DecodeError::QuotedPrintableInvalidHex(byte) => {
                write!(formatter, "invalid quoted-printable hex digit: {:#04x}", byte)
            }
            DecodeError::QuotedPrintableTrailingEquals => {
                write!(formatter, "quoted-printable stream ended with a lone '='")
            }
        }
    }
}

impl Error for DecodeError {}

// -------------------------------------------------------------------------------------------------

/// An I/O fault while spilling a `File`'s contents to a temporary file.
#[derive(Debug)]
pub struct FileError {
    source: io::Error,
}

impl FileError {
    pub(crate) fn new(source: io::Error) -> Self {
        FileError { source }
    }
}

impl fmt::Display for FileError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "upload file I/O error: {}", self.source)
    }
}

impl Error for FileError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.source)
    }
}

impl From<io::Error> for FileError {
    fn from(source: io::Error) -> Self {
        FileError::new(source)
    }
}

// -------------------------------------------------------------------------------------------------

/// The union of every fault this crate can report.
///
/// `FormParser` and [`parse_form`](crate::helpers::parse_form) surface faults through this type;
/// the lower-level parsers (`MultipartParser`, `QuerystringParser`, the decoders) return their own
/// narrower error types so callers that only use one parser don't have to match on variants that
/// can never occur for them.
#[derive(Debug)]
pub enum FormParserError {
    /// No `Content-Type` header was supplied, or it named a `multipart/form-data` body with no
    /// `boundary` parameter.
    MissingBoundary,

    /// The multipart body violated the grammar.
    Multipart(MultipartParseError),

    /// The urlencoded body violated the grammar.
    Querystring(QuerystringParseError),

    /// A part's `Content-Transfer-Encoding` could not be decoded.
    Decode(DecodeError),

    /// An unrecognized `Content-Transfer-Encoding` was declared and
    /// `FormParserConfig::upload_error_on_bad_cte` is set.
    UnknownTransferEncoding(Vec<u8>),

    /// Total body size exceeded `FormParserConfig::max_body_size`.
    BodyTooLarge,

    /// Spilling a `File` to disk failed.
    File(FileError),

    /// Reading from the caller-supplied input stream failed (raised by
    /// [`parse_form`](crate::helpers::parse_form), not by `FormParser` itself).
    Io(io::Error),

    /// `write()` or `finalize()` was called after a prior call already returned an error. The
    /// parser reached a terminal state at that point and every call after it is a no-op that
    /// reports this variant instead of re-driving the underlying grammar.
    Dead,
}

impl fmt::Display for FormParserError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormParserError::MissingBoundary => {
                write!(formatter, "multipart/form-data Content-Type had no boundary parameter")
            }
            FormParserError::Multipart(inner) => write!(formatter, "{}", inner),
            FormParserError::Querystring(inner) => write!(formatter, "{}", inner),
            FormParserError::Decode(inner) => write!(formatter, "{}", inner),
            FormParserError::UnknownTransferEncoding(cte) => {
                write!(
                    formatter,
                    "unrecognized Content-Transfer-Encoding: {}",
                    String::from_utf8_lossy(cte)
                )
            }
            FormParserError::BodyTooLarge => write!(formatter, "body exceeded max_body_size"),
            FormParserError::File(inner) => write!(formatter, "{}", inner),
            FormParserError::Io(inner) => write!(formatter, "input stream error: {}", inner),
            FormParserError::Dead => {
                write!(formatter, "form parser already failed and will not accept further input")
            }
        }
    }
}

impl Error for FormParserError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            FormParserError::Multipart(inner) => Some(inner),
            FormParserError::Querystring(inner) => Some(inner),
            FormParserError::Decode(inner) => Some(inner),
            FormParserError::File(inner) => Some(inner),
            FormParserError::Io(inner) => Some(inner),
            _ => None,
        }
    }
}

impl From<MultipartParseError> for FormParserError {
    fn from(inner: MultipartParseError) -> Self {
        FormParserError::Multipart(inner)
    }
}

impl From<QuerystringParseError> for FormParserError {
    fn from(inner: QuerystringParseError) -> Self {
        FormParserError::Querystring(inner)
    }
}

impl From<DecodeError> for FormParserError {
    fn from(inner: DecodeError) -> Self {
        FormParserError::Decode(inner)
    }
}

impl From<FileError> for FormParserError {
    fn from(inner: FileError) -> Self {
        FormParserError::File(inner)
    }
}

impl From<io::Error> for FormParserError {
    fn from(inner: io::Error) -> Self {
        FormParserError::Io(inner)
    }
}

/// A catch-all alias for this crate's most general `Result`.
pub type FormResult<T> = Result<T, FormParserError>;
