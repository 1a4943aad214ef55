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

//! Byte-level streaming parser for `application/x-www-form-urlencoded` bodies.

use log::trace;

use crate::error::{QuerystringErrorKind, QuerystringParseError};
use crate::handler::QuerystringHandler;

/// Current position within the `field (separator field)*` grammar.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    /// Waiting for the first byte of a field, or for a separator before the next one.
    BeforeField,

    /// Accumulating a field name.
    FieldName,

    /// Accumulating field data (after `=`).
    FieldData,

    /// The closing boundary has been reached; no further bytes are accepted.
    End,

    /// A fatal grammar error occurred.
    Dead,
}

/// Streaming parser for `application/x-www-form-urlencoded` bodies.
///
/// No percent-decoding is performed here; `on_field_name`/`on_field_data` deliver raw bytes
/// exactly as they appeared in the body, leaving decoding to the caller.
pub struct QuerystringParser<H: QuerystringHandler> {
    handler: H,
    state: State,
    strict_parsing: bool,
    max_size: Option<u64>,
    consumed: u64,
    field_open: bool,

    /// Set when `BeforeField` was entered by consuming a separator, cleared once a field
    /// actually starts. Lets `finalize()` tell a trailing stray separator (`"foo=bar&"`) apart
    /// from simply having parsed nothing yet.
    after_separator: bool,
}

impl<H: QuerystringHandler> QuerystringParser<H> {
    /// Create a new parser.
    ///
    /// When `strict_parsing` is true, empty fields (e.g. a stray `&&`) and `;` separators raise
    /// [`QuerystringParseError`] instead of being silently skipped/accepted.
    pub fn new(handler: H, strict_parsing: bool, max_size: Option<u64>) -> Self {
        QuerystringParser {
            handler,
            state: State::BeforeField,
            strict_parsing,
            max_size,
            consumed: 0,
            field_open: false,
            after_separator: false,
        }
    }

    /// Borrow the wrapped handler.
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Mutably borrow the wrapped handler.
    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    /// Consume this parser and return the wrapped handler.
    pub fn into_handler(self) -> H {
        self.handler
    }

    /// Feed a chunk of body bytes. Returns the number of bytes consumed, which is always
    /// `data.len()` unless the parser is, or becomes, dead.
    pub fn write(&mut self, data: &[u8]) -> Result<usize, QuerystringParseError> {
        if self.state == State::Dead {
            return Err(QuerystringParseError::new(QuerystringErrorKind::Dead, -1));
        }

        if self.state == State::End {
            return Ok(0);
        }

        let mut start = 0;

        for i in 0..data.len() {
            let byte = data[i];

            if byte == b';' && self.strict_parsing {
                self.state = State::Dead;

                return Err(self.fail(QuerystringErrorKind::UnexpectedSemicolon, i as isize));
            }

            let is_sep = byte == b'&' || byte == b';';

            match self.state {
                State::BeforeField => {
                    if is_sep {
                        if self.strict_parsing {
                            self.state = State::Dead;

                            return Err(self.fail(QuerystringErrorKind::EmptyField, i as isize));
                        }

                        // Lenient mode: stray separator before any field content, ignore.
                        continue;
                    }

                    self.open_field();
                    start = i;
                    self.state = State::FieldName;
                }

                State::FieldName => {
                    if byte == b'=' {
                        self.flush_name(data, start, i);
                        start = i + 1;
                        self.state = State::FieldData;
                    } else if is_sep {
                        self.flush_name(data, start, i);
                        self.close_field();
                        self.state = State::BeforeField;
                    }
                }

                State::FieldData => {
                    if is_sep {
                        self.flush_data(data, start, i);
                        self.close_field();
                        self.state = State::BeforeField;
                    }
                }

                State::End | State::Dead => unreachable!(),
            }
        }

        self.consumed += data.len() as u64;

        if let Some(max) = self.max_size {
            if self.consumed > max {
                self.state = State::Dead;

                return Err(self.fail(QuerystringErrorKind::BodyTooLarge, -1));
            }
        }

        // Flush whatever scratch remains in this chunk to the handler before returning, since
        // the field may continue in the next `write` call.
        match self.state {
            State::FieldName => self.flush_name(data, start, data.len()),
            State::FieldData => self.flush_data(data, start, data.len()),
            _ => {}
        }

        Ok(data.len())
    }

    /// Finalize the stream: emit a pending `on_field_end` if a field is still open, then
    /// `on_end`. Idempotent -- calling this twice is a no-op the second time.
    pub fn finalize(&mut self) -> Result<(), QuerystringParseError> {
        if self.state == State::End {
            return Ok(());
        }

        if self.state == State::Dead {
            return Err(QuerystringParseError::new(QuerystringErrorKind::Dead, -1));
        }

        if self.strict_parsing && self.state == State::BeforeField && self.after_separator {
            self.state = State::Dead;

            return Err(self.fail(QuerystringErrorKind::EmptyField, -1));
        }

        if self.field_open {
            self.close_field();
        }

        trace!("querystring parser reached end of input");

        self.handler.on_end();
        self.state = State::End;

        Ok(())
    }

    fn open_field(&mut self) {
        self.handler.on_field_start();
        self.field_open = true;
        self.after_separator = false;
    }

    fn close_field(&mut self) {
        self.handler.on_field_end();
        self.field_open = false;
        self.after_separator = true;
    }

    fn flush_name(&mut self, data: &[u8], start: usize, end: usize) {
        if end > start {
            self.handler.on_field_name(&data[start..end]);
        }
    }

    fn flush_data(&mut self, data: &[u8], start: usize, end: usize) {
        if end > start {
            self.handler.on_field_data(&data[start..end]);
        }
    }

    fn fail(&self, kind: QuerystringErrorKind, offset: isize) -> QuerystringParseError {
        QuerystringParseError::new(kind, offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        fields: Vec<(Vec<u8>, Vec<u8>)>,
        current_name: Vec<u8>,
        current_data: Vec<u8>,
        ended: bool,
    }

    impl QuerystringHandler for Recorder {
        fn on_field_start(&mut self) {
            self.current_name.clear();
            self.current_data.clear();
        }

        fn on_field_name(&mut self, data: &[u8]) {
            self.current_name.extend_from_slice(data);
        }

        fn on_field_data(&mut self, data: &[u8]) {
            self.current_data.extend_from_slice(data);
        }

        fn on_field_end(&mut self) {
            self.fields.push((self.current_name.clone(), self.current_data.clone()));
        }

        fn on_end(&mut self) {
            self.ended = true;
        }
    }

    fn parse_whole(input: &[u8], strict: bool) -> Recorder {
        let mut parser = QuerystringParser::new(Recorder::default(), strict, None);

        parser.write(input).expect("write failed");
        parser.finalize().expect("finalize failed");
        parser.into_handler()
    }

    #[test]
    fn parses_two_fields() {
        let recorder = parse_whole(b"foo=bar&baz=qux", false);

        assert_eq!(
            recorder.fields,
            vec![(b"foo".to_vec(), b"bar".to_vec()), (b"baz".to_vec(), b"qux".to_vec())]
        );
        assert!(recorder.ended);
    }

    #[test]
    fn field_without_equals_has_empty_data() {
        let recorder = parse_whole(b"flag&foo=bar", false);

        assert_eq!(recorder.fields[0], (b"flag".to_vec(), b"".to_vec()));
    }

    #[test]
    fn lenient_mode_skips_empty_segments() {
        let recorder = parse_whole(b"foo=bar&&baz=qux", false);

        assert_eq!(recorder.fields.len(), 2);
    }

    #[test]
    fn semicolon_is_a_separator_when_not_strict() {
        let recorder = parse_whole(b"foo=bar;baz=qux", false);

        assert_eq!(recorder.fields.len(), 2);
    }

    #[test]
    fn strict_mode_rejects_semicolon() {
        let mut parser = QuerystringParser::new(Recorder::default(), true, None);

        assert!(parser.write(b"foo=bar;baz=qux").is_err());
    }

    #[test]
    fn strict_mode_rejects_trailing_separator() {
        let mut parser = QuerystringParser::new(Recorder::default(), true, None);

        parser.write(b"foo=bar&").expect("write failed");

        assert!(parser.finalize().is_err());
    }

    #[test]
    fn split_across_chunks_matches_whole_input() {
        let whole = parse_whole(b"foo=bar&baz=qux", false);

        let mut parser = QuerystringParser::new(Recorder::default(), false, None);
        let body = b"foo=bar&baz=qux";

        for byte in body {
            parser.write(&[*byte]).expect("write failed");
        }

        parser.finalize().expect("finalize failed");

        assert_eq!(parser.into_handler().fields, whole.fields);
    }

    #[test]
    fn finalize_is_idempotent() {
        let mut parser = QuerystringParser::new(Recorder::default(), false, None);

        parser.write(b"foo=bar").unwrap();
        parser.finalize().unwrap();
        parser.finalize().unwrap();
    }
}
