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

//! Byte-level streaming parser for `multipart/form-data` bodies.
//!
//! Boundary scanning inside a part's body uses a Boyer-Moore-Horspool skip table built once from
//! the configured boundary, so a long run of non-boundary bytes is skipped in large jumps rather
//! than inspected one byte at a time.

use log::{debug, trace};

use crate::byte::{is_space_or_tab, is_token};
use crate::error::{MultipartErrorKind, MultipartParseError};
use crate::handler::MultipartHandler;

/// Current position in the multipart grammar.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    /// Matching the initial `--boundary` at the very start of the body.
    StartBoundary,

    /// Disambiguating the bytes following a matched boundary: `CRLF` starts a part, `--` closes
    /// the body.
    AfterBoundary,

    /// Consuming the optional trailing `CRLF` after the closing boundary.
    ClosingBoundary,

    HeaderFieldStart,
    HeaderField,
    HeaderValueStart,
    HeaderValue,
    HeaderValueAlmostDone,
    HeadersAlmostDone,

    /// Streaming the current part's body, scanning for the next boundary.
    PartData,

    /// Closing boundary consumed; no more input is accepted.
    End,
}

/// Streaming parser for `multipart/form-data` bodies.
pub struct MultipartParser<H: MultipartHandler> {
    handler: H,
    state: State,
    dead: bool,

    /// `--` + boundary, matched byte-for-byte at the very start of the body.
    start_marker: Vec<u8>,
    start_index: usize,

    /// `CRLF--` + boundary, searched for within part bodies.
    data_marker: Vec<u8>,
    skip: [usize; 256],

    /// Bytes tentatively matched against `data_marker` that must be retained across `write`
    /// calls because the boundary may be split across a chunk boundary.
    lookbehind: Vec<u8>,

    /// Scratch for the small, fixed-length sequences matched one byte at a time (the two bytes
    /// after a boundary, or the optional trailing CRLF after the closing boundary).
    boundary_tail: Vec<u8>,

    header_name: Vec<u8>,
    header_value: Vec<u8>,

    max_size: Option<u64>,
    consumed: u64,
}

impl<H: MultipartHandler> MultipartParser<H> {
    /// Create a new parser for the given boundary (without the leading `--`).
    ///
    /// Returns [`MultipartErrorKind::EmptyBoundary`] if `boundary` is empty.
    pub fn new(
        boundary: &[u8],
        handler: H,
        max_size: Option<u64>,
    ) -> Result<Self, MultipartParseError> {
        if boundary.is_empty() {
            return Err(MultipartParseError::new(MultipartErrorKind::EmptyBoundary, -1));
        }

        let mut start_marker = Vec::with_capacity(boundary.len() + 2);
        start_marker.extend_from_slice(b"--");
        start_marker.extend_from_slice(boundary);

        let mut data_marker = Vec::with_capacity(boundary.len() + 4);
        data_marker.extend_from_slice(b"\r\n--");
        data_marker.extend_from_slice(boundary);

        let skip = build_skip_table(&data_marker);

        Ok(MultipartParser {
            handler,
            state: State::StartBoundary,
            dead: false,
            start_marker,
            start_index: 0,
            data_marker,
            skip,
            lookbehind: Vec::new(),
            boundary_tail: Vec::new(),
            header_name: Vec::new(),
            header_value: Vec::new(),
            max_size,
            consumed: 0,
        })
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

    /// Feed a chunk of body bytes. Returns the number of bytes consumed.
    pub fn write(&mut self, data: &[u8]) -> Result<usize, MultipartParseError> {
        if self.dead {
            return Err(MultipartParseError::new(MultipartErrorKind::Dead, -1));
        }

        if self.state == State::End {
            if data.is_empty() {
                return Ok(0);
            }

            self.dead = true;

            return Err(self.fail(MultipartErrorKind::TrailingData, 0));
        }

        let mut pos = 0;

        while pos < data.len() {
            pos = match self.state {
                State::StartBoundary => self.feed_start_boundary(data, pos)?,
                State::AfterBoundary => self.feed_after_boundary(data, pos)?,
                State::ClosingBoundary => self.feed_closing_boundary(data, pos)?,
                State::HeaderFieldStart
                | State::HeaderField
                | State::HeaderValueStart
                | State::HeaderValue
                | State::HeaderValueAlmostDone
                | State::HeadersAlmostDone => self.feed_headers(data, pos)?,
                State::PartData => self.feed_part_data(data, pos)?,
                State::End => {
                    self.dead = true;

                    return Err(self.fail(MultipartErrorKind::TrailingData, pos as isize));
                }
            };
        }

        self.consumed += data.len() as u64;

        if let Some(max) = self.max_size {
            if self.consumed > max {
                self.dead = true;

                return Err(self.fail(MultipartErrorKind::BodyTooLarge, -1));
            }
        }

        Ok(data.len())
    }

    /// Finalize the stream. Any state other than `End` at this point means the body was
    /// truncated before its closing boundary, which is an error. Idempotent once `End` is
    /// reached.
    pub fn finalize(&mut self) -> Result<(), MultipartParseError> {
        if self.state == State::End {
            return Ok(());
        }

        if self.dead {
            return Err(MultipartParseError::new(MultipartErrorKind::Dead, -1));
        }

        self.dead = true;

        Err(self.fail(MultipartErrorKind::Boundary, -1))
    }

    fn feed_start_boundary(&mut self, data: &[u8], mut pos: usize) -> Result<usize, MultipartParseError> {
        while pos < data.len() {
            let byte = data[pos];
            let expected = self.start_marker[self.start_index];

            if byte != expected {
                return Err(self.fail(MultipartErrorKind::Boundary, pos as isize));
            }

            self.start_index += 1;
            pos += 1;

            if self.start_index == self.start_marker.len() {
                trace!("multipart: initial boundary matched");
                self.state = State::AfterBoundary;
                self.boundary_tail.clear();

                return Ok(pos);
            }
        }

        Ok(pos)
    }

    fn feed_after_boundary(&mut self, data: &[u8], mut pos: usize) -> Result<usize, MultipartParseError> {
        while pos < data.len() && self.boundary_tail.len() < 2 {
            let byte = data[pos];
            let offset = pos as isize;

            self.boundary_tail.push(byte);
            pos += 1;

            if self.boundary_tail.len() == 1 {
                if byte != b'\r' && byte != b'-' {
                    return Err(self.fail(MultipartErrorKind::AfterBoundary, offset));
                }

                continue;
            }

            match (self.boundary_tail[0], self.boundary_tail[1]) {
                (b'\r', b'\n') => {
                    trace!("multipart: boundary followed by CRLF, new part begins");
                    self.boundary_tail.clear();
                    self.header_name.clear();
                    self.header_value.clear();
                    self.handler.on_part_begin();
                    self.state = State::HeaderFieldStart;
                }
                (b'-', b'-') => {
                    trace!("multipart: closing boundary matched");
                    self.boundary_tail.clear();
                    self.state = State::ClosingBoundary;
                }
                _ => return Err(self.fail(MultipartErrorKind::AfterBoundary, offset)),
            }

            return Ok(pos);
        }

        Ok(pos)
    }

    fn feed_closing_boundary(&mut self, data: &[u8], mut pos: usize) -> Result<usize, MultipartParseError> {
        while pos < data.len() {
            let byte = data[pos];
            let offset = pos as isize;

            pos += 1;

            if self.boundary_tail.is_empty() {
                if byte != b'\r' {
                    return Err(self.fail(MultipartErrorKind::TrailingData, offset));
                }

                self.boundary_tail.push(byte);
            } else {
                if byte != b'\n' {
                    return Err(self.fail(MultipartErrorKind::TrailingData, offset));
                }

                self.boundary_tail.clear();
                self.state = State::End;
                debug!("multipart: end of body");
                self.handler.on_end();

                return Ok(pos);
            }
        }

        Ok(pos)
    }

    fn feed_headers(&mut self, data: &[u8], mut pos: usize) -> Result<usize, MultipartParseError> {
        while pos < data.len() {
            let byte = data[pos];
            let offset = pos as isize;

            match self.state {
                State::HeaderFieldStart => {
                    if byte == b'\r' {
                        self.state = State::HeadersAlmostDone;
                        pos += 1;
                    } else if is_token(byte) {
                        self.handler.on_header_begin();
                        self.header_name.clear();
                        self.header_name.push(byte);
                        self.state = State::HeaderField;
                        pos += 1;
                    } else {
                        return Err(self.fail(MultipartErrorKind::HeaderName, offset));
                    }
                }

                State::HeaderField => {
                    if byte == b':' {
                        self.handler.on_header_field(&self.header_name);
                        self.header_value.clear();
                        self.state = State::HeaderValueStart;
                        pos += 1;
                    } else if is_token(byte) {
                        self.header_name.push(byte);
                        pos += 1;
                    } else {
                        return Err(self.fail(MultipartErrorKind::HeaderName, offset));
                    }
                }

                State::HeaderValueStart => {
                    if is_space_or_tab(byte) {
                        pos += 1;
                    } else if byte == b'\r' {
                        self.state = State::HeaderValueAlmostDone;
                        pos += 1;
                    } else {
                        self.state = State::HeaderValue;
                    }
                }

                State::HeaderValue => {
                    if byte == b'\r' {
                        self.state = State::HeaderValueAlmostDone;
                        pos += 1;
                    } else if byte == b'\n' {
                        self.finish_header();
                        self.state = State::HeaderFieldStart;
                        pos += 1;
                    } else {
                        self.header_value.push(byte);
                        pos += 1;
                    }
                }

                State::HeaderValueAlmostDone => {
                    if byte == b'\n' {
                        self.finish_header();
                        self.state = State::HeaderFieldStart;
                        pos += 1;
                    } else {
                        return Err(self.fail(MultipartErrorKind::HeaderValue, offset));
                    }
                }

                State::HeadersAlmostDone => {
                    if byte == b'\n' {
                        pos += 1;
                        trace!("multipart: headers finished");
                        self.handler.on_headers_finished();
                        self.state = State::PartData;
                        self.lookbehind.clear();

                        return Ok(pos);
                    }

                    return Err(self.fail(MultipartErrorKind::HeaderValue, offset));
                }

                State::StartBoundary
                | State::AfterBoundary
                | State::ClosingBoundary
                | State::PartData
                | State::End => unreachable!("feed_headers called outside a header state"),
            }
        }

        Ok(pos)
    }

    fn finish_header(&mut self) {
        self.handler.on_header_value(&self.header_value);
        self.handler.on_header_end();
    }

    fn feed_part_data(&mut self, data: &[u8], pos: usize) -> Result<usize, MultipartParseError> {
        let rest = &data[pos..];
        let m = self.data_marker.len();

        if let Some(logical_pos) = self.search_data_marker(rest) {
            let lb_len = self.lookbehind.len();

            self.emit_before_match(rest, logical_pos, lb_len);
            self.lookbehind.clear();
            self.handler.on_part_end();

            let consumed_in_rest = logical_pos + m - lb_len;
            self.state = State::AfterBoundary;
            self.boundary_tail.clear();

            return Ok(pos + consumed_in_rest);
        }

        let lb_len = self.lookbehind.len();
        let total = lb_len + rest.len();

        if total < m {
            self.lookbehind.extend_from_slice(rest);

            return Ok(pos + rest.len());
        }

        let safe_len = total - (m - 1);

        self.emit_before_match(rest, safe_len, lb_len);

        let mut new_lookbehind = Vec::with_capacity(m - 1);

        for i in safe_len..total {
            new_lookbehind.push(self.logical_byte(rest, i, lb_len));
        }

        self.lookbehind = new_lookbehind;

        Ok(pos + rest.len())
    }

    /// Emit logical bytes `[0, end_logical)` (lookbehind followed by `data`) to the part-data
    /// callback, splitting across the lookbehind/data boundary without copying `data`.
    fn emit_before_match(&mut self, data: &[u8], end_logical: usize, lb_len: usize) {
        if end_logical == 0 {
            return;
        }

        let from_lookbehind = end_logical.min(lb_len);

        if from_lookbehind > 0 {
            self.handler.on_part_data(&self.lookbehind[..from_lookbehind]);
        }

        if end_logical > lb_len {
            self.handler.on_part_data(&data[..end_logical - lb_len]);
        }
    }

    #[inline]
    fn logical_byte(&self, data: &[u8], idx: usize, lb_len: usize) -> u8 {
        if idx < lb_len {
            self.lookbehind[idx]
        } else {
            data[idx - lb_len]
        }
    }

    /// Boyer-Moore-Horspool search for `data_marker` within the logical concatenation of
    /// `lookbehind` and `data`. Returns the logical index of a match, if any.
    fn search_data_marker(&self, data: &[u8]) -> Option<usize> {
        let m = self.data_marker.len();
        let lb_len = self.lookbehind.len();
        let total = lb_len + data.len();

        if total < m {
            return None;
        }

        let mut i = 0;

        while i <= total - m {
            let mut j = m - 1;

            loop {
                if self.data_marker[j] != self.logical_byte(data, i + j, lb_len) {
                    break;
                }

                if j == 0 {
                    return Some(i);
                }

                j -= 1;
            }

            let last = self.logical_byte(data, i + m - 1, lb_len);
            i += self.skip[last as usize];
        }

        None
    }

    fn fail(&self, kind: MultipartErrorKind, offset: isize) -> MultipartParseError {
        MultipartParseError::new(kind, offset)
    }
}

/// Build the Boyer-Moore-Horspool bad-character skip table for `marker`.
fn build_skip_table(marker: &[u8]) -> [usize; 256] {
    let m = marker.len();
    let mut table = [m; 256];
    let mut i = 0;

    while i + 1 < m {
        table[marker[i] as usize] = m - 1 - i;
        i += 1;
    }

    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
        parts: Vec<PartRecord>,
    }

    #[derive(Default, Clone)]
    struct PartRecord {
        headers: Vec<(Vec<u8>, Vec<u8>)>,
        data: Vec<u8>,
        current_name: Vec<u8>,
        current_value: Vec<u8>,
    }

    impl MultipartHandler for Recorder {
        fn on_part_begin(&mut self) {
            self.parts.push(PartRecord::default());
            self.events.push("part_begin".into());
        }

        fn on_header_field(&mut self, data: &[u8]) {
            self.parts.last_mut().unwrap().current_name = data.to_vec();
        }

        fn on_header_value(&mut self, data: &[u8]) {
            self.parts.last_mut().unwrap().current_value.extend_from_slice(data);
        }

        fn on_header_end(&mut self) {
            let part = self.parts.last_mut().unwrap();
            let name = std::mem::take(&mut part.current_name);
            let value = std::mem::take(&mut part.current_value);
            part.headers.push((name, value));
        }

        fn on_headers_finished(&mut self) {
            self.events.push("headers_finished".into());
        }

        fn on_part_data(&mut self, data: &[u8]) {
            self.parts.last_mut().unwrap().data.extend_from_slice(data);
        }

        fn on_part_end(&mut self) {
            self.events.push("part_end".into());
        }

        fn on_end(&mut self) {
            self.events.push("end".into());
        }
    }

    fn parse_whole(body: &[u8]) -> Recorder {
        let mut parser = MultipartParser::new(b"AaB03x", Recorder::default(), None).unwrap();

        parser.write(body).expect("write failed");
        parser.finalize().expect("finalize failed");
        parser.into_handler()
    }

    fn two_part_body() -> Vec<u8> {
        let mut body = Vec::new();

        body.extend_from_slice(b"--AaB03x\r\n");
        body.extend_from_slice(b"Content-Disposition: form-data; name=\"field1\"\r\n");
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(b"value1");
        body.extend_from_slice(b"\r\n--AaB03x\r\n");
        body.extend_from_slice(b"Content-Disposition: form-data; name=\"pics\"; filename=\"file1.txt\"\r\n");
        body.extend_from_slice(b"Content-Type: text/plain\r\n");
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(b"hello");
        body.extend_from_slice(b"\r\n--AaB03x--\r\n");

        body
    }

    #[test]
    fn two_part_body_is_parsed() {
        let recorder = parse_whole(&two_part_body());

        assert_eq!(recorder.parts.len(), 2);
        assert_eq!(recorder.parts[0].data, b"value1");
        assert_eq!(recorder.parts[1].data, b"hello");
        assert_eq!(
            recorder.parts[0].headers[0],
            (b"Content-Disposition".to_vec(), b"form-data; name=\"field1\"".to_vec())
        );
        assert_eq!(recorder.events.last(), Some(&"end".to_string()));
    }

    #[test]
    fn boundary_prefix_inside_body_is_not_a_false_positive() {
        let mut body = Vec::new();

        body.extend_from_slice(b"--AaB03x\r\n\r\n");
        body.extend_from_slice(b"--AaB03 is not the boundary");
        body.extend_from_slice(b"\r\n--AaB03x--\r\n");

        let recorder = parse_whole(&body);

        assert_eq!(recorder.parts[0].data, b"--AaB03 is not the boundary");
    }

    #[test]
    fn garbage_after_closing_boundary_is_an_error() {
        let mut parser = MultipartParser::new(b"AaB03x", Recorder::default(), None).unwrap();
        let body = b"--AaB03x--XYZ";

        assert!(parser.write(body).is_err());
    }

    #[test]
    fn trailing_crlf_after_closing_boundary_is_accepted() {
        let body = b"--AaB03x--\r\n";
        let recorder = parse_whole(body);

        assert_eq!(recorder.events, vec!["end".to_string()]);
        assert!(recorder.parts.is_empty());
    }

    #[test]
    fn empty_boundary_is_rejected_at_construction() {
        assert!(MultipartParser::new(b"", Recorder::default(), None).is_err());
    }

    #[test]
    fn split_across_every_byte_matches_whole_input() {
        let body = two_part_body();
        let whole = parse_whole(&body);

        let mut parser = MultipartParser::new(b"AaB03x", Recorder::default(), None).unwrap();

        for byte in &body {
            parser.write(&[*byte]).expect("write failed");
        }

        parser.finalize().expect("finalize failed");

        let split = parser.into_handler();

        assert_eq!(split.parts.len(), whole.parts.len());
        assert_eq!(split.parts[0].data, whole.parts[0].data);
        assert_eq!(split.parts[1].data, whole.parts[1].data);
    }
}
