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

//! Pass-through parser for bodies with no structure of their own, used as the fallback when a
//! `Content-Type` matches neither multipart nor urlencoded.

use crate::error::{QuerystringErrorKind, QuerystringParseError};
use crate::handler::OctetStreamHandler;

/// Forwards every byte it receives to [`OctetStreamHandler::on_data`], enforcing an optional
/// total-size cap.
pub struct OctetStreamParser<H: OctetStreamHandler> {
    handler: H,
    max_size: Option<u64>,
    consumed: u64,
    dead: bool,
    ended: bool,
}

impl<H: OctetStreamHandler> OctetStreamParser<H> {
    /// Create a new parser, optionally capping the total number of bytes it will accept.
    pub fn new(handler: H, max_size: Option<u64>) -> Self {
        OctetStreamParser { handler, max_size, consumed: 0, dead: false, ended: false }
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

    /// Forward `data` to the handler. Returns the number of bytes consumed.
    pub fn write(&mut self, data: &[u8]) -> Result<usize, QuerystringParseError> {
        if self.dead {
            return Err(QuerystringParseError::new(QuerystringErrorKind::Dead, -1));
        }

        if self.ended {
            return Ok(0);
        }

        self.consumed += data.len() as u64;

        if let Some(max) = self.max_size {
            if self.consumed > max {
                self.dead = true;

                return Err(QuerystringParseError::new(QuerystringErrorKind::BodyTooLarge, -1));
            }
        }

        if !data.is_empty() {
            self.handler.on_data(data);
        }

        Ok(data.len())
    }

    /// Finalize the stream. Idempotent.
    pub fn finalize(&mut self) -> Result<(), QuerystringParseError> {
        if self.ended {
            return Ok(());
        }

        if self.dead {
            return Err(QuerystringParseError::new(QuerystringErrorKind::Dead, -1));
        }

        self.handler.on_end();
        self.ended = true;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        data: Vec<u8>,
        ended: bool,
    }

    impl OctetStreamHandler for Recorder {
        fn on_data(&mut self, data: &[u8]) {
            self.data.extend_from_slice(data);
        }

        fn on_end(&mut self) {
            self.ended = true;
        }
    }

    #[test]
    fn forwards_all_bytes() {
        let mut parser = OctetStreamParser::new(Recorder::default(), None);

        parser.write(b"hello ").unwrap();
        parser.write(b"world").unwrap();
        parser.finalize().unwrap();

        let recorder = parser.into_handler();

        assert_eq!(recorder.data, b"hello world");
        assert!(recorder.ended);
    }

    #[test]
    fn enforces_max_size() {
        let mut parser = OctetStreamParser::new(Recorder::default(), Some(4));

        assert!(parser.write(b"too many bytes").is_err());
    }

    #[test]
    fn finalize_is_idempotent() {
        let mut parser = OctetStreamParser::new(Recorder::default(), None);

        parser.finalize().unwrap();
        parser.finalize().unwrap();
    }
}
