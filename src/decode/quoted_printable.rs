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

use crate::byte::hex_to_byte;
use crate::decode::Sink;
use crate::error::DecodeError;

/// Where a decoder sits inside a possibly chunk-split `=XY` escape or soft line break.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum QpState {
    /// Not in the middle of anything.
    Normal,

    /// Saw a lone `=`.
    SawEquals,

    /// Saw `=\r`, awaiting `\n` to complete a soft line break.
    SawEqualsCr,

    /// Saw `=` followed by one hex digit, awaiting the second.
    SawEqualsAndOneByte(u8),
}

/// Incremental quoted-printable decoder.
///
/// Handles `=XY` hex escapes and `=\r\n` / bare `=\n` soft line breaks split across any chunk
/// boundary. Everything else passes through unchanged.
pub struct QuotedPrintableDecoder<S: Sink> {
    sink: S,
    state: QpState,
}

impl<S: Sink> QuotedPrintableDecoder<S> {
    /// Wrap `sink` in a new decoder.
    pub fn new(sink: S) -> Self {
        QuotedPrintableDecoder { sink, state: QpState::Normal }
    }

    /// Feed a chunk of quoted-printable input, decoding and forwarding output as it becomes
    /// available.
    pub fn write(&mut self, data: &[u8]) -> Result<(), DecodeError> {
        for &byte in data {
            self.state = match self.state {
                QpState::Normal => {
                    if byte == b'=' {
                        QpState::SawEquals
                    } else {
                        self.sink.write(&[byte]);
                        QpState::Normal
                    }
                }

                QpState::SawEquals => match byte {
                    b'\r' => QpState::SawEqualsCr,
                    b'\n' => QpState::Normal, // bare-LF soft line break, tolerated
                    hex if hex.is_ascii_hexdigit() => QpState::SawEqualsAndOneByte(hex),
                    other => return Err(DecodeError::QuotedPrintableInvalidHex(other)),
                },

                QpState::SawEqualsCr => {
                    if byte == b'\n' {
                        QpState::Normal
                    } else {
                        return Err(DecodeError::QuotedPrintableInvalidHex(byte));
                    }
                }

                QpState::SawEqualsAndOneByte(high) => match hex_to_byte(high, byte) {
                    Some(decoded) => {
                        self.sink.write(&[decoded]);
                        QpState::Normal
                    }
                    None => return Err(DecodeError::QuotedPrintableInvalidHex(byte)),
                },
            };
        }

        Ok(())
    }

    /// Finalize the stream. A lone trailing `=` (in any of its partial forms) is an error: it
    /// can never be completed by more input.
    pub fn finalize(&mut self) -> Result<(), DecodeError> {
        match self.state {
            QpState::Normal => Ok(()),
            _ => Err(DecodeError::QuotedPrintableTrailingEquals),
        }
    }
}
