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

//! Callback traits driven by the parsers in this crate.
//!
//! Every method has an empty default body, so a caller only needs to override the handful of
//! callbacks it cares about. Unlike the teacher library's `HttpHandler`, none of these return a
//! `bool` to request early exit: the grammars here have no notion of "stop parsing early", so the
//! callbacks are pure notifications.

/// Callbacks driven by [`MultipartParser`](crate::multipart::MultipartParser).
#[allow(unused_variables)]
pub trait MultipartHandler {
    /// A new part has begun.
    fn on_part_begin(&mut self) {}

    /// A new header has begun within the current part.
    fn on_header_begin(&mut self) {}

    /// A header name byte range within the buffer passed to `write`.
    fn on_header_field(&mut self, data: &[u8]) {}

    /// A header value byte range within the buffer passed to `write`.
    fn on_header_value(&mut self, data: &[u8]) {}

    /// One `name: value` header pair has finished.
    fn on_header_end(&mut self) {}

    /// All headers for the current part have been consumed.
    fn on_headers_finished(&mut self) {}

    /// A chunk of the current part's body.
    fn on_part_data(&mut self, data: &[u8]) {}

    /// The current part has finished.
    fn on_part_end(&mut self) {}

    /// The closing boundary has been consumed; no more parts follow.
    fn on_end(&mut self) {}
}

/// Callbacks driven by [`QuerystringParser`](crate::query::QuerystringParser).
#[allow(unused_variables)]
pub trait QuerystringHandler {
    /// A new field has begun.
    fn on_field_start(&mut self) {}

    /// A chunk of the current field's name.
    fn on_field_name(&mut self, data: &[u8]) {}

    /// A chunk of the current field's value.
    fn on_field_data(&mut self, data: &[u8]) {}

    /// The current field has finished.
    fn on_field_end(&mut self) {}

    /// The body has been fully consumed.
    fn on_end(&mut self) {}
}

/// Callbacks driven by [`OctetStreamParser`](crate::octet_stream::OctetStreamParser).
#[allow(unused_variables)]
pub trait OctetStreamHandler {
    /// A chunk of body data.
    fn on_data(&mut self, data: &[u8]) {}

    /// The body has been fully consumed.
    fn on_end(&mut self) {}
}
