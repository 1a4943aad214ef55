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

//! Streaming, push/callback oriented parsers for HTTP form bodies.
//!
//! Each parser is fed arbitrarily-chunked byte slices through a `write()` method and reports
//! structure through a callback trait as it goes, rather than buffering a whole body before
//! returning anything -- the same push-parsing model the teacher library uses for HTTP messages,
//! applied here to `multipart/form-data` and `application/x-www-form-urlencoded` bodies.
//!
//! Most callers should reach for [`form::FormParser`] (or [`helpers::parse_form`], which drives
//! one to completion over a blocking byte source) rather than the lower-level parsers directly.

pub mod byte;
pub mod decode;
pub mod error;
pub mod form;
pub mod handler;
pub mod helpers;
pub mod multipart;
pub mod octet_stream;
pub mod options_header;
pub mod query;

pub use crate::error::{FormParserError, FormResult};
pub use crate::form::{Field, File, FormParser, FormParserConfig};
pub use crate::handler::{MultipartHandler, OctetStreamHandler, QuerystringHandler};
pub use crate::multipart::MultipartParser;
pub use crate::octet_stream::OctetStreamParser;
pub use crate::options_header::parse_options_header;
pub use crate::query::QuerystringParser;

/// Crate major version.
pub const VERSION_MAJOR: &str = env!("CARGO_PKG_VERSION_MAJOR");

/// Crate minor version.
pub const VERSION_MINOR: &str = env!("CARGO_PKG_VERSION_MINOR");

/// Crate patch version.
pub const VERSION_PATCH: &str = env!("CARGO_PKG_VERSION_PATCH");
