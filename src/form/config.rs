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

//! Tunable knobs for [`FormParser`](crate::form::FormParser).

use std::path::PathBuf;

/// Threshold, in bytes, past which a `File`'s in-memory buffer spills to disk.
pub const DEFAULT_MAX_MEMORY_FILE_SIZE: u64 = 64 * 1024;

/// Configuration for [`FormParser`](crate::form::FormParser).
///
/// Every field has a documented default; construct with `FormParserConfig::default()` and
/// override only what needs to change.
#[derive(Clone, Debug)]
pub struct FormParserConfig {
    /// Directory that spilled files are written into. `None` means the platform temp directory
    /// (`std::env::temp_dir()`).
    pub upload_dir: Option<PathBuf>,

    /// Keep the client-supplied filename (from `Content-Disposition`) on the spilled file,
    /// rather than a generated name.
    pub upload_keep_filename: bool,

    /// Keep the client-supplied filename's extension when generating a temp file name.
    pub upload_keep_extensions: bool,

    /// Raise [`FormParserError::UnknownTransferEncoding`](crate::error::FormParserError) for an
    /// unrecognized `Content-Transfer-Encoding` rather than passing the part through unmodified.
    pub upload_error_on_bad_cte: bool,

    /// In-memory buffer size, per file, before it spills to disk.
    pub max_memory_file_size: u64,

    /// Hard cap on total body bytes. `None` means unbounded.
    pub max_body_size: Option<u64>,
}

impl Default for FormParserConfig {
    fn default() -> Self {
        FormParserConfig {
            upload_dir: None,
            upload_keep_filename: false,
            upload_keep_extensions: false,
            upload_error_on_bad_cte: true,
            max_memory_file_size: DEFAULT_MAX_MEMORY_FILE_SIZE,
            max_body_size: None,
        }
    }
}
