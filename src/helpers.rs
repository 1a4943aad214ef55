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

//! One-shot convenience entry point built on top of [`FormParser`](crate::form::FormParser).

use std::io::Read;

use log::{debug, trace};

use crate::error::{FormParserError, FormResult};
use crate::form::{Field, File, FormParser, FormParserConfig};

/// Chunk size `parse_form` reads from `input` at a time.
const READ_CHUNK_SIZE: usize = 1024 * 1024;

/// Drive a [`FormParser`] to completion over a blocking byte source.
///
/// `headers` is searched case-insensitively for `Content-Type`; a body with none is treated the
/// same as an unrecognized one (falls through to [`OctetStreamParser`](crate::octet_stream::OctetStreamParser)).
/// `input` is read in chunks of up to 1 MiB until it reports EOF.
pub fn parse_form<R, OnField, OnFile>(
    headers: &[(&[u8], &[u8])],
    input: &mut R,
    on_field: OnField,
    on_file: OnFile,
) -> FormResult<()>
where
    R: Read,
    OnField: FnMut(Field),
    OnFile: FnMut(File),
{
    let content_type = find_header(headers, b"content-type").unwrap_or(b"");
    let mut parser = FormParser::new(content_type, FormParserConfig::default(), on_field, on_file)?;
    let mut buf = vec![0u8; READ_CHUNK_SIZE];

    loop {
        let read = input.read(&mut buf).map_err(FormParserError::from)?;

        if read == 0 {
            break;
        }

        parser.write(&buf[..read])?;
        trace!("parse_form: consumed {} bytes from input stream", read);
    }

    parser.finalize()?;
    debug!("parse_form: body fully consumed");

    Ok(())
}

fn find_header<'a>(headers: &[(&'a [u8], &'a [u8])], name: &[u8]) -> Option<&'a [u8]> {
    headers.iter().find(|(key, _)| key.eq_ignore_ascii_case(name)).map(|(_, value)| *value)
}
