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

//! `FormParser`: picks a body parser from `Content-Type` and turns its raw callbacks into
//! completed [`Field`]s and [`File`]s.

mod config;
mod field;
mod file;

pub use self::config::{FormParserConfig, DEFAULT_MAX_MEMORY_FILE_SIZE};
pub use self::field::Field;
pub use self::file::File;

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use log::{debug, trace};

use crate::decode::{Base64Decoder, QuotedPrintableDecoder, Sink};
use crate::error::{FormParserError, FormResult};
use crate::handler::{MultipartHandler, OctetStreamHandler, QuerystringHandler};
use crate::multipart::MultipartParser;
use crate::octet_stream::OctetStreamParser;
use crate::options_header::parse_options_header;
use crate::query::QuerystringParser;

/// A [`Sink`] that appends decoded bytes into a buffer shared with the adapter driving the
/// decoder, so the adapter can drain them into a `File` right after each `write()` call.
struct SharedBuf(Rc<RefCell<Vec<u8>>>);

impl Sink for SharedBuf {
    fn write(&mut self, data: &[u8]) {
        self.0.borrow_mut().extend_from_slice(data);
    }
}

/// The transfer-encoding decoder (if any) wrapped around a file part's raw body bytes.
enum PartDecoder {
    /// No `Content-Transfer-Encoding`, or one that requires no transformation (`7bit`, `8bit`,
    /// `binary`, or an unrecognized encoding tolerated by `upload_error_on_bad_cte = false`).
    Identity,
    Base64(Base64Decoder<SharedBuf>, Rc<RefCell<Vec<u8>>>),
    QuotedPrintable(QuotedPrintableDecoder<SharedBuf>, Rc<RefCell<Vec<u8>>>),
}

impl PartDecoder {
    fn for_encoding(cte: &[u8], config: &FormParserConfig) -> Result<Self, FormParserError> {
        match cte.to_ascii_lowercase().as_slice() {
            b"base64" => {
                let buf = Rc::new(RefCell::new(Vec::new()));
                Ok(PartDecoder::Base64(Base64Decoder::new(SharedBuf(buf.clone())), buf))
            }
            b"quoted-printable" => {
                let buf = Rc::new(RefCell::new(Vec::new()));
                Ok(PartDecoder::QuotedPrintable(QuotedPrintableDecoder::new(SharedBuf(buf.clone())), buf))
            }
            b"7bit" | b"8bit" | b"binary" => Ok(PartDecoder::Identity),
            _ if config.upload_error_on_bad_cte => {
                Err(FormParserError::UnknownTransferEncoding(cte.to_vec()))
            }
            _ => Ok(PartDecoder::Identity),
        }
    }

    /// Decode `data` and write the decoded bytes into `file`.
    fn feed(&mut self, file: &mut file::File, data: &[u8]) -> FormResult<()> {
        match self {
            PartDecoder::Identity => Ok(file.write(data)?),
            PartDecoder::Base64(decoder, buf) => {
                decoder.write(data)?;
                drain_into(buf, file)
            }
            PartDecoder::QuotedPrintable(decoder, buf) => {
                decoder.write(data)?;
                drain_into(buf, file)
            }
        }
    }

    fn finish(&mut self) -> FormResult<()> {
        match self {
            PartDecoder::Identity => Ok(()),
            PartDecoder::Base64(decoder, _) => Ok(decoder.finalize()?),
            PartDecoder::QuotedPrintable(decoder, _) => Ok(decoder.finalize()?),
        }
    }
}

fn drain_into(buf: &Rc<RefCell<Vec<u8>>>, file: &mut file::File) -> FormResult<()> {
    let mut pending = buf.borrow_mut();

    if !pending.is_empty() {
        file.write(&pending)?;
        pending.clear();
    }

    Ok(())
}

/// Which kind of part a multipart body's current `Content-Disposition` describes.
enum PartKind {
    Field(field::Field),
    File(file::File, PartDecoder),
}

/// Internal `MultipartHandler` that turns raw callbacks into `Field`/`File` values.
struct MultipartAdapter<OnField, OnFile>
where
    OnField: FnMut(field::Field),
    OnFile: FnMut(file::File),
{
    config: FormParserConfig,
    on_field: OnField,
    on_file: OnFile,

    header_name: Vec<u8>,
    header_value: Vec<u8>,
    headers: BTreeMap<Vec<u8>, Vec<u8>>,

    current: Option<PartKind>,
    pending_error: Option<FormParserError>,
}

impl<OnField, OnFile> MultipartHandler for MultipartAdapter<OnField, OnFile>
where
    OnField: FnMut(field::Field),
    OnFile: FnMut(file::File),
{
    fn on_part_begin(&mut self) {
        self.header_name.clear();
        self.header_value.clear();
        self.headers.clear();
        self.current = None;
    }

    fn on_header_field(&mut self, data: &[u8]) {
        self.header_name.extend_from_slice(data);
    }

    fn on_header_value(&mut self, data: &[u8]) {
        self.header_value.extend_from_slice(data);
    }

    fn on_header_end(&mut self) {
        let name = std::mem::take(&mut self.header_name).to_ascii_lowercase();
        let value = std::mem::take(&mut self.header_value);

        self.headers.insert(name, value);
    }

    fn on_headers_finished(&mut self) {
        if self.pending_error.is_some() {
            return;
        }

        let disposition =
            self.headers.get(b"content-disposition".as_slice()).cloned().unwrap_or_default();
        let (_, mut params) = parse_options_header(&disposition);
        let field_name = params.remove(b"name".as_slice()).unwrap_or_default();

        self.current = match params.remove(b"filename".as_slice()) {
            Some(filename) => {
                let mut part_file = file::File::new(field_name, &self.config);

                part_file.set_filename(filename);

                if let Some(content_type) = self.headers.get(b"content-type".as_slice()) {
                    part_file.set_content_type(content_type.clone());
                }

                part_file.set_params(params);

                let decoder = match self.headers.get(b"content-transfer-encoding".as_slice()) {
                    Some(cte) => match PartDecoder::for_encoding(cte, &self.config) {
                        Ok(decoder) => decoder,
                        Err(err) => {
                            self.pending_error = Some(err);
                            PartDecoder::Identity
                        }
                    },
                    None => PartDecoder::Identity,
                };

                debug!("form: part {:?} is a file upload", String::from_utf8_lossy(part_file.field_name()));

                Some(PartKind::File(part_file, decoder))
            }
            None => {
                let mut part_field = field::Field::new();

                part_field.push_name(&field_name);

                Some(PartKind::Field(part_field))
            }
        };
    }

    fn on_part_data(&mut self, data: &[u8]) {
        if self.pending_error.is_some() {
            return;
        }

        match &mut self.current {
            Some(PartKind::Field(part_field)) => part_field.push_value(data),
            Some(PartKind::File(part_file, decoder)) => {
                if let Err(err) = decoder.feed(part_file, data) {
                    self.pending_error = Some(err);
                }
            }
            None => {}
        }
    }

    fn on_part_end(&mut self) {
        match self.current.take() {
            Some(PartKind::Field(part_field)) => (self.on_field)(part_field),

            Some(PartKind::File(mut part_file, mut decoder)) => {
                let mut ok = self.pending_error.is_none();

                if ok {
                    if let Err(err) = decoder.finish() {
                        self.pending_error = Some(err);
                        ok = false;
                    }
                }

                if ok {
                    if let Err(err) = part_file.finish() {
                        self.pending_error = Some(FormParserError::from(err));
                        ok = false;
                    }
                }

                if ok {
                    (self.on_file)(part_file);
                }
            }

            None => {}
        }
    }

    fn on_end(&mut self) {
        trace!("form: multipart body fully consumed");
    }
}

/// Internal `QuerystringHandler` that assembles and emits `Field`s.
struct QuerystringAdapter<OnField: FnMut(field::Field)> {
    on_field: OnField,
    current: Option<field::Field>,
}

impl<OnField: FnMut(field::Field)> QuerystringHandler for QuerystringAdapter<OnField> {
    fn on_field_start(&mut self) {
        self.current = Some(field::Field::new());
    }

    fn on_field_name(&mut self, data: &[u8]) {
        if let Some(part_field) = &mut self.current {
            part_field.push_name(data);
        }
    }

    fn on_field_data(&mut self, data: &[u8]) {
        if let Some(part_field) = &mut self.current {
            part_field.push_value(data);
        }
    }

    fn on_field_end(&mut self) {
        if let Some(part_field) = self.current.take() {
            (self.on_field)(part_field);
        }
    }

    fn on_end(&mut self) {
        trace!("form: urlencoded body fully consumed");
    }
}

/// Internal `OctetStreamHandler` that accumulates an entire unstructured body into one `File`.
struct OctetStreamAdapter<OnFile: FnMut(file::File)> {
    on_file: OnFile,
    file: Option<file::File>,
    pending_error: Option<FormParserError>,
}

impl<OnFile: FnMut(file::File)> OctetStreamAdapter<OnFile> {
    fn new(config: &FormParserConfig, content_type: &[u8], on_file: OnFile) -> Self {
        let mut part_file = file::File::new(b"body".to_vec(), config);

        if !content_type.is_empty() {
            part_file.set_content_type(content_type.to_vec());
        }

        OctetStreamAdapter { on_file, file: Some(part_file), pending_error: None }
    }
}

impl<OnFile: FnMut(file::File)> OctetStreamHandler for OctetStreamAdapter<OnFile> {
    fn on_data(&mut self, data: &[u8]) {
        if let Some(part_file) = &mut self.file {
            if let Err(err) = part_file.write(data) {
                self.pending_error = Some(FormParserError::from(err));
            }
        }
    }

    fn on_end(&mut self) {
        if let Some(mut part_file) = self.file.take() {
            if self.pending_error.is_none() {
                match part_file.finish() {
                    Ok(()) => (self.on_file)(part_file),
                    Err(err) => self.pending_error = Some(FormParserError::from(err)),
                }
            }
        }
    }
}

/// Which grammar `FormParser` picked for the current `Content-Type`.
enum Backend<OnField, OnFile>
where
    OnField: FnMut(field::Field),
    OnFile: FnMut(file::File),
{
    Multipart(MultipartParser<MultipartAdapter<OnField, OnFile>>),
    Querystring(QuerystringParser<QuerystringAdapter<OnField>>),
    OctetStream(OctetStreamParser<OctetStreamAdapter<OnFile>>),
}

/// Drives one of the byte-level parsers, selected by `Content-Type`, and turns its callbacks
/// into completed [`Field`]s and [`File`]s delivered to caller-supplied closures.
pub struct FormParser<OnField, OnFile>
where
    OnField: FnMut(field::Field),
    OnFile: FnMut(file::File),
{
    backend: Backend<OnField, OnFile>,

    /// Set once any `write`/`finalize` call has returned an error, whether raised by the
    /// underlying parser or stashed by an adapter. Every call after that point is a no-op that
    /// returns [`FormParserError::Dead`] rather than re-driving a parser that already faulted.
    dead: bool,
}

impl<OnField, OnFile> FormParser<OnField, OnFile>
where
    OnField: FnMut(field::Field),
    OnFile: FnMut(file::File),
{
    /// Build a parser for a body whose headers declared `content_type`.
    ///
    /// Returns [`FormParserError::MissingBoundary`] if `content_type` names
    /// `multipart/form-data` with no `boundary` parameter.
    pub fn new(
        content_type: &[u8],
        config: FormParserConfig,
        on_field: OnField,
        on_file: OnFile,
    ) -> FormResult<Self> {
        let (main_value, mut params) = parse_options_header(content_type);
        let max_size = config.max_body_size;

        let backend = match main_value.as_slice() {
            b"application/x-www-form-urlencoded" => {
                let adapter = QuerystringAdapter { on_field, current: None };

                Backend::Querystring(QuerystringParser::new(adapter, false, max_size))
            }

            b"multipart/form-data" => {
                let boundary = params
                    .remove(b"boundary".as_slice())
                    .ok_or(FormParserError::MissingBoundary)?;

                let adapter = MultipartAdapter {
                    config,
                    on_field,
                    on_file,
                    header_name: Vec::new(),
                    header_value: Vec::new(),
                    headers: BTreeMap::new(),
                    current: None,
                    pending_error: None,
                };

                let parser = MultipartParser::new(&boundary, adapter, max_size)?;

                Backend::Multipart(parser)
            }

            _ => {
                let adapter = OctetStreamAdapter::new(&config, content_type, on_file);

                Backend::OctetStream(OctetStreamParser::new(adapter, max_size))
            }
        };

        debug!("form: selected body grammar from Content-Type {:?}", String::from_utf8_lossy(content_type));

        Ok(FormParser { backend, dead: false })
    }

    /// Feed a chunk of body bytes. Returns the number of bytes consumed.
    ///
    /// Once any call to `write`/`finalize` has returned an error, the parser is dead: every
    /// subsequent call is a no-op that returns [`FormParserError::Dead`].
    pub fn write(&mut self, data: &[u8]) -> FormResult<usize> {
        if self.dead {
            return Err(FormParserError::Dead);
        }

        let result = self.write_inner(data);

        if result.is_err() {
            self.dead = true;
        }

        result
    }

    fn write_inner(&mut self, data: &[u8]) -> FormResult<usize> {
        let consumed = match &mut self.backend {
            Backend::Multipart(parser) => parser.write(data)?,
            Backend::Querystring(parser) => parser.write(data)?,
            Backend::OctetStream(parser) => parser.write(data)?,
        };

        self.check_pending_error()?;

        Ok(consumed)
    }

    /// Finalize the stream, flushing any still-open field or file.
    ///
    /// Once any call to `write`/`finalize` has returned an error, the parser is dead: every
    /// subsequent call is a no-op that returns [`FormParserError::Dead`].
    pub fn finalize(&mut self) -> FormResult<()> {
        if self.dead {
            return Err(FormParserError::Dead);
        }

        let result = self.finalize_inner();

        if result.is_err() {
            self.dead = true;
        }

        result
    }

    fn finalize_inner(&mut self) -> FormResult<()> {
        match &mut self.backend {
            Backend::Multipart(parser) => parser.finalize()?,
            Backend::Querystring(parser) => parser.finalize()?,
            Backend::OctetStream(parser) => parser.finalize()?,
        }

        self.check_pending_error()
    }

    /// Surface the first error stashed by an adapter while processing a callback.
    ///
    /// The underlying parsers' own `write`/`finalize` calls can't return these faults directly:
    /// `MultipartHandler`/`QuerystringHandler`/`OctetStreamHandler` callbacks are infallible by
    /// design (see the crate's handler traits), so a decode or file I/O failure discovered inside
    /// one is recorded here and picked up as soon as control returns to `FormParser`.
    fn check_pending_error(&mut self) -> FormResult<()> {
        let pending = match &mut self.backend {
            Backend::Multipart(parser) => parser.handler_mut().pending_error.take(),
            Backend::Querystring(_) => None,
            Backend::OctetStream(parser) => parser.handler_mut().pending_error.take(),
        };

        match pending {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
