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

//! A form file: a part with a filename, backed by an in-memory buffer that spills to a temporary
//! file once it exceeds `FormParserConfig::max_memory_file_size`.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::debug;
use tempfile::NamedTempFile;

use crate::error::FileError;
use crate::form::config::FormParserConfig;

/// Where a `File`'s bytes currently live.
enum Sink {
    /// Still within the memory threshold.
    InMemory(Vec<u8>),

    /// Spilled to an auto-deleting temp file.
    Temp(NamedTempFile),

    /// Spilled and persisted under a caller-visible path (`upload_keep_filename`); no longer
    /// auto-deleted on drop.
    Persisted(fs::File, PathBuf),
}

/// A completed (or in-progress) uploaded file.
///
/// Bytes are buffered in memory up to `max_memory_file_size`; the first write that would exceed
/// it triggers exactly one spill to a temp file, after which all further writes (and the bytes
/// already buffered) go to disk.
pub struct File {
    field_name: Vec<u8>,
    filename: Option<Vec<u8>>,
    content_type: Option<Vec<u8>>,
    params: BTreeMap<Vec<u8>, Vec<u8>>,

    sink: Sink,
    written: u64,
    spill_threshold: u64,
    upload_dir: Option<PathBuf>,
    keep_filename: bool,
    keep_extensions: bool,
}

impl File {
    pub(crate) fn new(field_name: Vec<u8>, config: &FormParserConfig) -> Self {
        File {
            field_name,
            filename: None,
            content_type: None,
            params: BTreeMap::new(),
            sink: Sink::InMemory(Vec::new()),
            written: 0,
            spill_threshold: config.max_memory_file_size,
            upload_dir: config.upload_dir.clone(),
            keep_filename: config.upload_keep_filename,
            keep_extensions: config.upload_keep_extensions,
        }
    }

    pub(crate) fn set_filename(&mut self, filename: Vec<u8>) {
        self.filename = Some(filename);
    }

    pub(crate) fn set_content_type(&mut self, content_type: Vec<u8>) {
        self.content_type = Some(content_type);
    }

    pub(crate) fn set_params(&mut self, params: BTreeMap<Vec<u8>, Vec<u8>>) {
        self.params = params;
    }

    /// Write a chunk of decoded body bytes, spilling to disk if this pushes the file past its
    /// memory threshold.
    pub(crate) fn write(&mut self, data: &[u8]) -> Result<(), FileError> {
        self.written += data.len() as u64;

        if let Sink::InMemory(buf) = &mut self.sink {
            if self.written > self.spill_threshold {
                let mut tempfile = self.create_tempfile()?;

                tempfile.write_all(buf)?;
                tempfile.write_all(data)?;

                debug!(
                    "form: field {:?} spilled to disk after {} bytes",
                    String::from_utf8_lossy(&self.field_name),
                    self.written
                );

                self.sink = Sink::Temp(tempfile);

                return Ok(());
            }

            buf.extend_from_slice(data);

            return Ok(());
        }

        match &mut self.sink {
            Sink::Temp(tempfile) => tempfile.write_all(data).map_err(FileError::from),
            Sink::Persisted(file, _) => file.write_all(data).map_err(FileError::from),
            Sink::InMemory(_) => unreachable!(),
        }
    }

    /// Finish the file: flush the temp file (if spilled) and, if configured, persist it under a
    /// name derived from the client-supplied filename.
    pub(crate) fn finish(&mut self) -> Result<(), FileError> {
        match &mut self.sink {
            Sink::Temp(tempfile) => tempfile.flush()?,
            Sink::Persisted(file, _) => file.flush()?,
            Sink::InMemory(_) => {}
        }

        if self.keep_filename {
            self.persist_with_original_name()?;
        }

        Ok(())
    }

    fn create_tempfile(&self) -> Result<NamedTempFile, FileError> {
        let mut builder = tempfile::Builder::new();

        builder.prefix("streamform-");

        if self.keep_extensions {
            if let Some(ext) = self.extension() {
                builder.suffix(&format!(".{}", ext));
            }
        }

        let tempfile = match &self.upload_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };

        Ok(tempfile)
    }

    fn extension(&self) -> Option<String> {
        let filename = self.filename.as_ref()?;
        let name = String::from_utf8_lossy(filename);

        Path::new(name.as_ref()).extension().map(|ext| ext.to_string_lossy().into_owned())
    }

    fn persist_with_original_name(&mut self) -> Result<(), FileError> {
        let filename = match &self.filename {
            Some(name) => name.clone(),
            None => return Ok(()),
        };

        let old_sink = std::mem::replace(&mut self.sink, Sink::InMemory(Vec::new()));

        self.sink = match old_sink {
            Sink::Temp(tempfile) => {
                let dir = self.upload_dir.clone().unwrap_or_else(std::env::temp_dir);
                let target = dir.join(sanitize_filename(&filename));

                match tempfile.persist(&target) {
                    Ok(file) => Sink::Persisted(file, target),
                    Err(persist_error) => return Err(FileError::from(persist_error.error)),
                }
            }
            other => other,
        };

        Ok(())
    }

    /// The multipart field name this file was uploaded under.
    pub fn field_name(&self) -> &[u8] {
        &self.field_name
    }

    /// The client-supplied filename, if any.
    pub fn filename(&self) -> Option<&[u8]> {
        self.filename.as_deref()
    }

    /// The part's `Content-Type`, if any.
    pub fn content_type(&self) -> Option<&[u8]> {
        self.content_type.as_deref()
    }

    /// Other `Content-Disposition` parameters (e.g. none beyond `name`/`filename` in practice).
    pub fn params(&self) -> &BTreeMap<Vec<u8>, Vec<u8>> {
        &self.params
    }

    /// Total bytes written to this file.
    pub fn len(&self) -> u64 {
        self.written
    }

    /// Whether the file is empty.
    pub fn is_empty(&self) -> bool {
        self.written == 0
    }

    /// Whether this file's bytes ever spilled to disk.
    pub fn is_on_disk(&self) -> bool {
        !matches!(self.sink, Sink::InMemory(_))
    }

    /// The file's bytes, if it never spilled to disk.
    pub fn in_memory_data(&self) -> Option<&[u8]> {
        match &self.sink {
            Sink::InMemory(buf) => Some(buf),
            _ => None,
        }
    }

    /// The path of the spilled file, if any.
    pub fn path(&self) -> Option<&Path> {
        match &self.sink {
            Sink::Temp(tempfile) => Some(tempfile.path()),
            Sink::Persisted(_, path) => Some(path),
            Sink::InMemory(_) => None,
        }
    }
}

/// Strip directory components from a client-supplied filename (which may use either Windows or
/// POSIX separators) so it can't escape `upload_dir`.
fn sanitize_filename(filename: &[u8]) -> String {
    let name = String::from_utf8_lossy(filename);

    name.rsplit(['/', '\\']).next().unwrap_or("upload").to_string()
}
