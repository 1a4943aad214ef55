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

use std::cell::RefCell;
use std::rc::Rc;

use streamform::helpers::parse_form;
use streamform::{Field, File, FormParser, FormParserConfig, FormParserError};

#[test]
fn s6_file_larger_than_memory_threshold_spills_exactly_once() {
    let _ = env_logger::builder().is_test(true).try_init();

    let payload = vec![b'x'; 10_000];

    let mut body = Vec::new();
    body.extend_from_slice(b"--B\r\nContent-Disposition: form-data; name=\"f\"; filename=\"big.bin\"\r\n\r\n");
    body.extend_from_slice(&payload);
    body.extend_from_slice(b"\r\n--B--\r\n");

    let config = FormParserConfig { max_memory_file_size: 1024, ..Default::default() };
    let files = Rc::new(RefCell::new(Vec::new()));
    let files_cb = files.clone();

    let mut parser = FormParser::new(
        b"multipart/form-data; boundary=B",
        config,
        |_: Field| {},
        move |file: File| files_cb.borrow_mut().push(file),
    )
    .expect("construction failed");

    parser.write(&body).expect("write failed");
    parser.finalize().expect("finalize failed");
    drop(parser);

    let files = Rc::try_unwrap(files).unwrap().into_inner();

    assert_eq!(files.len(), 1);
    assert!(files[0].is_on_disk());

    let on_disk = std::fs::read(files[0].path().unwrap()).expect("reading spilled file");
    assert_eq!(on_disk, payload);
}

#[test]
fn missing_boundary_is_reported() {
    let result = FormParser::new(
        b"multipart/form-data",
        FormParserConfig::default(),
        |_: Field| {},
        |_: File| {},
    );

    assert!(matches!(result, Err(FormParserError::MissingBoundary)));
}

#[test]
fn parse_form_drives_a_multipart_body_from_a_byte_stream() {
    let _ = env_logger::builder().is_test(true).try_init();

    let body: &[u8] = b"--B\r\n\
                        Content-Disposition: form-data; name=\"title\"\r\n\r\n\
                        hello\r\n\
                        --B--\r\n";

    let headers: [(&[u8], &[u8]); 1] = [(b"Content-Type", b"multipart/form-data; boundary=B")];
    let mut stream = body;

    let fields = Rc::new(RefCell::new(Vec::new()));
    let fields_cb = fields.clone();

    parse_form(
        &headers,
        &mut stream,
        move |field: Field| fields_cb.borrow_mut().push(field),
        |_: File| {},
    )
    .expect("parse_form failed");

    let fields = fields.borrow();
    assert_eq!(fields.len(), 1);
    assert_eq!(fields[0].name(), b"title");
    assert_eq!(fields[0].value(), b"hello");
}
