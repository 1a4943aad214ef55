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

use streamform::handler::MultipartHandler;
use streamform::multipart::MultipartParser;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct PartRecord {
    headers: Vec<(Vec<u8>, Vec<u8>)>,
    data: Vec<u8>,
}

#[derive(Default)]
struct Recorder {
    parts: Vec<PartRecord>,
    current: PartRecord,
    header_name: Vec<u8>,
    header_value: Vec<u8>,
    ended: bool,
}

impl MultipartHandler for Recorder {
    fn on_part_begin(&mut self) {
        self.current = PartRecord::default();
    }

    fn on_header_field(&mut self, data: &[u8]) {
        self.header_name.extend_from_slice(data);
    }

    fn on_header_value(&mut self, data: &[u8]) {
        self.header_value.extend_from_slice(data);
    }

    fn on_header_end(&mut self) {
        let name = std::mem::take(&mut self.header_name);
        let value = std::mem::take(&mut self.header_value);

        self.current.headers.push((name, value));
    }

    fn on_part_data(&mut self, data: &[u8]) {
        self.current.data.extend_from_slice(data);
    }

    fn on_part_end(&mut self) {
        self.parts.push(self.current.clone());
    }

    fn on_end(&mut self) {
        self.ended = true;
    }
}

fn parse_whole(boundary: &[u8], body: &[u8]) -> Recorder {
    let mut parser = MultipartParser::new(boundary, Recorder::default(), None).expect("new failed");

    parser.write(body).expect("write failed");
    parser.finalize().expect("finalize failed");
    parser.into_handler()
}

fn header<'a>(part: &'a PartRecord, name: &str) -> Option<&'a [u8]> {
    part.headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name.as_bytes()))
        .map(|(_, value)| value.as_slice())
}

#[test]
fn s2_two_part_body() {
    let _ = env_logger::builder().is_test(true).try_init();

    let body = b"--AaB03x\r\n\
                 Content-Disposition: form-data; name=\"field1\"\r\n\r\n\
                 value1\r\n\
                 --AaB03x\r\n\
                 Content-Disposition: form-data; name=\"pics\"; filename=\"file1.txt\"\r\n\
                 Content-Type: text/plain\r\n\r\n\
                 hello\r\n\
                 --AaB03x--\r\n";

    let recorder = parse_whole(b"AaB03x", body);

    assert_eq!(recorder.parts.len(), 2);
    assert_eq!(recorder.parts[0].data, b"value1");
    assert_eq!(header(&recorder.parts[0], "content-disposition"), Some(&b"form-data; name=\"field1\""[..]));

    assert_eq!(recorder.parts[1].data, b"hello");
    assert_eq!(header(&recorder.parts[1], "content-type"), Some(&b"text/plain"[..]));
    assert!(recorder.ended);
}

#[test]
fn s3_boundary_prefix_inside_body_is_not_a_false_positive() {
    let _ = env_logger::builder().is_test(true).try_init();

    let body = b"--AaB03x\r\n\
                 Content-Disposition: form-data; name=\"f\"\r\n\r\n\
                 leading --AaB03 not a boundary trailing\r\n\
                 --AaB03x--\r\n";

    let recorder = parse_whole(b"AaB03x", body);

    assert_eq!(recorder.parts[0].data, b"leading --AaB03 not a boundary trailing");
}

#[test]
fn s4_trailing_garbage_after_closing_boundary_is_an_error() {
    let _ = env_logger::builder().is_test(true).try_init();

    let body = b"--AaB03x\r\n\
                 Content-Disposition: form-data; name=\"f\"\r\n\r\n\
                 x\r\n\
                 --AaB03x--XYZ";

    let mut parser = MultipartParser::new(b"AaB03x", Recorder::default(), None).unwrap();

    assert!(parser.write(body).is_err());
}

#[test]
fn s4_trailing_crlf_after_closing_boundary_is_accepted() {
    let _ = env_logger::builder().is_test(true).try_init();

    let body = b"--AaB03x\r\n\
                 Content-Disposition: form-data; name=\"f\"\r\n\r\n\
                 x\r\n\
                 --AaB03x--\r\n";

    let recorder = parse_whole(b"AaB03x", body);

    assert!(recorder.ended);
}

#[test]
fn empty_boundary_is_rejected_at_construction() {
    assert!(MultipartParser::new(b"", Recorder::default(), None).is_err());
}

#[test]
fn chunk_invariance_across_every_byte_offset() {
    let _ = env_logger::builder().is_test(true).try_init();

    let body: &[u8] = b"--AaB03x\r\n\
                        Content-Disposition: form-data; name=\"field1\"\r\n\r\n\
                        value1\r\n\
                        --AaB03x\r\n\
                        Content-Disposition: form-data; name=\"pics\"; filename=\"file1.txt\"\r\n\
                        Content-Type: text/plain\r\n\r\n\
                        hello\r\n\
                        --AaB03x--\r\n";

    let whole = parse_whole(b"AaB03x", body);

    for split in 0..=body.len() {
        let (head, tail) = body.split_at(split);
        let mut parser = MultipartParser::new(b"AaB03x", Recorder::default(), None).unwrap();

        parser.write(head).expect("write failed");
        parser.write(tail).expect("write failed");
        parser.finalize().expect("finalize failed");

        assert_eq!(parser.into_handler().parts, whole.parts, "split at {}", split);
    }
}
