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

//! Parses HTTP header values of the shape `token; name=value; name="quoted value"`, the form
//! used by `Content-Type` and `Content-Disposition`.
//!
//! This is a pure function over a byte slice; it does no streaming and keeps no state between
//! calls. It understands RFC 2231 parameter continuations (`title*0=`, `title*1=`, ...) and
//! extended values (`filename*=UTF-8''r%C3%A9sum%C3%A9.txt`).

use std::collections::BTreeMap;

use crate::byte::hex_to_byte;

/// Parse an options header value into its main token and parameter map.
///
/// The main value is lowercased and trimmed. Parameter names are lowercased; values are returned
/// as raw bytes exactly as the header declared them (after unquoting/un-escaping or RFC 2231
/// percent-decoding) -- charset transcoding beyond that is left to the caller, per the crate's
/// bytes-in, bytes-out policy.
pub fn parse_options_header(value: &[u8]) -> (Vec<u8>, BTreeMap<Vec<u8>, Vec<u8>>) {
    let segments = split_top_level(value);
    let mut iter = segments.into_iter();

    let main_value = match iter.next() {
        Some(seg) => trim(seg).to_ascii_lowercase(),
        None => Vec::new(),
    };

    // Group raw parameter segments by base key; within a key, order by the RFC 2231 sequence
    // number (always 0 for a key with no `*N` suffix). A repeated sequence number overwrites the
    // prior one in place, which is how a plain duplicate `name=` key resolves to "last write
    // wins" without disturbing real continuation assembly.
    let mut order: Vec<Vec<u8>> = Vec::new();
    let mut groups: BTreeMap<Vec<u8>, Vec<Option<(bool, Vec<u8>)>>> = BTreeMap::new();

    for seg in iter {
        let seg = trim(seg);

        let eq = match seg.iter().position(|&b| b == b'=') {
            Some(i) => i,
            None => continue,
        };

        let raw_name = trim(&seg[..eq]).to_ascii_lowercase();
        let raw_value = trim(&seg[eq + 1..]);
        let (key, seq, extended) = split_param_name(&raw_name);

        let slots = groups.entry(key.clone()).or_insert_with(|| {
            order.push(key.clone());
            Vec::new()
        });

        if slots.len() <= seq as usize {
            slots.resize(seq as usize + 1, None);
        }

        slots[seq as usize] = Some((extended, raw_value.to_vec()));
    }

    let mut params = BTreeMap::new();

    for key in order {
        let slots = groups.remove(&key).unwrap_or_default();
        let mut assembled = Vec::new();

        for (index, slot) in slots.into_iter().enumerate() {
            let (extended, raw) = match slot {
                Some(pair) => pair,
                // A gap in the continuation sequence: stop assembling, matching the common
                // implementation choice of taking what parsed cleanly up to the break.
                None => break,
            };

            if extended {
                assembled.extend_from_slice(&decode_extended_value(&raw, index == 0));
            } else {
                assembled.extend_from_slice(&unquote(&raw));
            }
        }

        params.insert(key, assembled);
    }

    (main_value, params)
}

/// Split `title*1*` into `(b"title", 1, true)`, `title*1` into `(b"title", 1, false)`, a bare
/// `title*` into `(b"title", 0, true)`, and anything else into `(title, 0, false)`.
fn split_param_name(name: &[u8]) -> (Vec<u8>, u32, bool) {
    let (body, extended) = match name.strip_suffix(b"*") {
        Some(rest) => (rest, true),
        None => (name, false),
    };

    if let Some(star) = body.iter().rposition(|&b| b == b'*') {
        let digits = &body[star + 1..];

        if !digits.is_empty() && digits.iter().all(u8::is_ascii_digit) {
            if let Ok(seq) = std::str::from_utf8(digits).unwrap_or("").parse::<u32>() {
                return (body[..star].to_vec(), seq, extended);
            }
        }
    }

    (body.to_vec(), 0, extended)
}

/// Decode an RFC 2231 extended value. `has_charset_prefix` is true only for the first segment of
/// a continuation (or a standalone `name*=` value), which alone carries the `charset'lang'` part.
fn decode_extended_value(raw: &[u8], has_charset_prefix: bool) -> Vec<u8> {
    let pct_encoded = if has_charset_prefix {
        let mut quotes = raw.splitn(3, |&b| b == b'\'');

        let _charset = quotes.next();
        let _lang = quotes.next();

        quotes.next().unwrap_or(raw)
    } else {
        raw
    };

    percent_decode(pct_encoded)
}

/// Percent-decode a byte slice, passing through any byte that isn't part of a valid `%XX` escape.
fn percent_decode(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len());
    let mut i = 0;

    while i < input.len() {
        if input[i] == b'%' && i + 2 < input.len() {
            if let Some(byte) = hex_to_byte(input[i + 1], input[i + 2]) {
                out.push(byte);
                i += 3;
                continue;
            }
        }

        out.push(input[i]);
        i += 1;
    }

    out
}

/// Strip one layer of surrounding double quotes and resolve backslash escapes. Unterminated
/// quoted strings take everything up to the end of input.
fn unquote(raw: &[u8]) -> Vec<u8> {
    if raw.first() != Some(&b'"') {
        return raw.to_vec();
    }

    let mut out = Vec::with_capacity(raw.len());
    let mut i = 1;

    while i < raw.len() {
        match raw[i] {
            b'"' => break,
            b'\\' if i + 1 < raw.len() => {
                out.push(raw[i + 1]);
                i += 2;
            }
            byte => {
                out.push(byte);
                i += 1;
            }
        }
    }

    out
}

/// Split `value` on top-level `;` bytes, treating double-quoted runs (with backslash escapes) as
/// opaque so a `;` inside a quoted value is not a separator.
fn split_top_level(value: &[u8]) -> Vec<&[u8]> {
    let mut segments = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut i = 0;

    while i < value.len() {
        match value[i] {
            b'"' => in_quotes = !in_quotes,
            b'\\' if in_quotes && i + 1 < value.len() => i += 1,
            b';' if !in_quotes => {
                segments.push(&value[start..i]);
                start = i + 1;
            }
            _ => {}
        }

        i += 1;
    }

    segments.push(&value[start..]);
    segments
}

/// Trim ASCII whitespace from both ends.
fn trim(value: &[u8]) -> &[u8] {
    let mut start = 0;
    let mut end = value.len();

    while start < end && value[start].is_ascii_whitespace() {
        start += 1;
    }

    while end > start && value[end - 1].is_ascii_whitespace() {
        end -= 1;
    }

    &value[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param<'a>(params: &'a BTreeMap<Vec<u8>, Vec<u8>>, name: &str) -> &'a [u8] {
        params.get(name.as_bytes()).expect("missing param").as_slice()
    }

    #[test]
    fn simple_main_value_and_quoted_param() {
        let (main, params) = parse_options_header(br#"form-data; name="field1""#);

        assert_eq!(main, b"form-data");
        assert_eq!(param(&params, "name"), b"field1");
    }

    #[test]
    fn semicolon_inside_quotes_is_not_a_separator() {
        let (main, params) = parse_options_header(br#"form-data; name="a;b""#);

        assert_eq!(main, b"form-data");
        assert_eq!(param(&params, "name"), b"a;b");
    }

    #[test]
    fn windows_filename_returned_verbatim() {
        let (_, params) = parse_options_header(br#"form-data; name="f"; filename="C:\foo\bar.txt""#);

        assert_eq!(param(&params, "filename"), b"C:\\foo\\bar.txt");
    }

    #[test]
    fn rfc2231_extended_value() {
        let (main, params) = parse_options_header(
            b"form-data; name=\"file\"; filename*=UTF-8''r%C3%A9sum%C3%A9.txt",
        );

        assert_eq!(main, b"form-data");
        assert_eq!(param(&params, "filename"), "résumé.txt".as_bytes());
    }

    #[test]
    fn rfc2231_continuation_assembly() {
        let (_, params) = parse_options_header(
            b"attachment; filename*0=\"long-file\"; filename*1=\"-name.txt\"",
        );

        assert_eq!(param(&params, "filename"), b"long-file-name.txt");
    }

    #[test]
    fn duplicate_key_last_write_wins() {
        let (_, params) = parse_options_header(b"form-data; name=one; name=two");

        assert_eq!(param(&params, "name"), b"two");
    }

    #[test]
    fn unterminated_quote_takes_rest_of_input() {
        let (_, params) = parse_options_header(br#"form-data; name="unterminated"#);

        assert_eq!(param(&params, "name"), b"unterminated");
    }
}
