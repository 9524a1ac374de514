//! Server-Sent Events frame decoder.

use bytes::{Bytes, BytesMut};

use crate::errors::DecodeError;

const FIELD_EVENT: &[u8] = b"event";
const FIELD_DATA: &[u8] = b"data";
const FIELD_ID: &[u8] = b"id";

/// A decoded SSE event. One is produced per frame.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Event {
    pub last_event_id: String,
    pub event_type: String,
    pub data: Bytes,
}

impl Event {
    /// View the payload as UTF-8 text.
    pub fn data_str(&self) -> Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(&self.data)
    }

    pub fn is_default(&self) -> bool {
        self.last_event_id.is_empty() && self.event_type.is_empty() && self.data.is_empty()
    }
}

/// Decode one frame (the bytes between two blank lines) into an [`Event`].
///
/// Lines end at LF or CR. A CRLF pair yields an empty piece between the two
/// terminators, and empty pieces are dropped, so CRLF behaves as a single
/// terminator. Comment lines and unknown fields are skipped; the only failure
/// is an empty frame.
///
/// A `data` field replaces whatever earlier `data` lines in the same frame
/// produced, so only the last one survives. `retry` is recognized but never
/// applied, since nothing here reconnects; it falls through with the unknown
/// fields.
pub fn decode(frame: &[u8]) -> Result<Event, DecodeError> {
    if frame.is_empty() {
        return Err(DecodeError::EmptyInput);
    }

    let mut event = Event::default();
    let mut data = BytesMut::new();

    let lines = frame
        .split(|byte| *byte == b'\n' || *byte == b'\r')
        .filter(|line| !line.is_empty());

    for line in lines {
        if line.starts_with(b":") {
            continue;
        }

        let (field, value) = split_field(line);

        match field {
            FIELD_EVENT => event.event_type = String::from_utf8_lossy(value).into_owned(),
            FIELD_DATA => {
                data.clear();
                data.extend_from_slice(value);
                data.extend_from_slice(b"\n");
            }
            FIELD_ID => {
                if !value.contains(&0) {
                    event.last_event_id = String::from_utf8_lossy(value).into_owned();
                }
            }
            _ => {}
        }
    }

    if data.ends_with(b"\n") {
        data.truncate(data.len() - 1);
    }
    event.data = data.freeze();

    Ok(event)
}

/// Split a line at its first colon. The value keeps any later colons and loses
/// at most one leading space. A line without a colon is all field name.
fn split_field(line: &[u8]) -> (&[u8], &[u8]) {
    match line.iter().position(|byte| *byte == b':') {
        Some(pos) => {
            let value = &line[pos + 1..];
            (&line[..pos], value.strip_prefix(b" ").unwrap_or(value))
        }
        None => (line, &[][..]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(id: &str, event_type: &str, data: &str) -> Event {
        Event {
            last_event_id: id.to_string(),
            event_type: event_type.to_string(),
            data: Bytes::copy_from_slice(data.as_bytes()),
        }
    }

    #[test]
    fn decodes_event_and_data() {
        let decoded = decode(b"event: update\ndata: this is some test data hello, world\n").unwrap();
        assert_eq!(
            decoded,
            event("", "update", "this is some test data hello, world")
        );
    }

    #[test]
    fn keep_alives_between_fields_are_ignored() {
        let input = ": keep-alive\n: keep-alive\nevent: add\n: keep-alive\ndata:testing 1,2,3\nid: 65\n: keep-alive\n";
        assert_eq!(decode(input.as_bytes()).unwrap(), event("65", "add", "testing 1,2,3"));
    }

    #[test]
    fn bare_data_field_yields_empty_data() {
        let decoded = decode(b": keep-alive\ndata\n").unwrap();
        assert_eq!(decoded, Event::default());
        assert!(decoded.data.is_empty());
    }

    #[test]
    fn empty_frame_is_the_only_error() {
        assert_eq!(decode(b""), Err(DecodeError::EmptyInput));
        assert!(decode(b"\n").is_ok());
        assert!(decode(b"garbage without structure").is_ok());
        assert!(decode(b":").is_ok());
    }

    #[test]
    fn comment_only_frame_expected_default_event() {
        let decoded = decode(b": one\n:two\n: three").unwrap();
        assert!(decoded.is_default());
    }

    #[test]
    fn id_with_nul_keeps_previous_id() {
        let decoded = decode(b"id: 65\nid: \0bad\n").unwrap();
        assert_eq!(decoded.last_event_id, "65");
    }

    #[test]
    fn id_with_nul_and_no_previous_id_stays_empty() {
        let decoded = decode(b"id: a\0b\ndata: x").unwrap();
        assert_eq!(decoded.last_event_id, "");
        assert_eq!(decoded.data_str().unwrap(), "x");
    }

    #[test]
    fn repeated_event_field_last_wins() {
        let decoded = decode(b"event: first\nevent: second\n").unwrap();
        assert_eq!(decoded.event_type, "second");
    }

    #[test]
    fn repeated_data_field_keeps_only_last_line() {
        let decoded = decode(b"data: one\ndata: two\ndata: three\n").unwrap();
        assert_eq!(decoded.data_str().unwrap(), "three");
    }

    #[test]
    fn value_keeps_colons_after_the_first() {
        let decoded = decode(b"data: http://example.com:8080/path\n").unwrap();
        assert_eq!(decoded.data_str().unwrap(), "http://example.com:8080/path");
    }

    #[test]
    fn only_one_leading_space_is_stripped() {
        let decoded = decode(b"data:  padded\n").unwrap();
        assert_eq!(decoded.data_str().unwrap(), " padded");
    }

    #[test]
    fn crlf_and_cr_line_endings_split_fields() {
        let crlf = decode(b"event: ping\r\ndata: pong\r\nid: 7\r\n").unwrap();
        let cr = decode(b"event: ping\rdata: pong\rid: 7\r").unwrap();
        assert_eq!(crlf, event("7", "ping", "pong"));
        assert_eq!(cr, crlf);
    }

    #[test]
    fn field_names_are_case_sensitive_and_unknown_fields_ignored() {
        let decoded = decode(b"Event: loud\nDATA: loud\nfoo: bar\nretry: 1500\n").unwrap();
        assert!(decoded.is_default());
    }

    #[test]
    fn data_trailing_newline_stripped_once() {
        let decoded = decode(b"data:\n").unwrap();
        assert_eq!(decoded.data, Bytes::new());
    }

    #[test]
    fn non_utf8_data_is_kept_verbatim() {
        let decoded = decode(b"data: \xff\xfe\n").unwrap();
        assert_eq!(&decoded.data[..], b"\xff\xfe");
        assert!(decoded.data_str().is_err());
    }
}
