#![forbid(unsafe_code)]

use crate::json_rpc_error;
use serde_json::Value;
use std::io::{BufRead, Write};

const MAX_CONTENT_LENGTH_BYTES: usize = 16 * 1024 * 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum TransportMode {
    NewlineJson,
    ContentLength,
}

impl TransportMode {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            TransportMode::NewlineJson => "newline_json",
            TransportMode::ContentLength => "content_length",
        }
    }
}

pub(crate) fn detect_mode_from_first_line(line: &str) -> Option<TransportMode> {
    let trimmed = line.trim_start();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return Some(TransportMode::NewlineJson);
    }
    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with("content-length:") || lower.starts_with("content-type:") {
        return Some(TransportMode::ContentLength);
    }
    None
}

fn parse_content_length_header(line: &str) -> Option<usize> {
    let (key, value) = line.trim().split_once(':')?;
    if !key.trim().eq_ignore_ascii_case("content-length") {
        return None;
    }
    value.trim().parse::<usize>().ok()
}

/// Reads the rest of a header block that starts with `first_header`, then the body.
/// `Ok(None)` means the peer closed the stream mid-frame.
pub(crate) fn read_content_length_frame<R: BufRead>(
    reader: &mut R,
    first_header: String,
) -> std::io::Result<Option<Vec<u8>>> {
    let mut header = first_header;
    let mut content_length = parse_content_length_header(&header);

    while !header.trim_end().is_empty() {
        header.clear();
        if reader.read_line(&mut header)? == 0 {
            return Ok(None);
        }
        if content_length.is_none() {
            content_length = parse_content_length_header(&header);
        }
    }

    let Some(len) = content_length else {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "Missing Content-Length header",
        ));
    };
    if len > MAX_CONTENT_LENGTH_BYTES {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "Content-Length exceeds max allowed size",
        ));
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body)?;
    Ok(Some(body))
}

pub(crate) fn write_frame<W: Write>(
    writer: &mut W,
    mode: TransportMode,
    resp: &Value,
) -> Result<(), Box<dyn std::error::Error>> {
    match mode {
        TransportMode::NewlineJson => {
            writeln!(writer, "{}", serde_json::to_string(resp)?)?;
        }
        TransportMode::ContentLength => {
            let body = serde_json::to_vec(resp)?;
            write!(writer, "Content-Length: {}\r\n\r\n", body.len())?;
            writer.write_all(&body)?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// Parses one JSON-RPC message. On failure returns the error response to send back.
pub(crate) fn parse_request(body: &[u8]) -> Result<crate::JsonRpcRequest, Value> {
    let data: Value = serde_json::from_slice(body)
        .map_err(|e| json_rpc_error(None, -32700, &format!("Parse error: {e}")))?;

    let (id, has_method) = match data.as_object() {
        Some(obj) => (obj.get("id").cloned(), obj.contains_key("method")),
        None => {
            return Err(json_rpc_error(None, -32600, "Invalid Request"));
        }
    };
    if !has_method {
        return Err(json_rpc_error(id, -32600, "Invalid Request"));
    }

    serde_json::from_value::<crate::JsonRpcRequest>(data)
        .map_err(|e| json_rpc_error(id, -32600, &format!("Invalid Request: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn mode_is_detected_from_the_first_line() {
        assert_eq!(
            detect_mode_from_first_line("  {\"jsonrpc\":\"2.0\"}"),
            Some(TransportMode::NewlineJson)
        );
        assert_eq!(
            detect_mode_from_first_line("Content-Length: 12\r\n"),
            Some(TransportMode::ContentLength)
        );
        assert_eq!(detect_mode_from_first_line("\r\n"), None);
        assert_eq!(detect_mode_from_first_line("hello"), None);
    }

    #[test]
    fn content_length_frame_reads_exact_body() {
        let mut reader =
            Cursor::new(b"Content-Type: application/json\r\n\r\n{\"a\":1}tail".to_vec());
        let body = read_content_length_frame(&mut reader, "Content-Length: 7\r\n".to_string())
            .expect("frame")
            .expect("body");
        assert_eq!(body, b"{\"a\":1}");
    }

    #[test]
    fn frame_without_length_is_invalid() {
        let mut reader = Cursor::new(b"\r\n".to_vec());
        let err = read_content_length_frame(&mut reader, "Content-Type: x\r\n".to_string())
            .expect_err("no length");
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }

    #[test]
    fn request_without_method_is_rejected_with_its_id() {
        let err = parse_request(br#"{"jsonrpc":"2.0","id":7}"#).expect_err("no method");
        assert_eq!(err["error"]["code"], -32600);
        assert_eq!(err["id"], 7);
        let err = parse_request(b"not json").expect_err("parse error");
        assert_eq!(err["error"]["code"], -32700);
    }
}
