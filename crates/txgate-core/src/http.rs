//! Minimal HTTP/1.x message codec for the JSON-RPC exchange.
//!
//! Parses one status line, headers, and a `content-length`-delimited body
//! from a blocking byte stream, and serializes requests with CRLF framing.
//! No chunked transfer, no pipelining: every exchange is a single
//! request/response pair on a fresh connection.

use std::collections::HashMap;
use std::io::{self, BufRead};

use crate::error::RpcError;

/// Hard cap on a declared response body. Larger declarations are reported as
/// a synthetic internal-server-error status instead of being read.
pub const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

/// Hard cap on the combined size of all response header lines.
pub const MAX_HEADER_BYTES: usize = 64 * 1024;

const USER_AGENT: &str = concat!("txgate-core/", env!("CARGO_PKG_VERSION"));

/// One parsed HTTP response message.
///
/// Header names are lower-cased; the `connection` header is always present
/// after parsing (defaulted from the protocol minor version when the server
/// sent none).
#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

/// Read one HTTP message off `reader`.
///
/// The status line is parsed leniently, mirroring the node software this
/// codec talks to: a non-numeric status token yields status `0` rather than
/// a hard failure, so that locally built request bytes also parse. A line
/// with fewer than two tokens is unrecoverable and fails with
/// [`RpcError::Protocol`].
pub fn read_response<R: BufRead>(reader: &mut R) -> Result<HttpResponse, RpcError> {
    let status_line = read_crlf_line(reader)?;
    let (status, proto_minor) = parse_status_line(&status_line)?;

    let mut headers = HashMap::new();
    let mut header_bytes = 0usize;
    loop {
        let line = read_crlf_line(reader)?;
        if line.is_empty() {
            break;
        }
        header_bytes += line.len();
        if header_bytes > MAX_HEADER_BYTES {
            return Err(RpcError::Protocol(format!(
                "response headers exceed {MAX_HEADER_BYTES} bytes"
            )));
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_owned());
        }
    }

    // A negative, unparseable, or oversized declaration must not take the
    // caller down: the message degrades to an internal-error status whose
    // code is still reportable upward.
    let declared = match headers.get("content-length") {
        None => 0,
        Some(value) => value.trim().parse::<i64>().unwrap_or(-1),
    };
    if declared < 0 || declared as usize > MAX_BODY_BYTES {
        return Ok(HttpResponse {
            status: 500,
            headers,
            body: Vec::new(),
        });
    }

    let mut body = vec![0u8; declared as usize];
    reader.read_exact(&mut body)?;

    normalize_connection_header(&mut headers, proto_minor);

    Ok(HttpResponse {
        status,
        headers,
        body,
    })
}

/// Serialize one HTTP request: request line, fixed headers, caller extras,
/// blank line, body. `Content-Length` is always computed from `body`.
pub fn build_request(
    method: &str,
    path: &str,
    extra_headers: &[(&str, &str)],
    body: &[u8],
) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len() + 256);
    out.extend_from_slice(format!("{method} {path} HTTP/1.1\r\n").as_bytes());
    out.extend_from_slice(format!("User-Agent: {USER_AGENT}\r\n").as_bytes());
    out.extend_from_slice(b"Host: 127.0.0.1\r\n");
    out.extend_from_slice(format!("Content-Length: {}\r\n", body.len()).as_bytes());
    out.extend_from_slice(b"Connection: close\r\n");
    for (name, value) in extra_headers {
        out.extend_from_slice(format!("{name}: {value}\r\n").as_bytes());
    }
    out.extend_from_slice(b"\r\n");
    out.extend_from_slice(body);
    out
}

fn parse_status_line(line: &str) -> Result<(u16, u8), RpcError> {
    let mut words = line.split_whitespace();
    let proto = words
        .next()
        .ok_or_else(|| RpcError::Protocol("empty status line".to_owned()))?;
    let status_word = words
        .next()
        .ok_or_else(|| RpcError::Protocol(format!("malformed status line {line:?}")))?;

    let proto_minor = proto
        .strip_prefix("HTTP/1.")
        .and_then(|minor| minor.parse::<u8>().ok())
        .unwrap_or(0);
    let status = status_word.parse::<u16>().unwrap_or(0);
    Ok((status, proto_minor))
}

/// An explicit `close`/`keep-alive` is preserved; anything else defaults
/// from the protocol version (HTTP/1.1+ keeps the connection alive).
fn normalize_connection_header(headers: &mut HashMap<String, String>, proto_minor: u8) {
    let explicit = matches!(
        headers.get("connection").map(String::as_str),
        Some("close") | Some("keep-alive")
    );
    if !explicit {
        let default = if proto_minor >= 1 { "keep-alive" } else { "close" };
        headers.insert("connection".to_owned(), default.to_owned());
    }
}

fn read_crlf_line<R: BufRead>(reader: &mut R) -> io::Result<String> {
    let mut buf = Vec::new();
    reader.read_until(b'\n', &mut buf)?;
    while matches!(buf.last(), Some(b'\n') | Some(b'\r')) {
        buf.pop();
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
