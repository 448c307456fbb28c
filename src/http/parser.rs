use thiserror::Error;

use crate::config::Limits;
use crate::http::headers::Headers;
use crate::http::request::{Method, QueryParams, Request, Version};
use crate::http::response::StatusCode;
use crate::routing::PathParams;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Not enough bytes yet; read more and retry.
    #[error("incomplete request")]
    Incomplete,
    #[error("malformed request line")]
    InvalidRequest,
    #[error("unrecognized method")]
    InvalidMethod,
    #[error("request target must be an absolute path")]
    InvalidPath,
    #[error("unsupported HTTP version")]
    InvalidVersion,
    #[error("malformed header line")]
    InvalidHeader,
    #[error("invalid Content-Length")]
    InvalidContentLength,
    #[error("malformed chunked body")]
    InvalidChunk,
    #[error("header section too large")]
    HeadersTooLarge,
    #[error("request body too large")]
    BodyTooLarge,
}

impl ParseError {
    pub fn is_incomplete(&self) -> bool {
        matches!(self, ParseError::Incomplete)
    }

    /// Status used to answer a request that failed to parse.
    pub fn status(&self) -> StatusCode {
        match self {
            ParseError::BodyTooLarge => StatusCode::PayloadTooLarge,
            ParseError::HeadersTooLarge => StatusCode::RequestHeaderFieldsTooLarge,
            _ => StatusCode::BadRequest,
        }
    }
}

/// Decodes one request from the front of `buf` with default limits.
pub fn decode(buf: &[u8]) -> Result<(Request, usize), ParseError> {
    parse_http_request(buf, &Limits::default())
}

/// Decodes one request from the front of `buf`.
///
/// On success returns the request and the number of bytes it occupied;
/// anything after that belongs to the next request on the connection.
pub fn parse_http_request(buf: &[u8], limits: &Limits) -> Result<(Request, usize), ParseError> {
    // stray CRLFs between keep-alive requests are ignored
    let start = leading_crlfs(buf);
    let buf = &buf[start..];

    // Look for header/body separator
    let headers_end = match find_headers_end(buf) {
        Some(end) if end > limits.max_header_bytes => return Err(ParseError::HeadersTooLarge),
        Some(end) => end,
        None if buf.len() > limits.max_header_bytes => return Err(ParseError::HeadersTooLarge),
        None => return Err(ParseError::Incomplete),
    };
    let header_bytes = &buf[..headers_end];
    let body_start = headers_end + 4;

    let headers_str = std::str::from_utf8(header_bytes).map_err(|_| ParseError::InvalidRequest)?;

    let mut lines = headers_str.split("\r\n");

    // Request line: exactly METHOD SP TARGET SP VERSION
    let request_line = lines.next().ok_or(ParseError::InvalidRequest)?;
    let parts: Vec<&str> = request_line.split(' ').collect();
    let &[method_str, target, version_str] = parts.as_slice() else {
        return Err(ParseError::InvalidRequest);
    };
    if method_str.is_empty() || target.is_empty() || version_str.is_empty() {
        return Err(ParseError::InvalidRequest);
    }

    let method = Method::from_str(method_str).ok_or(ParseError::InvalidMethod)?;
    let version = Version::from_str(version_str).ok_or(ParseError::InvalidVersion)?;

    if !target.starts_with('/') {
        return Err(ParseError::InvalidPath);
    }
    let (raw_path, query) = match target.split_once('?') {
        Some((p, q)) => (p, QueryParams::parse(q)),
        None => (target, QueryParams::new()),
    };
    let path = urlencoding::decode(raw_path)
        .map_err(|_| ParseError::InvalidPath)?
        .into_owned();

    // Headers
    let mut headers = Headers::new();

    for line in lines {
        if line.starts_with(' ') || line.starts_with('\t') {
            // obsolete line folding
            return Err(ParseError::InvalidHeader);
        }

        let (key, value) = line.split_once(':').ok_or(ParseError::InvalidHeader)?;

        if key.is_empty() || key.contains(|c: char| c.is_ascii_whitespace()) {
            return Err(ParseError::InvalidHeader);
        }

        headers.append(key, value.trim());
    }

    // Body
    let rest = &buf[body_start..];
    let (body, body_len) = if headers.has_token("Transfer-Encoding", "chunked") {
        decode_chunked(rest, limits.max_body_bytes)?
    } else {
        let content_length = content_length(&headers)?.unwrap_or(0);
        if content_length > limits.max_body_bytes {
            return Err(ParseError::BodyTooLarge);
        }
        if rest.len() < content_length {
            return Err(ParseError::Incomplete);
        }
        (rest[..content_length].to_vec(), content_length)
    };

    let request = Request {
        method,
        path,
        version,
        query,
        headers,
        body,
        params: PathParams::new(),
    };

    let total_consumed = start + body_start + body_len;
    Ok((request, total_consumed))
}

/// Every `Content-Length` value must agree.
fn content_length(headers: &Headers) -> Result<Option<usize>, ParseError> {
    let mut found: Option<usize> = None;
    for raw in headers.get_all("Content-Length").flat_map(|v| v.split(',')) {
        let n = raw
            .trim()
            .parse::<usize>()
            .map_err(|_| ParseError::InvalidContentLength)?;
        match found {
            Some(prev) if prev != n => return Err(ParseError::InvalidContentLength),
            _ => found = Some(n),
        }
    }
    Ok(found)
}

/// Assembles a chunked body. Returns the payload and the number of bytes
/// consumed, trailer section included.
fn decode_chunked(buf: &[u8], max_body: usize) -> Result<(Vec<u8>, usize), ParseError> {
    let mut body = Vec::new();
    let mut pos = 0;

    loop {
        let line_len = find_crlf(&buf[pos..]).ok_or(ParseError::Incomplete)?;
        let line = std::str::from_utf8(&buf[pos..pos + line_len]).map_err(|_| ParseError::InvalidChunk)?;
        let size_str = line.split(';').next().unwrap_or_default().trim();
        let size = usize::from_str_radix(size_str, 16).map_err(|_| ParseError::InvalidChunk)?;
        pos += line_len + 2;

        if size == 0 {
            // trailer fields are skipped up to the terminating empty line
            loop {
                let len = find_crlf(&buf[pos..]).ok_or(ParseError::Incomplete)?;
                pos += len + 2;
                if len == 0 {
                    return Ok((body, pos));
                }
            }
        }

        if body.len().saturating_add(size) > max_body {
            return Err(ParseError::BodyTooLarge);
        }
        if buf.len() < pos + size + 2 {
            return Err(ParseError::Incomplete);
        }
        body.extend_from_slice(&buf[pos..pos + size]);
        if &buf[pos + size..pos + size + 2] != b"\r\n" {
            return Err(ParseError::InvalidChunk);
        }
        pos += size + 2;
    }
}

fn find_headers_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

fn leading_crlfs(buf: &[u8]) -> usize {
    buf.chunks(2).take_while(|c| *c == b"\r\n").count() * 2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_get() {
        let req = b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n";

        let (parsed, consumed) = decode(req).unwrap();

        assert_eq!(parsed.path, "/");
        assert_eq!(parsed.headers.get("Host").unwrap(), "example.com");
        assert_eq!(consumed, req.len());
    }

    #[test]
    fn chunked_body_is_assembled() {
        let req = b"POST /up HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n\
                    5;ext=1\r\nhello\r\n6\r\n world\r\n0\r\nX-Trailer: t\r\n\r\n";

        let (parsed, consumed) = decode(req).unwrap();

        assert_eq!(parsed.body, b"hello world".to_vec());
        assert_eq!(consumed, req.len());
    }

    #[test]
    fn chunked_body_waits_for_terminator() {
        let req = b"POST /up HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n";
        assert_eq!(decode(req).unwrap_err(), ParseError::Incomplete);
    }

    #[test]
    fn bad_chunk_size() {
        let req = b"POST /up HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\nzz\r\nhello\r\n0\r\n\r\n";
        assert_eq!(decode(req).unwrap_err(), ParseError::InvalidChunk);
    }

    #[test]
    fn skips_leading_blank_lines() {
        let req = b"\r\n\r\nGET /x HTTP/1.1\r\n\r\n";
        let (parsed, consumed) = decode(req).unwrap();
        assert_eq!(parsed.path, "/x");
        assert_eq!(consumed, req.len());
    }

    #[test]
    fn header_limit() {
        let limits = Limits {
            max_header_bytes: 16,
            ..Limits::default()
        };
        let req = b"GET /a-long-path HTTP/1.1\r\nHost: x\r\n";
        assert_eq!(
            parse_http_request(req, &limits).unwrap_err(),
            ParseError::HeadersTooLarge
        );
    }

    #[test]
    fn body_limit() {
        let limits = Limits {
            max_body_bytes: 4,
            ..Limits::default()
        };
        let req = b"POST / HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello";
        let err = parse_http_request(req, &limits).unwrap_err();
        assert_eq!(err, ParseError::BodyTooLarge);
        assert_eq!(err.status(), StatusCode::PayloadTooLarge);
    }
}
