use std::time::SystemTime;

use anyhow::Context;
use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::http::response::{Body, ChunkStream, Response};

const HTTP_VERSION: &str = "HTTP/1.1";

/// How the body is framed on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Framing {
    Length(usize),
    Chunked,
    None,
}

fn framing(resp: &Response) -> Framing {
    if resp.status.forbids_body() {
        return Framing::None;
    }
    match &resp.body {
        Body::Full(b) => Framing::Length(b.len()),
        Body::Stream(_) => Framing::Chunked,
    }
}

/// Headers owned by the writer.
const COMPUTED: [&str; 3] = ["Content-Length", "Transfer-Encoding", "Connection"];

/// Serializes the status line and headers, blank line included.
///
/// Caller-set headers keep their order. Framing (`Content-Length` or
/// `Transfer-Encoding: chunked`) and `Connection` always come from the body
/// and the negotiated `keep_alive`; caller values for them are dropped.
/// `Date` is appended unless the caller set one.
pub fn encode_head(resp: &Response, keep_alive: bool) -> Vec<u8> {
    let mut buf = Vec::with_capacity(256);

    // Status line
    let status_line = format!(
        "{} {} {}\r\n",
        HTTP_VERSION,
        resp.status.as_u16(),
        resp.reason()
    );
    buf.extend_from_slice(status_line.as_bytes());

    let framing = framing(resp);

    // Headers
    for (k, v) in resp.headers.iter() {
        if COMPUTED.iter().any(|name| k.eq_ignore_ascii_case(name)) {
            continue;
        }
        push_header(&mut buf, k, v);
    }

    match framing {
        Framing::Length(len) => push_header(&mut buf, "Content-Length", &len.to_string()),
        Framing::Chunked => push_header(&mut buf, "Transfer-Encoding", "chunked"),
        Framing::None => {}
    }
    if !resp.headers.contains("Date") {
        push_header(&mut buf, "Date", &httpdate::fmt_http_date(SystemTime::now()));
    }
    push_header(
        &mut buf,
        "Connection",
        if keep_alive { "keep-alive" } else { "close" },
    );

    // Header/body separator
    buf.extend_from_slice(b"\r\n");

    buf
}

fn push_header(buf: &mut Vec<u8>, key: &str, value: &str) {
    buf.extend_from_slice(key.as_bytes());
    buf.extend_from_slice(b": ");
    buf.extend_from_slice(value.as_bytes());
    buf.extend_from_slice(b"\r\n");
}

/// One chunk of a chunked body. Empty input yields nothing, since an empty
/// chunk would end the body.
pub fn encode_chunk(data: &[u8]) -> Vec<u8> {
    if data.is_empty() {
        return Vec::new();
    }
    let mut buf = format!("{:X}\r\n", data.len()).into_bytes();
    buf.extend_from_slice(data);
    buf.extend_from_slice(b"\r\n");
    buf
}

const LAST_CHUNK: &[u8] = b"0\r\n\r\n";

/// Chunks produced ahead of the socket.
const STREAM_BUFFER: usize = 8;

/// Encodes a whole response, draining a streamed body.
pub fn serialize_response(resp: Response, keep_alive: bool) -> Vec<u8> {
    let mut buf = encode_head(&resp, keep_alive);
    match (framing(&resp), resp.body) {
        (Framing::Length(_), Body::Full(bytes)) => buf.extend_from_slice(&bytes),
        (Framing::Chunked, Body::Stream(chunks)) => {
            for chunk in chunks {
                buf.extend_from_slice(&encode_chunk(&chunk));
            }
            buf.extend_from_slice(LAST_CHUNK);
        }
        _ => {}
    }
    buf
}

enum Pending {
    Full(Bytes),
    Chunks(ChunkStream),
    Nothing,
}

/// Writes one response to a stream.
///
/// The head is encoded up front; a streamed body is pulled chunk by chunk
/// while writing.
pub struct ResponseWriter {
    head: Vec<u8>,
    body: Pending,
}

impl ResponseWriter {
    /// `head_only` drops the body bytes (HEAD requests) while keeping the
    /// framing headers the body would have had.
    pub fn new(response: Response, keep_alive: bool, head_only: bool) -> Self {
        let head = encode_head(&response, keep_alive);
        let body = match (framing(&response), response.body) {
            _ if head_only => Pending::Nothing,
            (Framing::Length(_), Body::Full(bytes)) => Pending::Full(bytes),
            (Framing::Chunked, Body::Stream(chunks)) => Pending::Chunks(chunks),
            _ => Pending::Nothing,
        };
        Self { head, body }
    }

    pub async fn write_to_stream<W>(self, stream: &mut W) -> anyhow::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        stream.write_all(&self.head).await?;

        match self.body {
            Pending::Full(bytes) => stream.write_all(&bytes).await?,
            Pending::Chunks(chunks) => {
                // the iterator may block; it runs on a blocking worker
                let (tx, mut rx) = mpsc::channel::<Bytes>(STREAM_BUFFER);
                let producer = tokio::task::spawn_blocking(move || {
                    for chunk in chunks {
                        if tx.blocking_send(chunk).is_err() {
                            break; // writer gave up
                        }
                    }
                });

                while let Some(chunk) = rx.recv().await {
                    if chunk.is_empty() {
                        continue;
                    }
                    stream.write_all(&encode_chunk(&chunk)).await?;
                }
                producer.await.context("response body stream panicked")?;
                stream.write_all(LAST_CHUNK).await?;
            }
            Pending::Nothing => {}
        }

        stream.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::response::{ResponseBuilder, StatusCode};

    fn text(bytes: &[u8]) -> String {
        String::from_utf8_lossy(bytes).into_owned()
    }

    #[test]
    fn computed_headers_follow_caller_headers() {
        let resp = ResponseBuilder::new(StatusCode::Ok)
            .header("X-First", "1")
            .header("Content-Type", "text/plain")
            .body("hi")
            .build();

        let out = text(&serialize_response(resp, true));
        let lines: Vec<&str> = out.split("\r\n").collect();

        assert_eq!(lines[0], "HTTP/1.1 200 OK");
        assert_eq!(lines[1], "X-First: 1");
        assert_eq!(lines[2], "Content-Type: text/plain");
        assert_eq!(lines[3], "Content-Length: 2");
        assert!(lines[4].starts_with("Date: "));
        assert_eq!(lines[5], "Connection: keep-alive");
        assert!(out.ends_with("\r\n\r\nhi"));
    }

    #[test]
    fn stream_is_chunked() {
        let resp = ResponseBuilder::new(StatusCode::Ok)
            .header("Content-Length", "999")
            .stream(vec![Bytes::from("ab"), Bytes::new(), Bytes::from("cde")].into_iter())
            .build();

        let out = text(&serialize_response(resp, false));

        assert!(!out.contains("Content-Length"));
        assert!(out.contains("Transfer-Encoding: chunked\r\n"));
        assert!(out.contains("Connection: close\r\n"));
        assert!(out.ends_with("\r\n\r\n2\r\nab\r\n3\r\ncde\r\n0\r\n\r\n"));
    }

    #[test]
    fn no_content_has_no_length() {
        let resp = ResponseBuilder::new(StatusCode::NoContent).body("ignored").build();
        let out = text(&serialize_response(resp, true));

        assert!(out.starts_with("HTTP/1.1 204 No Content\r\n"));
        assert!(!out.contains("Content-Length"));
        assert!(out.ends_with("\r\n\r\n"));
    }

    #[test]
    fn custom_reason_phrase() {
        let mut resp = Response::new();
        resp.set_status(StatusCode::from_u16(299).unwrap())
            .set_reason("Fine Enough");
        let out = text(&serialize_response(resp, true));
        assert!(out.starts_with("HTTP/1.1 299 Fine Enough\r\n"));
    }

    #[test]
    fn connection_follows_negotiated_state() {
        let resp = ResponseBuilder::new(StatusCode::Ok)
            .header("Connection", "keep-alive")
            .body("x")
            .build();
        let out = text(&serialize_response(resp, false));

        assert_eq!(out.matches("Connection:").count(), 1);
        assert!(out.contains("Connection: close\r\n"));
    }

    #[test]
    fn caller_framing_headers_are_replaced() {
        let resp = ResponseBuilder::new(StatusCode::Ok)
            .header("Transfer-Encoding", "chunked")
            .header("Content-Length", "99")
            .body("abc")
            .build();
        let out = text(&serialize_response(resp, true));

        assert!(!out.contains("Transfer-Encoding"));
        assert_eq!(out.matches("Content-Length:").count(), 1);
        assert!(out.contains("Content-Length: 3\r\n"));
        assert!(out.ends_with("\r\n\r\nabc"));

        let resp = ResponseBuilder::new(StatusCode::NotModified)
            .header("Content-Length", "5")
            .header("Transfer-Encoding", "chunked")
            .build();
        let out = text(&serialize_response(resp, true));

        assert!(!out.contains("Content-Length"));
        assert!(!out.contains("Transfer-Encoding"));
        assert!(out.ends_with("\r\n\r\n"));
    }

    #[tokio::test]
    async fn stream_is_written_through_channel() {
        let chunks = (0..20).map(|i| Bytes::from(format!("{:02}", i)));
        let resp = ResponseBuilder::new(StatusCode::Ok).stream(chunks).build();

        let mut out = Vec::new();
        ResponseWriter::new(resp, true, false)
            .write_to_stream(&mut out)
            .await
            .unwrap();
        let out = text(&out);

        assert!(out.contains("2\r\n00\r\n2\r\n01\r\n"));
        assert!(out.ends_with("2\r\n19\r\n0\r\n\r\n"));
    }

    #[tokio::test]
    async fn head_only_keeps_length_drops_body() {
        let resp = Response::ok("twelve bytes");
        let writer = ResponseWriter::new(resp, true, true);

        let mut out = Vec::new();
        writer.write_to_stream(&mut out).await.unwrap();
        let out = text(&out);

        assert!(out.contains("Content-Length: 12\r\n"));
        assert!(out.ends_with("\r\n\r\n"));
    }
}
