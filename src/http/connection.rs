use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::{timeout, timeout_at};
use tracing::{debug, error, info, warn};

use crate::app::App;
use crate::config::Config;
use crate::http::parser::{ParseError, parse_http_request};
use crate::http::request::{Method, Request};
use crate::http::response::Response;
use crate::http::writer::ResponseWriter;

pub struct Connection<S> {
    stream: S,
    peer: String,
    app: Arc<App>,
    config: Arc<Config>,
    buffer: BytesMut,
    state: ConnectionState,
    served: usize,
}

pub enum ConnectionState {
    /// Waiting for (the rest of) a request; parsing happens here too.
    AwaitingRequest,
    Dispatching(Request),
    Responding {
        response: Response,
        keep_alive: bool,
        head_only: bool,
    },
    Closed,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S, peer: impl Into<String>, app: Arc<App>, config: Arc<Config>) -> Self {
        Self {
            stream,
            peer: peer.into(),
            app,
            config,
            buffer: BytesMut::with_capacity(4096),
            state: ConnectionState::AwaitingRequest,
            served: 0,
        }
    }

    /// Number of responses written so far.
    pub fn served(&self) -> usize {
        self.served
    }

    /// Drives the connection until it closes.
    ///
    /// Idle timeouts and clean client disconnects end with `Ok`. Socket
    /// failures end with `Err`; nothing more is sent to the client.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        let result = self.drive().await;
        // best effort: the peer may already be gone
        let _ = self.stream.shutdown().await;
        debug!(peer = %self.peer, served = self.served, "connection closed");
        result
    }

    async fn drive(&mut self) -> anyhow::Result<()> {
        loop {
            let state = std::mem::replace(&mut self.state, ConnectionState::Closed);
            self.state = match state {
                ConnectionState::AwaitingRequest => self.read_request().await?,

                ConnectionState::Dispatching(req) => self.dispatch(req).await,

                ConnectionState::Responding {
                    response,
                    keep_alive,
                    head_only,
                } => {
                    self.write_response(response, keep_alive, head_only).await?;
                    self.served += 1;

                    if keep_alive {
                        ConnectionState::AwaitingRequest // go back for next request
                    } else {
                        ConnectionState::Closed
                    }
                }

                ConnectionState::Closed => break,
            };
        }

        Ok(())
    }

    /// Reads until one complete request is buffered.
    ///
    /// The idle deadline covers the whole request, not each read.
    async fn read_request(&mut self) -> anyhow::Result<ConnectionState> {
        let deadline = tokio::time::Instant::now() + self.config.idle_timeout();
        let limits = self.config.limits.clone();
        // chunk framing overhead on top of the body itself
        let max_buffered = limits.max_header_bytes + limits.max_body_bytes * 2;

        loop {
            // Try parsing whatever we already have
            match parse_http_request(&self.buffer, &limits) {
                Ok((request, consumed)) => {
                    // Remove consumed bytes
                    self.buffer.advance(consumed);
                    return Ok(ConnectionState::Dispatching(request));
                }

                Err(ParseError::Incomplete) if self.buffer.len() > max_buffered => {
                    return Ok(self.reject(ParseError::BodyTooLarge));
                }

                Err(ParseError::Incomplete) => {
                    // Need more data → fall through to read
                }

                Err(e) => return Ok(self.reject(e)),
            }

            let read = match timeout_at(deadline, self.stream.read_buf(&mut self.buffer)).await {
                Ok(read) => read,
                Err(_) => {
                    debug!(peer = %self.peer, pending = self.buffer.len(), "idle timeout");
                    return Ok(ConnectionState::Closed);
                }
            };

            if read.context("socket read failed")? == 0 {
                // Client closed connection
                if !self.buffer.is_empty() {
                    debug!(peer = %self.peer, pending = self.buffer.len(), "client closed mid-request");
                }
                return Ok(ConnectionState::Closed);
            }
        }
    }

    /// Malformed input: answer with an error status and close.
    fn reject(&mut self, err: ParseError) -> ConnectionState {
        warn!(peer = %self.peer, error = %err, "rejecting malformed request");
        self.buffer.clear();

        let status = err.status();
        ConnectionState::Responding {
            response: Response::plain(status, &format!("{} {}", status.as_u16(), err)),
            keep_alive: false,
            head_only: false,
        }
    }

    async fn dispatch(&mut self, req: Request) -> ConnectionState {
        let started = Instant::now();
        let method = req.method;
        let path = req.path.clone();
        let keep_alive = req.keep_alive();

        // handlers may block (templates, files): keep them off the I/O threads
        let app = Arc::clone(&self.app);
        let response = match tokio::task::spawn_blocking(move || app.dispatch(req)).await {
            Ok(response) => response,
            Err(e) => {
                error!(peer = %self.peer, %method, %path, error = %e, "handler panicked");
                Response::internal_error()
            }
        };

        let keep_alive = keep_alive && !response.wants_close();

        info!(
            peer = %self.peer,
            %method,
            %path,
            status = response.status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            keep_alive,
            "request"
        );

        ConnectionState::Responding {
            response,
            keep_alive,
            head_only: method == Method::HEAD,
        }
    }

    async fn write_response(
        &mut self,
        response: Response,
        keep_alive: bool,
        head_only: bool,
    ) -> anyhow::Result<()> {
        let writer = ResponseWriter::new(response, keep_alive, head_only);

        timeout(self.config.write_timeout(), writer.write_to_stream(&mut self.stream))
            .await
            .context("socket write timed out")?
            .context("socket write failed")
    }
}
