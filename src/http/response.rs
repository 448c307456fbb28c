use std::fmt;

use bytes::Bytes;
use serde::Serialize;

use crate::http::headers::Headers;
use crate::http::request::Method;
use crate::template::Render;

/// HTTP status codes.
///
/// The common codes have named variants; anything else in 100..=599 is
/// carried by `Other`. Use [`StatusCode::from_u16`] to get the named variant
/// where one exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// 200 OK
    Ok,
    /// 201 Created
    Created,
    /// 202 Accepted
    Accepted,
    /// 204 No Content
    NoContent,
    /// 301 Moved Permanently
    MovedPermanently,
    /// 302 Found
    Found,
    /// 303 See Other
    SeeOther,
    /// 304 Not Modified
    NotModified,
    /// 307 Temporary Redirect
    TemporaryRedirect,
    /// 308 Permanent Redirect
    PermanentRedirect,
    /// 400 Bad Request
    BadRequest,
    /// 401 Unauthorized
    Unauthorized,
    /// 403 Forbidden
    Forbidden,
    /// 404 Not Found
    NotFound,
    /// 405 Method Not Allowed
    MethodNotAllowed,
    /// 408 Request Timeout
    RequestTimeout,
    /// 413 Payload Too Large
    PayloadTooLarge,
    /// 429 Too Many Requests
    TooManyRequests,
    /// 431 Request Header Fields Too Large
    RequestHeaderFieldsTooLarge,
    /// 500 Internal Server Error
    InternalServerError,
    /// 503 Service Unavailable
    ServiceUnavailable,
    /// Any other code in 100..=599
    Other(u16),
}

const NAMED: [StatusCode; 21] = [
    StatusCode::Ok,
    StatusCode::Created,
    StatusCode::Accepted,
    StatusCode::NoContent,
    StatusCode::MovedPermanently,
    StatusCode::Found,
    StatusCode::SeeOther,
    StatusCode::NotModified,
    StatusCode::TemporaryRedirect,
    StatusCode::PermanentRedirect,
    StatusCode::BadRequest,
    StatusCode::Unauthorized,
    StatusCode::Forbidden,
    StatusCode::NotFound,
    StatusCode::MethodNotAllowed,
    StatusCode::RequestTimeout,
    StatusCode::PayloadTooLarge,
    StatusCode::TooManyRequests,
    StatusCode::RequestHeaderFieldsTooLarge,
    StatusCode::InternalServerError,
    StatusCode::ServiceUnavailable,
];

impl StatusCode {
    /// Maps a numeric code, preferring the named variant. `None` outside
    /// 100..=599.
    pub fn from_u16(code: u16) -> Option<Self> {
        if !(100..=599).contains(&code) {
            return None;
        }
        Some(
            NAMED
                .iter()
                .copied()
                .find(|s| s.as_u16() == code)
                .unwrap_or(StatusCode::Other(code)),
        )
    }

    /// Returns the numeric HTTP status code.
    ///
    /// # Example
    ///
    /// ```
    /// # use live_rocket::http::response::StatusCode;
    /// assert_eq!(StatusCode::Ok.as_u16(), 200);
    /// assert_eq!(StatusCode::NotFound.as_u16(), 404);
    /// ```
    pub fn as_u16(&self) -> u16 {
        match self {
            StatusCode::Ok => 200,
            StatusCode::Created => 201,
            StatusCode::Accepted => 202,
            StatusCode::NoContent => 204,
            StatusCode::MovedPermanently => 301,
            StatusCode::Found => 302,
            StatusCode::SeeOther => 303,
            StatusCode::NotModified => 304,
            StatusCode::TemporaryRedirect => 307,
            StatusCode::PermanentRedirect => 308,
            StatusCode::BadRequest => 400,
            StatusCode::Unauthorized => 401,
            StatusCode::Forbidden => 403,
            StatusCode::NotFound => 404,
            StatusCode::MethodNotAllowed => 405,
            StatusCode::RequestTimeout => 408,
            StatusCode::PayloadTooLarge => 413,
            StatusCode::TooManyRequests => 429,
            StatusCode::RequestHeaderFieldsTooLarge => 431,
            StatusCode::InternalServerError => 500,
            StatusCode::ServiceUnavailable => 503,
            StatusCode::Other(code) => *code,
        }
    }

    /// Returns the standard HTTP reason phrase for this status code.
    ///
    /// # Example
    ///
    /// ```
    /// # use live_rocket::http::response::StatusCode;
    /// assert_eq!(StatusCode::Ok.reason_phrase(), "OK");
    /// assert_eq!(StatusCode::NotFound.reason_phrase(), "Not Found");
    /// ```
    pub fn reason_phrase(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::Created => "Created",
            StatusCode::Accepted => "Accepted",
            StatusCode::NoContent => "No Content",
            StatusCode::MovedPermanently => "Moved Permanently",
            StatusCode::Found => "Found",
            StatusCode::SeeOther => "See Other",
            StatusCode::NotModified => "Not Modified",
            StatusCode::TemporaryRedirect => "Temporary Redirect",
            StatusCode::PermanentRedirect => "Permanent Redirect",
            StatusCode::BadRequest => "Bad Request",
            StatusCode::Unauthorized => "Unauthorized",
            StatusCode::Forbidden => "Forbidden",
            StatusCode::NotFound => "Not Found",
            StatusCode::MethodNotAllowed => "Method Not Allowed",
            StatusCode::RequestTimeout => "Request Timeout",
            StatusCode::PayloadTooLarge => "Payload Too Large",
            StatusCode::TooManyRequests => "Too Many Requests",
            StatusCode::RequestHeaderFieldsTooLarge => "Request Header Fields Too Large",
            StatusCode::InternalServerError => "Internal Server Error",
            StatusCode::ServiceUnavailable => "Service Unavailable",
            StatusCode::Other(code) => match code / 100 {
                1 => "Informational",
                2 => "Success",
                3 => "Redirection",
                4 => "Client Error",
                _ => "Server Error",
            },
        }
    }

    /// Statuses that never carry a message body.
    pub fn forbids_body(&self) -> bool {
        let code = self.as_u16();
        code < 200 || code == 204 || code == 304
    }
}

/// Lazily produced body chunks, sent with chunked transfer encoding.
pub type ChunkStream = Box<dyn Iterator<Item = Bytes> + Send>;

pub enum Body {
    Full(Bytes),
    Stream(ChunkStream),
}

impl Body {
    pub fn empty() -> Self {
        Body::Full(Bytes::new())
    }

    /// The bytes of a fixed body; `None` for a stream.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Body::Full(b) => Some(b),
            Body::Stream(_) => None,
        }
    }

    pub fn is_stream(&self) -> bool {
        matches!(self, Body::Stream(_))
    }
}

impl Default for Body {
    fn default() -> Self {
        Body::empty()
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Full(b) => f.debug_tuple("Full").field(&b.len()).finish(),
            Body::Stream(_) => f.write_str("Stream"),
        }
    }
}

/// A redirect whose target is a named route, resolved after the handler
/// chain has run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRedirect {
    pub name: String,
    pub params: Vec<(String, String)>,
    pub permanent: bool,
}

/// HTTP response under construction by handlers and middleware.
///
/// Framing headers (`Content-Length`, `Transfer-Encoding`, `Date`,
/// `Connection`) are added by the writer when absent, so handlers only set
/// what they care about.
#[derive(Debug)]
pub struct Response {
    /// The HTTP status code
    pub status: StatusCode,
    /// HTTP headers in insertion order
    pub headers: Headers,
    /// Response body
    pub body: Body,
    reason: Option<String>,
    pub(crate) route_redirect: Option<RouteRedirect>,
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for constructing HTTP responses in a fluent style.
///
/// # Example
///
/// ```ignore
/// let response = ResponseBuilder::new(StatusCode::Ok)
///     .header("Content-Type", "application/json")
///     .body(b"{}".to_vec())
///     .build();
/// ```
pub struct ResponseBuilder {
    status: StatusCode,
    headers: Headers,
    body: Body,
}

impl ResponseBuilder {
    /// Creates a new response builder with the specified status code.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: Body::empty(),
        }
    }

    /// Appends a header; repeated names are kept.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(key, value);
        self
    }

    /// Sets the response body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Body::Full(body.into());
        self
    }

    /// Sets a streamed body.
    pub fn stream<I>(mut self, chunks: I) -> Self
    where
        I: Iterator<Item = Bytes> + Send + 'static,
    {
        self.body = Body::Stream(Box::new(chunks));
        self
    }

    pub fn build(self) -> Response {
        Response {
            status: self.status,
            headers: self.headers,
            body: self.body,
            reason: None,
            route_redirect: None,
        }
    }
}

impl Response {
    /// Empty 200 OK.
    pub fn new() -> Self {
        ResponseBuilder::new(StatusCode::Ok).build()
    }

    /// Creates a simple 200 OK response with the given body.
    pub fn ok(body: impl Into<Bytes>) -> Self {
        ResponseBuilder::new(StatusCode::Ok).body(body).build()
    }

    /// Creates a 404 Not Found response.
    pub fn not_found() -> Self {
        Self::plain(StatusCode::NotFound, "404 Not Found")
    }

    /// 405 with an `Allow` header listing `allowed`.
    pub fn method_not_allowed(allowed: &[Method]) -> Self {
        let allow = allowed
            .iter()
            .map(Method::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        let mut response = Self::plain(StatusCode::MethodNotAllowed, "405 Method Not Allowed");
        response.headers.insert("Allow", allow);
        response
    }

    pub fn bad_request() -> Self {
        Self::plain(StatusCode::BadRequest, "400 Bad Request")
    }

    /// Creates a 500 Internal Server Error response.
    pub fn internal_error() -> Self {
        Self::plain(StatusCode::InternalServerError, "500 Internal Server Error")
    }

    pub fn plain(status: StatusCode, text: &str) -> Self {
        ResponseBuilder::new(status)
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(text.to_string())
            .build()
    }

    /// Reason phrase for the status line: the custom one if set, otherwise
    /// the standard phrase.
    pub fn reason(&self) -> &str {
        self.reason
            .as_deref()
            .unwrap_or_else(|| self.status.reason_phrase())
    }

    /// Sets the status and drops any custom reason phrase.
    pub fn set_status(&mut self, status: StatusCode) -> &mut Self {
        self.status = status;
        self.reason = None;
        self
    }

    pub fn set_reason(&mut self, reason: impl Into<String>) -> &mut Self {
        self.reason = Some(reason.into());
        self
    }

    /// Replaces any existing values of `key`.
    pub fn set_header(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.headers.insert(key, value);
        self
    }

    pub fn append_header(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.headers.append(key, value);
        self
    }

    /// Replaces the body. A pending [`redirect_to_route`](Self::redirect_to_route)
    /// is dropped: the last write wins.
    pub fn set_body(&mut self, body: impl Into<Bytes>) -> &mut Self {
        self.route_redirect = None;
        self.body = Body::Full(body.into());
        self
    }

    /// Streams `chunks` with chunked transfer encoding. The iterator is
    /// pulled while the response is being written.
    pub fn set_stream<I>(&mut self, chunks: I) -> &mut Self
    where
        I: Iterator<Item = Bytes> + Send + 'static,
    {
        self.route_redirect = None;
        self.body = Body::Stream(Box::new(chunks));
        self
    }

    /// Bytes of a fixed body.
    pub fn body_bytes(&self) -> Option<&[u8]> {
        self.body.as_bytes()
    }

    /// 200 with a `text/plain` body.
    pub fn send(&mut self, text: impl Into<String>) -> &mut Self {
        self.set_status(StatusCode::Ok)
            .set_header("Content-Type", "text/plain; charset=utf-8")
            .set_body(text.into())
    }

    pub fn html(&mut self, html: impl Into<String>) -> &mut Self {
        self.set_header("Content-Type", "text/html; charset=utf-8")
            .set_body(html.into())
    }

    pub fn json<T: Serialize + ?Sized>(&mut self, value: &T) -> anyhow::Result<&mut Self> {
        let body = serde_json::to_vec(value)?;
        Ok(self
            .set_header("Content-Type", "application/json")
            .set_body(body))
    }

    /// Renders `template` through `renderer` into an HTML body.
    ///
    /// Renderer failures are returned to the caller; inside a handler, `?`
    /// turns them into a 500.
    pub fn render(
        &mut self,
        renderer: &dyn Render,
        template: &str,
        context: &serde_json::Value,
    ) -> anyhow::Result<&mut Self> {
        let bytes = renderer.render(template, context)?;
        Ok(self
            .set_header("Content-Type", "text/html; charset=utf-8")
            .set_body(bytes))
    }

    /// 301 (`permanent`) or 302 to a literal location.
    pub fn redirect(&mut self, location: impl Into<String>, permanent: bool) -> &mut Self {
        let location = location.into();
        let status = if permanent {
            StatusCode::MovedPermanently
        } else {
            StatusCode::Found
        };
        self.set_body(format!("Redirecting to {}", location));
        self.set_status(status)
            .set_header("Content-Type", "text/plain; charset=utf-8")
            .set_header("Location", location)
    }

    /// Redirects to the route registered as `name`; the location is filled
    /// in by reverse lookup once the handler chain returns. An unknown name
    /// or missing parameter turns the response into a 500.
    pub fn redirect_to_route<K, V>(
        &mut self,
        name: &str,
        params: impl IntoIterator<Item = (K, V)>,
        permanent: bool,
    ) -> &mut Self
    where
        K: Into<String>,
        V: ToString,
    {
        let status = if permanent {
            StatusCode::MovedPermanently
        } else {
            StatusCode::Found
        };
        self.route_redirect = Some(RouteRedirect {
            name: name.to_string(),
            params: params
                .into_iter()
                .map(|(k, v)| (k.into(), v.to_string()))
                .collect(),
            permanent,
        });
        self.set_status(status)
    }

    pub fn pending_redirect(&self) -> Option<&RouteRedirect> {
        self.route_redirect.as_ref()
    }

    /// True if the response itself asks for the connection to be closed.
    pub fn wants_close(&self) -> bool {
        self.headers.has_token("Connection", "close")
    }
}
