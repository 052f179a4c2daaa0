//! HTTP response message and protocol upgrade hand-off.

use std::borrow::Cow;
use std::fmt;
use std::fmt::{Debug, Formatter};

use async_trait::async_trait;
use futures::future::BoxFuture;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE, TRANSFER_ENCODING};
use http::{HeaderName, HeaderValue, StatusCode, Version};

use crate::protocol::body::Body;
use crate::protocol::cookie::Cookie;
use crate::protocol::{Headers, HttpError, Request};
use crate::stream::Stream;

/// Takes over the raw transport once a response has been sent.
///
/// The connection writes the response head (and body), then calls
/// [`Upgrade::upgrade`] with the request that triggered it. When the handler
/// returns the connection is closed and its loop ends, no further HTTP requests
/// are read from the stream.
#[async_trait]
pub trait Upgrade: Send {
    async fn upgrade(self: Box<Self>, request: Request, stream: &mut Stream) -> Result<(), HttpError>;
}

pub struct UpgradeFn<F> {
    f: F,
}

#[async_trait]
impl<F> Upgrade for UpgradeFn<F>
where
    F: for<'a> FnOnce(Request, &'a mut Stream) -> BoxFuture<'a, Result<(), HttpError>> + Send,
{
    async fn upgrade(self: Box<Self>, request: Request, stream: &mut Stream) -> Result<(), HttpError> {
        (self.f)(request, stream).await
    }
}

pub fn upgrade_fn<F>(f: F) -> UpgradeFn<F>
where
    F: for<'a> FnOnce(Request, &'a mut Stream) -> BoxFuture<'a, Result<(), HttpError>> + Send,
{
    UpgradeFn { f }
}

pub struct Response {
    status: StatusCode,
    reason: Option<Cow<'static, str>>,
    version: Version,
    headers: Headers,
    cookies: Vec<Cookie>,
    body: Body,
    upgrade: Option<Box<dyn Upgrade>>,
}

impl Response {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            reason: None,
            version: Version::HTTP_11,
            headers: Headers::new(),
            cookies: vec![],
            body: Body::empty(),
            upgrade: None,
        }
    }

    /// A `text/plain` response with a matching `Content-Length`
    pub fn text<S: Into<String>>(status: StatusCode, text: S) -> Self {
        let mut response = Self::new(status);
        if let Ok(content_type) = HeaderValue::from_str(mime::TEXT_PLAIN_UTF_8.as_ref()) {
            response.headers.append(CONTENT_TYPE, content_type);
        }
        response.set_body(text.into());
        response
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    /// The reason phrase: an explicit one if set, else the canonical phrase
    pub fn reason(&self) -> &str {
        match &self.reason {
            Some(reason) => reason,
            None => self.status.canonical_reason().unwrap_or("Unknown"),
        }
    }

    pub fn set_reason<R: Into<Cow<'static, str>>>(&mut self, reason: R) {
        self.reason = Some(reason.into());
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Outgoing cookies, each written as its own `Set-Cookie` line
    pub fn cookies(&self) -> &[Cookie] {
        &self.cookies
    }

    pub fn add_cookie(&mut self, cookie: Cookie) {
        self.cookies.push(cookie);
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    /// Replaces the body and sets the framing header that goes with it.
    ///
    /// Buffers get `Content-Length`, streamed bodies get
    /// `Transfer-Encoding: chunked`; the other framing header is removed.
    pub fn set_body<B: Into<Body>>(&mut self, body: B) {
        let body = body.into();
        match &body {
            Body::Buffer(bytes) => {
                self.headers.remove(TRANSFER_ENCODING);
                self.headers.insert(CONTENT_LENGTH, HeaderValue::from(bytes.len()));
            }
            Body::Reader(_) | Body::Writer(_) => {
                self.headers.remove(CONTENT_LENGTH);
                self.headers.insert(TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
            }
        }
        self.body = body;
    }

    /// Sets the body without touching any header
    pub fn set_raw_body<B: Into<Body>>(&mut self, body: B) {
        self.body = body.into();
    }

    pub fn with_body<B: Into<Body>>(mut self, body: B) -> Self {
        self.set_body(body);
        self
    }

    pub fn with_upgrade<U: Upgrade + 'static>(mut self, upgrade: U) -> Self {
        self.upgrade = Some(Box::new(upgrade));
        self
    }

    pub fn has_upgrade(&self) -> bool {
        self.upgrade.is_some()
    }

    /// Splits the response into the part that is serialized and the upgrade handler
    pub fn take_upgrade(&mut self) -> Option<Box<dyn Upgrade>> {
        self.upgrade.take()
    }

    pub(crate) fn take_body(&mut self) -> Body {
        std::mem::take(&mut self.body)
    }
}

impl Debug for Response {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("reason", &self.reason())
            .field("version", &self.version)
            .field("headers", &self.headers)
            .field("cookies", &self.cookies)
            .field("body", &self.body)
            .field("upgrade", &self.upgrade.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    #[test]
    fn text_sets_length() {
        let response = Response::text(StatusCode::OK, "hello");
        assert_eq!(response.headers().get(CONTENT_LENGTH), Some(&HeaderValue::from_static("5")));
        assert_eq!(response.body().as_bytes(), Some(&Bytes::from_static(b"hello")));
        assert_eq!(response.reason(), "OK");
    }

    #[test]
    fn streamed_body_switches_framing() {
        let mut response = Response::text(StatusCode::OK, "hello");
        response.set_body(Body::reader(&b"streamed"[..]));

        assert!(!response.headers().contains(CONTENT_LENGTH));
        assert_eq!(response.headers().get(TRANSFER_ENCODING), Some(&HeaderValue::from_static("chunked")));
    }

    #[test]
    fn custom_reason_phrase() {
        let mut response = Response::new(StatusCode::from_u16(599).unwrap());
        assert_eq!(response.reason(), "Unknown");
        response.set_reason("Network Timeout");
        assert_eq!(response.reason(), "Network Timeout");
    }
}
