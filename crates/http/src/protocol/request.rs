//! HTTP request message.

use http::header::{CONNECTION, COOKIE};
use http::{Extensions, HeaderName, HeaderValue, Method, Uri, Version};

use crate::protocol::body::Body;
use crate::protocol::cookie::{parse_cookie_header, Cookie};
use crate::protocol::Headers;

/// An HTTP request: start line, ordered headers, cookies and a body.
///
/// Cookies are parsed from the `Cookie` headers when the request is decoded (or
/// built through [`Request::from_parts`]); they form a set keyed by name.
/// Middleware attach per-request state, such as a session, through
/// [`Request::extensions_mut`].
#[derive(Debug)]
pub struct Request {
    method: Method,
    uri: Uri,
    version: Version,
    headers: Headers,
    cookies: Vec<Cookie>,
    body: Body,
    extensions: Extensions,
}

impl Request {
    pub fn new(method: Method, uri: Uri) -> Self {
        Self::from_parts(method, uri, Version::HTTP_11, Headers::new(), Body::empty())
    }

    pub fn from_parts(method: Method, uri: Uri, version: Version, headers: Headers, body: Body) -> Self {
        let mut request =
            Self { method, uri, version, headers, cookies: vec![], body, extensions: Extensions::new() };
        request.reload_cookies();
        request
    }

    pub fn get(uri: Uri) -> Self {
        Self::new(Method::GET, uri)
    }

    pub fn with_version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    /// Appends a header; `Cookie` headers also feed the cookie set
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        let is_cookie = name == COOKIE;
        self.headers.append(name, value);
        if is_cookie {
            self.reload_cookies();
        }
        self
    }

    pub fn with_body<B: Into<Body>>(mut self, body: B) -> Self {
        self.body = body.into();
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// The request target as sent on the start line
    pub fn target(&self) -> &str {
        self.uri.path_and_query().map_or_else(|| self.uri.path(), |p| p.as_str())
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut Body {
        &mut self.body
    }

    /// Takes the body out, leaving an empty buffer behind
    pub fn take_body(&mut self) -> Body {
        std::mem::take(&mut self.body)
    }

    pub fn cookies(&self) -> &[Cookie] {
        &self.cookies
    }

    pub fn cookie(&self, name: &str) -> Option<&Cookie> {
        self.cookies.iter().find(|c| c.name() == name)
    }

    /// Adds a cookie, replacing any cookie with the same name
    pub fn insert_cookie(&mut self, cookie: Cookie) {
        match self.cookies.iter_mut().find(|c| c.name() == cookie.name()) {
            Some(existing) => *existing = cookie,
            None => self.cookies.push(cookie),
        }
    }

    /// A copy of the start line, headers and cookies, with an empty body and no extensions
    pub fn clone_head(&self) -> Request {
        Self {
            method: self.method.clone(),
            uri: self.uri.clone(),
            version: self.version,
            headers: self.headers.clone(),
            cookies: self.cookies.clone(),
            body: Body::empty(),
            extensions: Extensions::new(),
        }
    }

    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    /// Whether the connection may serve another request after this one.
    ///
    /// HTTP/1.0 needs an explicit `Connection: keep-alive`, HTTP/1.1 keeps the
    /// connection unless it sees `Connection: close`.
    pub fn is_keep_alive(&self) -> bool {
        match self.version {
            Version::HTTP_10 => self.headers.contains_token(CONNECTION, "keep-alive"),
            _ => !self.headers.contains_token(CONNECTION, "close"),
        }
    }

    fn reload_cookies(&mut self) {
        let parsed: Vec<Cookie> = self.headers.get_all(COOKIE).flat_map(parse_cookie_header).collect();
        self.cookies.clear();
        for cookie in parsed {
            self.insert_cookie(cookie);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keep_alive_by_version() {
        let request = Request::get(Uri::from_static("/"));
        assert!(request.is_keep_alive());

        let request = Request::get(Uri::from_static("/")).with_header(CONNECTION, HeaderValue::from_static("close"));
        assert!(!request.is_keep_alive());

        let request = Request::get(Uri::from_static("/")).with_version(Version::HTTP_10);
        assert!(!request.is_keep_alive());

        let request = Request::get(Uri::from_static("/"))
            .with_version(Version::HTTP_10)
            .with_header(CONNECTION, HeaderValue::from_static("Keep-Alive"));
        assert!(request.is_keep_alive());
    }

    #[test]
    fn cookies_from_every_cookie_header() {
        let request = Request::get(Uri::from_static("/"))
            .with_header(COOKIE, HeaderValue::from_static("a=1; b=2"))
            .with_header(COOKIE, HeaderValue::from_static("a=3"));

        assert_eq!(request.cookies().len(), 2);
        assert_eq!(request.cookie("a").map(Cookie::value), Some("3"));
        assert_eq!(request.cookie("b").map(Cookie::value), Some("2"));
    }

    #[test]
    fn target_keeps_query() {
        let request = Request::get(Uri::from_static("/index?a=1&b=2"));
        assert_eq!(request.target(), "/index?a=1&b=2");

        let request = Request::get(Uri::from_static("http://example.com"));
        assert_eq!(request.target(), "/");
    }
}
