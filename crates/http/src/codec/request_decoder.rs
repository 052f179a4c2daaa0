//! Incremental request decoding.
//!
//! [`RequestDecoder`] is a [`Decoder`] yielding complete [`Request`]s: it parses
//! a head with [`HeaderDecoder`], then collects the payload its framing headers
//! announce into a [`Body::Buffer`]. [`RequestParser`] owns the read buffer and
//! turns each batch of received bytes into the requests it completes.

use std::mem;

use bytes::BytesMut;
use tokio_util::codec::Decoder;
use tracing::debug;

use crate::codec::body::PayloadDecoder;
use crate::codec::header::HeaderDecoder;
use crate::protocol::body::Body;
use crate::protocol::{ParseError, PayloadItem, Request};

#[derive(Debug, Default)]
pub struct RequestDecoder {
    header_decoder: HeaderDecoder,
    state: DecodeState,
}

#[derive(Debug, Default)]
enum DecodeState {
    #[default]
    Head,
    Payload { request: Request, decoder: PayloadDecoder, body: BytesMut },
}

impl RequestDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a request has been started but not completed
    pub fn is_partial(&self) -> bool {
        matches!(self.state, DecodeState::Payload { .. })
    }

    pub fn reset(&mut self) {
        self.state = DecodeState::Head;
    }
}

impl Decoder for RequestDecoder {
    type Item = Request;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match mem::take(&mut self.state) {
                DecodeState::Head => {
                    let Some((request, payload_size)) = self.header_decoder.decode(src)? else {
                        return Ok(None);
                    };
                    if payload_size.is_empty() {
                        return Ok(Some(request));
                    }
                    let body = BytesMut::with_capacity(payload_size.preallocate());
                    self.state = DecodeState::Payload { request, decoder: PayloadDecoder::from(payload_size), body };
                }

                DecodeState::Payload { request, mut decoder, mut body } => match decoder.decode(src)? {
                    Some(PayloadItem::Chunk(bytes)) => {
                        body.extend_from_slice(&bytes);
                        self.state = DecodeState::Payload { request, decoder, body };
                    }
                    Some(PayloadItem::Eof) => {
                        return Ok(Some(request.with_body(Body::Buffer(body.freeze()))));
                    }
                    None => {
                        self.state = DecodeState::Payload { request, decoder, body };
                        return Ok(None);
                    }
                },
            }
        }
    }
}

/// Turns raw bytes into requests.
///
/// Bytes are buffered across calls, so a request split over several reads is
/// returned by the call that completes it, and one read carrying several
/// pipelined requests returns all of them in order.
#[derive(Debug, Default)]
pub struct RequestParser {
    decoder: RequestDecoder,
    buffer: BytesMut,
}

impl RequestParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds `bytes` and returns every request completed by them.
    ///
    /// An empty slice signals end of input: a partially received request can
    /// never complete and is dropped.
    pub fn parse(&mut self, bytes: &[u8]) -> Result<Vec<Request>, ParseError> {
        if bytes.is_empty() {
            if !self.buffer.is_empty() || self.decoder.is_partial() {
                debug!(buffered = self.buffer.len(), "end of input, dropping incomplete request");
            }
            self.buffer.clear();
            self.decoder.reset();
            return Ok(vec![]);
        }

        self.buffer.extend_from_slice(bytes);

        let mut requests = vec![];
        while let Some(request) = self.decoder.decode(&mut self.buffer)? {
            requests.push(request);
        }
        Ok(requests)
    }
}

#[cfg(test)]
mod tests {
    use http::header::HOST;
    use http::{HeaderValue, Method};
    use indoc::indoc;

    use super::*;

    fn body_of(request: &Request) -> &[u8] {
        request.body().as_bytes().map(|b| &b[..]).unwrap_or_default()
    }

    #[test]
    fn pipelined_requests_in_order() {
        let wire = indoc! {"
        GET /first HTTP/1.1
        Host: a

        POST /second HTTP/1.1
        Content-Length: 5

        helloGET /third HTTP/1.1

        "}
        .replace('\n', "\r\n");

        let requests = RequestParser::new().parse(wire.as_bytes()).unwrap();

        let paths: Vec<_> = requests.iter().map(|r| r.uri().path()).collect();
        assert_eq!(paths, vec!["/first", "/second", "/third"]);
        assert_eq!(requests[0].headers().get(HOST), Some(&HeaderValue::from_static("a")));
        assert_eq!(requests[1].method(), &Method::POST);
        assert_eq!(body_of(&requests[1]), b"hello");
    }

    #[test]
    fn request_split_across_reads() {
        let mut parser = RequestParser::new();

        assert!(parser.parse(b"POST /upload HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n3\r\nab").unwrap().is_empty());
        assert!(parser.parse(b"c\r\n2\r\nde\r\n").unwrap().is_empty());

        let requests = parser.parse(b"0\r\n\r\n").unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(body_of(&requests[0]), b"abcde");
    }

    #[test]
    fn end_of_input_drops_partial_request() {
        let mut parser = RequestParser::new();

        assert!(parser.parse(b"POST / HTTP/1.1\r\nContent-Length: 10\r\n\r\nabc").unwrap().is_empty());
        assert!(parser.parse(&[]).unwrap().is_empty());

        let requests = parser.parse(b"GET / HTTP/1.1\r\n\r\n").unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method(), &Method::GET);
    }

    #[test]
    fn malformed_head_is_an_error() {
        let result = RequestParser::new().parse(b"NOT A REQUEST\r\n\r\n\r\n\r\n");
        assert!(result.is_err());
    }

    #[test]
    fn cookies_are_parsed() {
        let requests = RequestParser::new()
            .parse(b"GET / HTTP/1.1\r\nCookie: keel-session=abc; theme=dark\r\n\r\n")
            .unwrap();

        assert_eq!(requests[0].cookie("theme").map(|c| c.value()), Some("dark"));
    }
}
