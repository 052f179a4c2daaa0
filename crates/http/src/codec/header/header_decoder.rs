//! Request head decoder.
//!
//! Parses the start line and header section with `httparse`, then builds a
//! [`Request`] whose header values are slices of the frozen head buffer, so no
//! header bytes are copied. The framing headers decide the [`PayloadSize`] of
//! the body that follows.
//!
//! # Limits
//!
//! - Maximum number of headers: 64
//! - Maximum header section size: 8KB
//! - HTTP/1.0 and HTTP/1.1 only

use bytes::BytesMut;
use http::{HeaderName, HeaderValue, Method, Uri, Version};
use httparse::Status;
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::ensure;
use crate::protocol::body::Body;
use crate::protocol::{Headers, ParseError, PayloadSize, Request};

pub(crate) const MAX_HEADER_NUM: usize = 64;

pub(crate) const MAX_HEADER_BYTES: usize = 8 * 1024;

/// Shortest possible request head: `GET / HTTP/1.1\r\n\r\n`
const MIN_HEAD_BYTES: usize = 18;

/// Decodes a request head into a body-less [`Request`] and the size of its payload.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeaderDecoder;

impl Decoder for HeaderDecoder {
    type Item = (Request, PayloadSize);
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < MIN_HEAD_BYTES {
            return Ok(None);
        }

        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADER_NUM];
        let mut req = httparse::Request::new(&mut headers);

        let status = req.parse(src).map_err(|e| match e {
            httparse::Error::TooManyHeaders => ParseError::too_many_headers(MAX_HEADER_NUM),
            e => ParseError::invalid_header(e),
        })?;

        let head_len = match status {
            Status::Complete(head_len) => head_len,
            Status::Partial => {
                ensure!(src.len() <= MAX_HEADER_BYTES, ParseError::too_large_header(src.len(), MAX_HEADER_BYTES));
                return Ok(None);
            }
        };

        trace!(head_len, "parsed request head");
        ensure!(head_len <= MAX_HEADER_BYTES, ParseError::too_large_header(head_len, MAX_HEADER_BYTES));

        let version = match req.version {
            Some(0) => Version::HTTP_10,
            Some(1) => Version::HTTP_11,
            v => return Err(ParseError::InvalidVersion(v)),
        };

        let method = req
            .method
            .and_then(|m| Method::from_bytes(m.as_bytes()).ok())
            .ok_or(ParseError::InvalidMethod)?;
        let uri = req.path.and_then(|p| p.parse::<Uri>().ok()).ok_or(ParseError::InvalidUri)?;

        let base = src.as_ptr() as usize;
        let ranges: Vec<_> = req
            .headers
            .iter()
            .map(|h| {
                let name = h.name.as_ptr() as usize - base;
                let value = h.value.as_ptr() as usize - base;
                ((name, name + h.name.len()), (value, value + h.value.len()))
            })
            .collect();

        let head = src.split_to(head_len).freeze();
        let mut header_map = Headers::with_capacity(ranges.len());
        for ((name_start, name_end), (value_start, value_end)) in ranges {
            let name = HeaderName::from_bytes(&head[name_start..name_end]).map_err(ParseError::invalid_header)?;
            let value =
                HeaderValue::from_maybe_shared(head.slice(value_start..value_end)).map_err(ParseError::invalid_header)?;
            header_map.append(name, value);
        }

        let payload_size = PayloadSize::from_headers(&header_map)?;
        let request = Request::from_parts(method, uri, version, header_map, Body::empty());
        Ok(Some((request, payload_size)))
    }
}
