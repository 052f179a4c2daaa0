//! Head encoder for outgoing messages.
//!
//! Renders the start line, every header in insertion order (names in canonical
//! lower case) and, for responses, one `set-cookie` line per outgoing cookie,
//! followed by the blank line that ends the head.
//!
//! A framing header is added when the message carries none: `content-length`
//! for buffered bodies, `transfer-encoding: chunked` for streamed ones.
//! Responses that never carry a body (1xx, 204, 304) go out without
//! `transfer-encoding`, and 1xx and 204 without `content-length` either.

use bytes::{BufMut, BytesMut};
use http::header::{CONTENT_LENGTH, SET_COOKIE, TRANSFER_ENCODING};
use http::{StatusCode, Version};
use tokio_util::codec::Encoder;
use tracing::error;

use crate::protocol::body::Body;
use crate::protocol::{Headers, Request, Response, SerializeError};

const INIT_HEAD_SIZE: usize = 1024;

#[derive(Debug, Default, Clone, Copy)]
pub struct HeaderEncoder;

impl Encoder<&Response> for HeaderEncoder {
    type Error = SerializeError;

    fn encode(&mut self, response: &Response, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(INIT_HEAD_SIZE);

        put_version(response.version(), dst)?;
        dst.put_u8(b' ');
        dst.put_slice(response.status().as_str().as_bytes());
        dst.put_u8(b' ');
        dst.put_slice(response.reason().as_bytes());
        dst.put_slice(b"\r\n");

        if allows_body(response.status()) {
            put_headers(response.headers(), dst);
            put_framing(response.headers(), response.body(), true, dst);
        } else {
            let keep_length = response.status() == StatusCode::NOT_MODIFIED;
            for (name, value) in response.headers().iter() {
                if name == TRANSFER_ENCODING || (name == CONTENT_LENGTH && !keep_length) {
                    continue;
                }
                put_header(name.as_str().as_bytes(), value.as_bytes(), dst);
            }
        }

        for cookie in response.cookies() {
            put_header(SET_COOKIE.as_str().as_bytes(), cookie.to_string().as_bytes(), dst);
        }

        dst.put_slice(b"\r\n");
        Ok(())
    }
}

impl Encoder<&Request> for HeaderEncoder {
    type Error = SerializeError;

    fn encode(&mut self, request: &Request, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(INIT_HEAD_SIZE);

        dst.put_slice(request.method().as_str().as_bytes());
        dst.put_u8(b' ');
        dst.put_slice(request.target().as_bytes());
        dst.put_u8(b' ');
        put_version(request.version(), dst)?;
        dst.put_slice(b"\r\n");

        put_headers(request.headers(), dst);
        put_framing(request.headers(), request.body(), false, dst);

        dst.put_slice(b"\r\n");
        Ok(())
    }
}

fn put_version(version: Version, dst: &mut BytesMut) -> Result<(), SerializeError> {
    let version = match version {
        Version::HTTP_10 => b"HTTP/1.0",
        Version::HTTP_11 => b"HTTP/1.1",
        v => {
            error!(http_version = ?v, "unsupported http version");
            return Err(SerializeError::UnsupportedVersion(v));
        }
    };
    dst.put_slice(version);
    Ok(())
}

fn put_headers(headers: &Headers, dst: &mut BytesMut) {
    for (name, value) in headers.iter() {
        put_header(name.as_str().as_bytes(), value.as_bytes(), dst);
    }
}

fn put_header(name: &[u8], value: &[u8], dst: &mut BytesMut) {
    dst.reserve(name.len() + value.len() + 4);
    dst.put_slice(name);
    dst.put_slice(b": ");
    dst.put_slice(value);
    dst.put_slice(b"\r\n");
}

fn put_framing(headers: &Headers, body: &Body, empty_needs_length: bool, dst: &mut BytesMut) {
    if headers.contains(CONTENT_LENGTH) || headers.contains(TRANSFER_ENCODING) {
        return;
    }

    match body {
        Body::Buffer(bytes) if bytes.is_empty() && !empty_needs_length => {}
        Body::Buffer(bytes) => {
            put_header(CONTENT_LENGTH.as_str().as_bytes(), bytes.len().to_string().as_bytes(), dst);
        }
        Body::Reader(_) | Body::Writer(_) => {
            put_header(TRANSFER_ENCODING.as_str().as_bytes(), b"chunked", dst);
        }
    }
}

/// 1xx, 204 and 304 responses never carry a body
pub(crate) fn allows_body(status: StatusCode) -> bool {
    !(status.is_informational() || status == StatusCode::NO_CONTENT || status == StatusCode::NOT_MODIFIED)
}
