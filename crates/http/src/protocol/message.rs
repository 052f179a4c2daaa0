//! Request payload framing.

use bytes::Bytes;
use http::HeaderValue;
use http::header::{CONTENT_LENGTH, TRANSFER_ENCODING};

use crate::ensure;
use crate::protocol::{Headers, ParseError};

/// Upper bound for the buffer reserved up front for a `Content-Length` body
const MAX_PREALLOCATED_BODY: u64 = 64 * 1024;

/// One step of a decoded payload: data, or the end of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadItem {
    Chunk(Bytes),
    Eof,
}

impl PayloadItem {
    pub fn is_eof(&self) -> bool {
        matches!(self, PayloadItem::Eof)
    }

    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            PayloadItem::Chunk(bytes) => Some(bytes),
            PayloadItem::Eof => None,
        }
    }
}

/// How the body after a request head is delimited.
///
/// Requests are never close-delimited: without framing headers there is no body.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PayloadSize {
    Length(u64),
    Chunked,
    Empty,
}

impl PayloadSize {
    /// Reads the framing of a request from its `Transfer-Encoding` and
    /// `Content-Length` headers.
    ///
    /// Rejects a transfer coding list not ending in `chunked`, both headers at
    /// once, and `Content-Length` values that disagree.
    // refer: https://www.rfc-editor.org/rfc/rfc9112.html#name-message-body-length
    pub fn from_headers(headers: &Headers) -> Result<Self, ParseError> {
        match (headers.get(TRANSFER_ENCODING), headers.get(CONTENT_LENGTH)) {
            (None, None) => Ok(PayloadSize::Empty),

            (Some(te), None) => {
                ensure!(ends_with_chunked(te), ParseError::invalid_body("transfer-encoding must end with chunked"));
                Ok(PayloadSize::Chunked)
            }

            (None, Some(cl)) => {
                let length = parse_content_length(cl)?;
                ensure!(
                    headers.get_all(CONTENT_LENGTH).all(|v| v.as_bytes().trim_ascii() == cl.as_bytes().trim_ascii()),
                    ParseError::invalid_content_length("conflicting values")
                );
                Ok(if length == 0 { PayloadSize::Empty } else { PayloadSize::Length(length) })
            }

            (Some(_), Some(_)) => {
                Err(ParseError::invalid_content_length("transfer-encoding and content-length both present"))
            }
        }
    }

    pub fn is_chunked(&self) -> bool {
        matches!(self, PayloadSize::Chunked)
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, PayloadSize::Empty)
    }

    /// Bytes worth reserving before the body arrives
    pub fn preallocate(&self) -> usize {
        match self {
            PayloadSize::Length(length) => usize::try_from((*length).min(MAX_PREALLOCATED_BODY)).unwrap_or(0),
            PayloadSize::Chunked | PayloadSize::Empty => 0,
        }
    }
}

fn parse_content_length(value: &HeaderValue) -> Result<u64, ParseError> {
    let value = value.to_str().map_err(ParseError::invalid_content_length)?;
    value.trim().parse::<u64>().map_err(ParseError::invalid_content_length)
}

/// `chunked` has to be the final transfer coding
fn ends_with_chunked(value: &HeaderValue) -> bool {
    value
        .as_bytes()
        .rsplit(|b| *b == b',')
        .next()
        .is_some_and(|last| last.trim_ascii().eq_ignore_ascii_case(b"chunked"))
}
