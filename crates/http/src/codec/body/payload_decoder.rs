use bytes::BytesMut;
use tokio_util::codec::Decoder;

use crate::codec::body::chunked_decoder::ChunkedDecoder;
use crate::codec::body::length_decoder::LengthDecoder;
use crate::protocol::{ParseError, PayloadItem, PayloadSize};

/// Decodes a request payload with the strategy its framing headers selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadDecoder {
    Length(LengthDecoder),
    Chunked(ChunkedDecoder),
    NoBody,
}

impl From<PayloadSize> for PayloadDecoder {
    fn from(size: PayloadSize) -> Self {
        match size {
            PayloadSize::Length(length) => Self::Length(LengthDecoder::new(length)),
            PayloadSize::Chunked => Self::Chunked(ChunkedDecoder::new()),
            PayloadSize::Empty => Self::NoBody,
        }
    }
}

impl Decoder for PayloadDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self {
            Self::Length(decoder) => decoder.decode(src),
            Self::Chunked(decoder) => decoder.decode(src),
            Self::NoBody => Ok(Some(PayloadItem::Eof)),
        }
    }
}
