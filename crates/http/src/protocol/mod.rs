//! Core HTTP protocol types.
//!
//! The connection layer and the codecs exchange these types; responders and
//! middleware only ever see [`Request`] and [`Response`].
//!
//! - **Messages**: [`Request`] and [`Response`], with ordered [`Headers`] and
//!   [`Cookie`]s
//! - **Bodies** ([`body`]): buffered, reader backed or writer backed
//! - **Upgrades**: a [`Response`] may carry an [`Upgrade`] that takes over the
//!   stream once the response has been written
//! - **Payload framing**: [`PayloadSize`] and [`PayloadItem`] used while decoding
//! - **Errors**: [`HttpError`] at the top, with [`ParseError`], [`StreamError`]
//!   and [`SerializeError`] underneath; errors implementing
//!   [`ResponseRepresentable`] are answered with their own response

mod message;
pub use message::PayloadItem;
pub use message::PayloadSize;

mod headers;
pub use headers::Headers;

mod cookie;
pub use cookie::Cookie;
pub use cookie::SameSite;
pub use cookie::parse_cookie_header;

mod request;
pub use request::Request;

mod response;
pub use response::Response;
pub use response::Upgrade;
pub use response::UpgradeFn;
pub use response::upgrade_fn;

mod error;
pub use error::BoxError;
pub use error::HttpError;
pub use error::ParseError;
pub use error::ResponseRepresentable;
pub use error::SerializeError;
pub use error::StreamError;

pub mod body;
pub use body::Body;
