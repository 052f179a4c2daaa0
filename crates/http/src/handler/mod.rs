//! The application side of a connection.
//!
//! A [`Responder`] turns one [`Request`] into one [`Response`], or fails with an
//! [`HttpError`]. Errors that implement
//! [`ResponseRepresentable`](crate::protocol::ResponseRepresentable) are answered
//! with their own response and keep the connection alive; anything else ends it.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::protocol::{HttpError, Request, Response};

#[async_trait]
pub trait Responder: Send + Sync {
    async fn respond(&self, request: Request) -> Result<Response, HttpError>;
}

#[async_trait]
impl<R: Responder + ?Sized> Responder for Arc<R> {
    async fn respond(&self, request: Request) -> Result<Response, HttpError> {
        (**self).respond(request).await
    }
}

#[async_trait]
impl<R: Responder + ?Sized> Responder for Box<R> {
    async fn respond(&self, request: Request) -> Result<Response, HttpError> {
        (**self).respond(request).await
    }
}

#[derive(Debug)]
pub struct ResponderFn<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> Responder for ResponderFn<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response, HttpError>> + Send,
{
    async fn respond(&self, request: Request) -> Result<Response, HttpError> {
        (self.f)(request).await
    }
}

/// Builds a [`Responder`] from an async function or closure
pub fn responder_fn<F, Fut>(f: F) -> ResponderFn<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response, HttpError>> + Send,
{
    ResponderFn { f }
}
