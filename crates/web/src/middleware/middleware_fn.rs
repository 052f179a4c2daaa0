use async_trait::async_trait;
use futures::future::BoxFuture;
use keel_http::handler::Responder;
use keel_http::protocol::{HttpError, Request, Response};

use crate::middleware::Middleware;

#[derive(Copy, Clone, Debug)]
pub struct MiddlewareFn<F> {
    f: F,
}

/// Builds a [`Middleware`] from a closure returning a boxed future.
///
/// The future borrows `next`, hence the explicit [`BoxFuture`]:
///
/// ```
/// use keel_http::handler::Responder;
/// use keel_http::protocol::{HttpError, Request};
/// use keel_web::middleware::middleware_fn;
///
/// let log_path = middleware_fn(|request: Request, next: &dyn Responder| {
///     Box::pin(async move {
///         let path = request.uri().path().to_owned();
///         let response = next.respond(request).await?;
///         println!("{path} -> {}", response.status());
///         Ok::<_, HttpError>(response)
///     })
/// });
/// # let _ = log_path;
/// ```
pub fn middleware_fn<F>(f: F) -> MiddlewareFn<F>
where
    F: for<'a> Fn(Request, &'a dyn Responder) -> BoxFuture<'a, Result<Response, HttpError>> + Send + Sync,
{
    MiddlewareFn { f }
}

#[async_trait]
impl<F> Middleware for MiddlewareFn<F>
where
    F: for<'a> Fn(Request, &'a dyn Responder) -> BoxFuture<'a, Result<Response, HttpError>> + Send + Sync,
{
    async fn respond(&self, request: Request, next: &dyn Responder) -> Result<Response, HttpError> {
        (self.f)(request, next).await
    }
}
