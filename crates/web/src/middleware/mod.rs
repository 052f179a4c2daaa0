//! Middleware: decorators around a [`Responder`].
//!
//! A [`Middleware`] receives the request together with the `next` responder and
//! decides whether to call it, how many times, and what to do with the request
//! before and the response after. Composing `[m0, m1, m2]` around a responder
//! `R` gives `m0(m1(m2(R)))`: the first middleware sees the request first and
//! the response last.
//!
//! Chains are built statically with [`MiddlewareExt::chain`] or dynamically
//! with [`Middlewares::builder`].

mod middleware_fn;

pub use middleware_fn::{MiddlewareFn, middleware_fn};

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use keel_http::handler::Responder;
use keel_http::protocol::{HttpError, Request, Response};

#[async_trait]
pub trait Middleware: Send + Sync {
    async fn respond(&self, request: Request, next: &dyn Responder) -> Result<Response, HttpError>;
}

#[async_trait]
impl<M: Middleware + ?Sized> Middleware for Arc<M> {
    async fn respond(&self, request: Request, next: &dyn Responder) -> Result<Response, HttpError> {
        (**self).respond(request, next).await
    }
}

#[async_trait]
impl<M: Middleware + ?Sized> Middleware for Box<M> {
    async fn respond(&self, request: Request, next: &dyn Responder) -> Result<Response, HttpError> {
        (**self).respond(request, next).await
    }
}

pub trait MiddlewareExt: Middleware {
    /// Wraps `next` with this middleware
    fn chain<R: Responder>(self, next: R) -> Chained<Self, R>
    where
        Self: Sized,
    {
        Chained { middleware: self, next }
    }
}

impl<M: Middleware + ?Sized> MiddlewareExt for M {}

/// A middleware bound to the responder it decorates
#[derive(Debug)]
pub struct Chained<M, R> {
    middleware: M,
    next: R,
}

#[async_trait]
impl<M: Middleware, R: Responder> Responder for Chained<M, R> {
    async fn respond(&self, request: Request) -> Result<Response, HttpError> {
        self.middleware.respond(request, &self.next).await
    }
}

/// An ordered, dynamically built list of middleware.
///
/// `Middlewares` is itself a [`Middleware`], so lists nest.
pub struct Middlewares {
    inner: Vec<Box<dyn Middleware>>,
}

impl Middlewares {
    pub fn builder() -> MiddlewaresBuilder {
        MiddlewaresBuilder::new()
    }

    pub fn empty() -> Self {
        Self { inner: vec![] }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Composes the list around `responder` into a single shareable responder
    pub fn chain<R: Responder + 'static>(self, responder: R) -> Arc<dyn Responder> {
        if self.inner.is_empty() {
            return Arc::new(responder);
        }
        Arc::new(Chained { middleware: self, next: responder })
    }
}

impl Default for Middlewares {
    fn default() -> Self {
        Self::empty()
    }
}

#[async_trait]
impl Middleware for Middlewares {
    async fn respond(&self, request: Request, next: &dyn Responder) -> Result<Response, HttpError> {
        Remaining { middlewares: &self.inner, next }.respond(request).await
    }
}

impl fmt::Debug for Middlewares {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Middlewares").field("len", &self.inner.len()).finish()
    }
}

/// The tail of a middleware list, seen as the `next` responder of its head
struct Remaining<'a> {
    middlewares: &'a [Box<dyn Middleware>],
    next: &'a dyn Responder,
}

#[async_trait]
impl Responder for Remaining<'_> {
    async fn respond(&self, request: Request) -> Result<Response, HttpError> {
        match self.middlewares.split_first() {
            Some((head, tail)) => head.respond(request, &Remaining { middlewares: tail, next: self.next }).await,
            None => self.next.respond(request).await,
        }
    }
}

pub struct MiddlewaresBuilder {
    inner: Vec<Box<dyn Middleware>>,
}

impl MiddlewaresBuilder {
    fn new() -> Self {
        Self { inner: vec![] }
    }

    /// Adds `middleware` as the innermost layer so far
    pub fn add_last<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.inner.push(Box::new(middleware));
        self
    }

    /// Adds `middleware` as the outermost layer so far
    pub fn add_first<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.inner.insert(0, Box::new(middleware));
        self
    }

    pub fn build(self) -> Middlewares {
        Middlewares { inner: self.inner }
    }
}

impl fmt::Debug for MiddlewaresBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewaresBuilder").field("len", &self.inner.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use http::{StatusCode, Uri};
    use keel_http::handler::responder_fn;

    use super::*;

    type Trace = Arc<Mutex<Vec<String>>>;

    struct Recorder {
        name: &'static str,
        trace: Trace,
    }

    #[async_trait]
    impl Middleware for Recorder {
        async fn respond(&self, request: Request, next: &dyn Responder) -> Result<Response, HttpError> {
            self.trace.lock().unwrap().push(format!("{}-enter", self.name));
            let response = next.respond(request).await;
            self.trace.lock().unwrap().push(format!("{}-exit", self.name));
            response
        }
    }

    fn terminal(trace: &Trace) -> impl Responder + 'static {
        let trace = Arc::clone(trace);
        responder_fn(move |_request: Request| {
            let trace = Arc::clone(&trace);
            async move {
                trace.lock().unwrap().push("R".to_owned());
                Ok(Response::new(StatusCode::OK))
            }
        })
    }

    fn recorded(trace: &Trace) -> Vec<String> {
        trace.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn dynamic_chain_is_onion_ordered() {
        let trace = Trace::default();
        let responder = Middlewares::builder()
            .add_last(Recorder { name: "B", trace: Arc::clone(&trace) })
            .add_first(Recorder { name: "A", trace: Arc::clone(&trace) })
            .build()
            .chain(terminal(&trace));

        responder.respond(Request::get(Uri::from_static("/"))).await.unwrap();

        assert_eq!(recorded(&trace), vec!["A-enter", "B-enter", "R", "B-exit", "A-exit"]);
    }

    #[tokio::test]
    async fn static_chain_is_onion_ordered() {
        let trace = Trace::default();
        let inner = Recorder { name: "B", trace: Arc::clone(&trace) }.chain(terminal(&trace));
        let responder = Recorder { name: "A", trace: Arc::clone(&trace) }.chain(inner);

        responder.respond(Request::get(Uri::from_static("/"))).await.unwrap();

        assert_eq!(recorded(&trace), vec!["A-enter", "B-enter", "R", "B-exit", "A-exit"]);
    }

    #[tokio::test]
    async fn middleware_may_short_circuit() {
        let trace = Trace::default();
        let deny = middleware_fn(|_request: Request, _next: &dyn Responder| {
            Box::pin(async { Ok::<_, HttpError>(Response::new(StatusCode::FORBIDDEN)) })
        });
        let responder = Middlewares::builder().add_last(deny).build().chain(terminal(&trace));

        let response = responder.respond(Request::get(Uri::from_static("/"))).await.unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(recorded(&trace).is_empty());
    }

    #[tokio::test]
    async fn empty_list_is_the_responder() {
        let trace = Trace::default();
        let responder = Middlewares::empty().chain(terminal(&trace));

        let response = responder.respond(Request::get(Uri::from_static("/"))).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(recorded(&trace), vec!["R"]);
    }
}
