use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use keel_http::handler::Responder;
use keel_http::protocol::{HttpError, Request, Response};
use tracing::debug;

use crate::middleware::Middleware;
use crate::session::{DEFAULT_SESSION_TTL, MemorySessionStore, Session, SessionConfig, SessionStore};

/// Attaches a [`Session`] to every request passing through.
///
/// A request whose session cookie names a live session gets that session and
/// its response passes through untouched. Any other request gets a new session,
/// registered in the store before `next` runs, and its response carries exactly
/// one `Set-Cookie` with the new token. When `next` fails, the new session is
/// dropped from the store again: its token never reached the client.
pub struct SessionMiddleware {
    store: Arc<dyn SessionStore>,
    config: SessionConfig,
}

impl SessionMiddleware {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self::with_config(store, SessionConfig::default())
    }

    pub fn with_config(store: Arc<dyn SessionStore>, config: SessionConfig) -> Self {
        Self { store, config }
    }

    /// A middleware over a fresh [`MemorySessionStore`] forgetting sessions
    /// idle for longer than [`DEFAULT_SESSION_TTL`]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemorySessionStore::with_ttl(DEFAULT_SESSION_TTL)))
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Forgets the session under `token`; its next request starts a new one
    pub fn invalidate(&self, token: &str) -> bool {
        self.store.remove(token).is_some()
    }

    fn lookup(&self, request: &Request) -> Option<Arc<Session>> {
        let cookie = request.cookie(self.config.cookie_name())?;
        self.store.get(cookie.value())
    }
}

#[async_trait]
impl Middleware for SessionMiddleware {
    async fn respond(&self, mut request: Request, next: &dyn Responder) -> Result<Response, HttpError> {
        if let Some(session) = self.lookup(&request) {
            request.extensions_mut().insert(session);
            return next.respond(request).await;
        }

        let session = Arc::new(Session::generate());
        debug!(path = request.uri().path(), "start new session");
        self.store.insert(Arc::clone(&session));
        request.extensions_mut().insert(Arc::clone(&session));

        match next.respond(request).await {
            Ok(mut response) => {
                response.add_cookie(self.config.cookie(session.token()));
                Ok(response)
            }
            Err(e) => {
                self.store.remove(session.token());
                Err(e)
            }
        }
    }
}

impl fmt::Debug for SessionMiddleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionMiddleware").field("config", &self.config).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use http::header::COOKIE;
    use http::{HeaderValue, StatusCode, Uri};
    use keel_http::handler::responder_fn;
    use tokio::time::advance;

    use super::*;
    use crate::middleware::MiddlewareExt;
    use crate::session::RequestSessionExt;

    async fn count_visits(request: Request) -> Result<Response, HttpError> {
        let Some(session) = request.session() else {
            return Ok(Response::text(StatusCode::INTERNAL_SERVER_ERROR, "no session"));
        };
        let visits = session.get_as::<u64>("visits").unwrap_or(0) + 1;
        session.insert("visits", visits);
        Ok(Response::text(StatusCode::OK, format!("{}:{visits}", session.token())))
    }

    fn with_cookie(cookie: &str) -> Request {
        Request::get(Uri::from_static("/")).with_header(COOKIE, HeaderValue::from_str(cookie).unwrap())
    }

    fn body(response: &Response) -> String {
        String::from_utf8(response.body().as_bytes().unwrap().to_vec()).unwrap()
    }

    #[tokio::test]
    async fn new_session_sets_one_cookie() {
        let responder = SessionMiddleware::in_memory().chain(responder_fn(count_visits));

        let response = responder.respond(Request::get(Uri::from_static("/"))).await.unwrap();

        assert_eq!(response.cookies().len(), 1);
        let cookie = &response.cookies()[0];
        assert_eq!(cookie.name(), "keel-session");
        assert_eq!(body(&response), format!("{}:1", cookie.value()));
    }

    #[tokio::test]
    async fn known_session_is_reused() {
        let responder = SessionMiddleware::in_memory().chain(responder_fn(count_visits));

        let first = responder.respond(Request::get(Uri::from_static("/"))).await.unwrap();
        let token = first.cookies()[0].value().to_owned();

        let second = responder.respond(with_cookie(&format!("other=1; keel-session={token}"))).await.unwrap();

        assert!(second.cookies().is_empty());
        assert_eq!(body(&second), format!("{token}:2"));
    }

    #[tokio::test]
    async fn unknown_token_starts_over() {
        let responder = SessionMiddleware::in_memory().chain(responder_fn(count_visits));

        let response = responder.respond(with_cookie("keel-session=forged")).await.unwrap();

        assert_eq!(response.cookies().len(), 1);
        assert_ne!(response.cookies()[0].value(), "forged");
        assert!(body(&response).ends_with(":1"));
    }

    #[tokio::test]
    async fn invalidated_session_starts_over() {
        let middleware = Arc::new(SessionMiddleware::in_memory());
        let responder = Arc::clone(&middleware).chain(responder_fn(count_visits));

        let first = responder.respond(Request::get(Uri::from_static("/"))).await.unwrap();
        let token = first.cookies()[0].value().to_owned();

        assert!(middleware.invalidate(&token));
        assert!(!middleware.invalidate(&token));

        let second = responder.respond(with_cookie(&format!("keel-session={token}"))).await.unwrap();
        assert_eq!(second.cookies().len(), 1);
        assert_ne!(second.cookies()[0].value(), token);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_session_starts_over() {
        let store = Arc::new(MemorySessionStore::with_ttl(Duration::from_secs(60)));
        let responder = SessionMiddleware::new(store).chain(responder_fn(count_visits));

        let first = responder.respond(Request::get(Uri::from_static("/"))).await.unwrap();
        let token = first.cookies()[0].value().to_owned();

        advance(Duration::from_secs(61)).await;

        let second = responder.respond(with_cookie(&format!("keel-session={token}"))).await.unwrap();
        assert_eq!(second.cookies().len(), 1);
        assert!(body(&second).ends_with(":1"));
    }

    #[tokio::test]
    async fn failed_first_request_leaves_no_session() {
        let store = Arc::new(MemorySessionStore::new());
        let failing = responder_fn(|_request: Request| async { Err::<Response, _>(HttpError::responder("boom")) });
        let responder = SessionMiddleware::new(Arc::clone(&store) as Arc<dyn SessionStore>).chain(failing);

        for _ in 0..3 {
            assert!(responder.respond(Request::get(Uri::from_static("/"))).await.is_err());
        }

        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn in_memory_sessions_expire() {
        let responder = SessionMiddleware::in_memory().chain(responder_fn(count_visits));

        let first = responder.respond(Request::get(Uri::from_static("/"))).await.unwrap();
        let token = first.cookies()[0].value().to_owned();

        advance(DEFAULT_SESSION_TTL + Duration::from_secs(1)).await;

        let second = responder.respond(with_cookie(&format!("keel-session={token}"))).await.unwrap();
        assert_eq!(second.cookies().len(), 1);
        assert_ne!(second.cookies()[0].value(), token);
    }

    #[tokio::test]
    async fn configured_cookie_name() {
        let config = SessionConfig::builder().cookie_name("sid").build();
        let responder = SessionMiddleware::with_config(Arc::new(MemorySessionStore::new()), config)
            .chain(responder_fn(count_visits));

        let first = responder.respond(Request::get(Uri::from_static("/"))).await.unwrap();
        let token = first.cookies()[0].value().to_owned();
        assert_eq!(first.cookies()[0].name(), "sid");

        let second = responder.respond(with_cookie(&format!("sid={token}"))).await.unwrap();
        assert!(second.cookies().is_empty());
    }
}
