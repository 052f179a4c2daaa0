use std::sync::Arc;
use std::time::Duration;

use http::StatusCode;
use keel_http::handler::responder_fn;
use keel_http::protocol::{HttpError, Request, Response};
use keel_web::session::{MemorySessionStore, RequestSessionExt, SessionMiddleware};
use keel_web::{Server, init_logging};
use tracing::{Level, error};

async fn count(request: Request) -> Result<Response, HttpError> {
    let Some(session) = request.session() else {
        return Ok(Response::text(StatusCode::INTERNAL_SERVER_ERROR, "session middleware missing\r\n"));
    };

    let visits = session.get_as::<u64>("visits").unwrap_or(0) + 1;
    session.insert("visits", visits);
    Ok(Response::text(StatusCode::OK, format!("visit #{visits}\r\n")))
}

// curl -v -c cookies.txt -b cookies.txt http://127.0.0.1:3000/
#[tokio::main]
async fn main() {
    if let Err(e) = init_logging(Level::DEBUG) {
        eprintln!("can't install logging: {e}");
    }

    let store = Arc::new(MemorySessionStore::with_ttl(Duration::from_secs(15 * 60)));

    let sweeper = Arc::clone(&store);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            sweeper.purge_expired();
        }
    });

    let result = match Server::builder()
        .host("127.0.0.1")
        .port(3000)
        .middleware(SessionMiddleware::new(store))
        .responder(responder_fn(count))
        .build()
    {
        Ok(server) => server.start().await,
        Err(e) => {
            error!(cause = %e, "invalid server config");
            return;
        }
    };

    if let Err(e) = result {
        error!(cause = %e, "server stopped");
    }
}
