use http::StatusCode;
use keel_http::handler::{Responder, responder_fn};
use keel_http::protocol::{HttpError, Request, Response};
use keel_web::middleware::middleware_fn;
use keel_web::{Server, init_logging};
use tracing::{Level, error, info};

async fn hello_world(_request: Request) -> Result<Response, HttpError> {
    Ok(Response::text(StatusCode::OK, "hello world\r\n"))
}

// curl -v http://127.0.0.1:3000/
#[tokio::main]
async fn main() {
    if let Err(e) = init_logging(Level::INFO) {
        eprintln!("can't install logging: {e}");
    }

    let access_log = middleware_fn(|request: Request, next: &dyn Responder| {
        Box::pin(async move {
            let (method, path) = (request.method().clone(), request.uri().path().to_owned());
            let response = next.respond(request).await?;
            info!(%method, %path, status = %response.status(), "served");
            Ok::<_, HttpError>(response)
        })
    });

    let server = match Server::builder()
        .host("127.0.0.1")
        .port(3000)
        .middleware(access_log)
        .responder(responder_fn(hello_world))
        .build()
    {
        Ok(server) => server,
        Err(e) => {
            error!(cause = %e, "invalid server config");
            return;
        }
    };

    if let Err(e) = server.start().await {
        error!(cause = %e, "server stopped");
    }
}
