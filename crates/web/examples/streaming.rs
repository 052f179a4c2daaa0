use std::time::Duration;

use futures::future::BoxFuture;
use http::StatusCode;
use keel_http::codec::BodyStream;
use keel_http::handler::responder_fn;
use keel_http::protocol::body::{Body, body_writer};
use keel_http::protocol::{HttpError, Request, Response, StreamError, upgrade_fn};
use keel_http::stream::{Deadline, Stream};
use keel_web::{Server, init_logging};
use tracing::{Level, error};

fn countdown<'a>(stream: &'a mut BodyStream<'_>) -> BoxFuture<'a, Result<(), StreamError>> {
    Box::pin(async move {
        for i in (1..=5).rev() {
            stream.write(format!("{i}...\r\n").as_bytes()).await?;
            stream.flush().await?;
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
        stream.write(b"liftoff\r\n").await
    })
}

fn echo(request: Request, stream: &mut Stream) -> BoxFuture<'_, Result<(), HttpError>> {
    Box::pin(async move {
        stream.write(format!("echoing for {}\r\n", request.uri()).as_bytes(), Deadline::Never).await?;
        stream.flush(Deadline::Never).await?;

        let mut buf = vec![0u8; stream.buffer_size()];
        loop {
            let read = stream.read(&mut buf, Deadline::after(Duration::from_secs(60))).await?;
            if read == 0 {
                return Ok(());
            }
            stream.write(&buf[..read], Deadline::Never).await?;
            stream.flush(Deadline::Never).await?;
        }
    })
}

async fn route(request: Request) -> Result<Response, HttpError> {
    match request.uri().path() {
        // curl -N http://127.0.0.1:3000/countdown
        "/countdown" => Ok(Response::new(StatusCode::OK).with_body(Body::writer(body_writer(countdown)))),
        // curl -N -H "Connection: Upgrade" -H "Upgrade: echo" http://127.0.0.1:3000/echo
        "/echo" => Ok(Response::new(StatusCode::SWITCHING_PROTOCOLS)
            .with_header(http::header::UPGRADE, http::HeaderValue::from_static("echo"))
            .with_header(http::header::CONNECTION, http::HeaderValue::from_static("upgrade"))
            .with_upgrade(upgrade_fn(echo))),
        _ => Ok(Response::text(StatusCode::NOT_FOUND, "404 not found\r\n")),
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = init_logging(Level::INFO) {
        eprintln!("can't install logging: {e}");
    }

    let result = match Server::builder().host("127.0.0.1").port(3000).responder(responder_fn(route)).build() {
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
