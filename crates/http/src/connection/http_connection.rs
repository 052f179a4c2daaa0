use std::time::Duration;

use http::header::CONNECTION;
use http::{HeaderValue, StatusCode};
use tracing::{debug, trace};

use crate::codec::{RequestParser, ResponseSerializer};
use crate::handler::Responder;
use crate::protocol::{HttpError, Request, Response};
use crate::stream::{Deadline, Stream};

/// Serves HTTP/1.x requests arriving on one [`Stream`].
///
/// Each loop iteration reads up to `buffer_size` bytes, parses every request
/// they complete and answers them in arrival order. The loop ends when:
///
/// - the peer closes its side (a read of zero bytes)
/// - a request is not keep-alive
/// - a response hands the stream to an [`Upgrade`](crate::protocol::Upgrade)
/// - the peer is gone (broken pipe, reset, early end of input)
/// - an error that can't be rendered as a response occurs; it is answered with
///   a `500`, the stream is closed and the error is returned
pub struct HttpConnection {
    stream: Stream,
    parser: RequestParser,
    serializer: ResponseSerializer,
}

enum Next {
    KeepAlive,
    Close,
    Upgraded(Result<(), HttpError>),
}

enum Recovery {
    Continue,
    Done(Result<(), HttpError>),
}

impl HttpConnection {
    pub fn new(stream: Stream) -> Self {
        Self { stream, parser: RequestParser::new(), serializer: ResponseSerializer }
    }

    /// Runs the connection until it closes.
    ///
    /// `read_timeout` bounds every read, `serialize_timeout` bounds the writes of
    /// one response. Returns `Err` only for an error the connection could not
    /// recover from, and at most once.
    pub async fn process(
        mut self,
        responder: &dyn Responder,
        read_timeout: Duration,
        serialize_timeout: Duration,
    ) -> Result<(), HttpError> {
        let mut buf = vec![0u8; self.stream.buffer_size()];

        loop {
            let read = match self.stream.read(&mut buf, Deadline::after(read_timeout)).await {
                Ok(n) => n,
                Err(e) => return self.recover(e.into()).await.into_result(),
            };

            let requests = match self.parser.parse(&buf[..read]) {
                Ok(requests) => requests,
                Err(e) => return self.recover(e.into()).await.into_result(),
            };

            trace!(read, requests = requests.len(), "parsed requests");

            for request in requests {
                match self.serve(request, responder, serialize_timeout).await {
                    Ok(Next::KeepAlive) => {}
                    Ok(Next::Close) => {
                        debug!("request is not keep-alive, close connection");
                        self.stream.close().await;
                        return Ok(());
                    }
                    Ok(Next::Upgraded(result)) => {
                        debug!("upgrade finished, close connection");
                        self.stream.close().await;
                        return match result {
                            Err(e) if !e.is_peer_gone() => Err(e),
                            _ => Ok(()),
                        };
                    }
                    Err(e) => match self.recover(e).await {
                        Recovery::Continue => {}
                        Recovery::Done(result) => return result,
                    },
                }
            }

            if read == 0 {
                debug!("peer closed the connection");
                self.stream.close().await;
                return Ok(());
            }
        }
    }

    async fn serve(
        &mut self,
        request: Request,
        responder: &dyn Responder,
        serialize_timeout: Duration,
    ) -> Result<Next, HttpError> {
        let keep_alive = request.is_keep_alive();
        let head = request.clone_head();

        let mut response = responder.respond(request).await?;
        let upgrade = response.take_upgrade();

        self.serializer.serialize(response, &mut self.stream, Deadline::after(serialize_timeout)).await?;

        if let Some(upgrade) = upgrade {
            debug!(uri = %head.uri(), "hand stream over to upgrade");
            return Ok(Next::Upgraded(upgrade.upgrade(head, &mut self.stream).await));
        }

        Ok(if keep_alive { Next::KeepAlive } else { Next::Close })
    }

    async fn recover(&mut self, error: HttpError) -> Recovery {
        if self.stream.is_closed() || error.is_peer_gone() {
            debug!(cause = %error, "peer is gone, stop serving");
            self.stream.close().await;
            return Recovery::Done(Ok(()));
        }

        if let Some(representable) = error.as_representable() {
            let response = representable.response();
            debug!(cause = %error, status = %response.status(), "answer with error response");

            return match self.serializer.serialize(response, &mut self.stream, Deadline::Never).await {
                Ok(()) => Recovery::Continue,
                Err(e) => {
                    debug!(cause = %e, "can't write error response");
                    self.stream.close().await;
                    Recovery::Done(Err(error))
                }
            };
        }

        let response = Response::text(StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
            .with_header(CONNECTION, HeaderValue::from_static("close"));
        if let Err(e) = self.serializer.serialize(response, &mut self.stream, Deadline::Never).await {
            debug!(cause = %e, "can't write internal error response");
        }
        self.stream.close().await;
        Recovery::Done(Err(error))
    }
}

impl Recovery {
    fn into_result(self) -> Result<(), HttpError> {
        match self {
            Recovery::Continue => Ok(()),
            Recovery::Done(result) => result,
        }
    }
}

impl std::fmt::Debug for HttpConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpConnection").field("stream", &self.stream).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use indoc::indoc;
    use thiserror::Error;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, duplex};

    use super::*;
    use crate::handler::responder_fn;
    use crate::protocol::body::{Body, body_writer};
    use crate::protocol::{ResponseRepresentable, StreamError, upgrade_fn};

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[derive(Debug, Error)]
    #[error("teapot")]
    struct Teapot;

    impl ResponseRepresentable for Teapot {
        fn response(&self) -> Response {
            Response::text(StatusCode::IM_A_TEAPOT, "short and stout")
        }
    }

    async fn route(request: Request) -> Result<Response, HttpError> {
        match request.uri().path() {
            "/teapot" => Err(HttpError::representable(Teapot)),
            "/boom" => Err(HttpError::responder("boom")),
            "/gone" => Err(StreamError::io(io::Error::from(io::ErrorKind::BrokenPipe)).into()),
            path => Ok(Response::text(StatusCode::OK, path)),
        }
    }

    async fn run(input: &str, responder: &dyn Responder) -> (String, Result<(), HttpError>) {
        let (mut client, server) = duplex(64 * 1024);
        client.write_all(input.replace('\n', "\r\n").as_bytes()).await.unwrap();
        client.shutdown().await.unwrap();

        let result = HttpConnection::new(Stream::new(server)).process(responder, TIMEOUT, TIMEOUT).await;

        let mut output = String::new();
        client.read_to_string(&mut output).await.unwrap();
        (output, result)
    }

    fn statuses(output: &str) -> Vec<&str> {
        output.lines().filter(|line| line.starts_with("HTTP/")).collect()
    }

    #[tokio::test]
    async fn keep_alive_responses_in_order() {
        let input = indoc! {"
        GET /first HTTP/1.1

        GET /second HTTP/1.1

        GET /third HTTP/1.1

        "};

        let (output, result) = run(input, &responder_fn(route)).await;

        assert!(result.is_ok());
        let first = output.find("/first").unwrap();
        let second = output.find("/second").unwrap();
        let third = output.find("/third").unwrap();
        assert!(first < second && second < third);
        assert_eq!(statuses(&output).len(), 3);
    }

    #[tokio::test]
    async fn http_1_0_closes_after_one_response() {
        let input = indoc! {"
        GET /first HTTP/1.0

        GET /second HTTP/1.0

        "};

        let (output, result) = run(input, &responder_fn(route)).await;

        assert!(result.is_ok());
        assert_eq!(statuses(&output), vec!["HTTP/1.1 200 OK"]);
        assert!(!output.contains("/second"));
    }

    #[tokio::test]
    async fn connection_close_is_honoured() {
        let input = indoc! {"
        GET /first HTTP/1.1
        Connection: close

        GET /second HTTP/1.1

        "};

        let (output, _) = run(input, &responder_fn(route)).await;
        assert_eq!(statuses(&output).len(), 1);
    }

    #[tokio::test]
    async fn representable_error_keeps_connection() {
        let input = indoc! {"
        GET /teapot HTTP/1.1

        GET /after HTTP/1.1

        "};

        let (output, result) = run(input, &responder_fn(route)).await;

        assert!(result.is_ok());
        assert_eq!(statuses(&output), vec!["HTTP/1.1 418 I'm a teapot", "HTTP/1.1 200 OK"]);
        assert!(output.contains("short and stout"));
        assert!(output.contains("/after"));
    }

    #[tokio::test]
    async fn unrepresentable_error_is_500_and_fatal() {
        let input = indoc! {"
        GET /boom HTTP/1.1

        GET /after HTTP/1.1

        "};

        let (output, result) = run(input, &responder_fn(route)).await;

        assert!(matches!(result, Err(HttpError::ResponderError { .. })));
        assert_eq!(statuses(&output), vec!["HTTP/1.1 500 Internal Server Error"]);
        assert!(output.contains("responder error: boom"));
        assert!(!output.contains("/after"));
    }

    #[tokio::test]
    async fn peer_gone_ends_silently() {
        let input = indoc! {"
        GET /gone HTTP/1.1

        "};

        let (output, result) = run(input, &responder_fn(route)).await;

        assert!(result.is_ok());
        assert!(output.is_empty());
    }

    #[tokio::test]
    async fn write_after_body_close_is_fatal() {
        let responder = responder_fn(|_request: Request| async {
            let writer = body_writer(|body| {
                Box::pin(async move {
                    body.write(b"abc").await?;
                    body.close();
                    body.write(b"lost").await
                })
            });
            Ok::<_, HttpError>(Response::new(StatusCode::OK).with_body(Body::writer(writer)))
        });

        let (output, result) = run("GET /stream HTTP/1.1\n\n", &responder).await;

        let e = result.unwrap_err();
        assert!(matches!(e, HttpError::ResponseError { .. }));
        assert!(!e.is_peer_gone());
        assert!(statuses(&output).contains(&"HTTP/1.1 500 Internal Server Error"));
        assert!(output.contains("4 bytes not sent"));
    }

    #[tokio::test]
    async fn malformed_request_is_fatal() {
        let (output, result) = run("BROKEN\n\n\n\n\n\n\n\n\n\n", &responder_fn(route)).await;

        assert!(matches!(result, Err(HttpError::RequestError { .. })));
        assert_eq!(statuses(&output), vec!["HTTP/1.1 500 Internal Server Error"]);
    }

    #[tokio::test]
    async fn upgrade_takes_over_the_stream() {
        let responder = responder_fn(|_request: Request| async {
            let upgrade = upgrade_fn(|request: Request, stream: &mut Stream| {
                Box::pin(async move {
                    stream.write(b"raw:", Deadline::Never).await?;
                    stream.write(request.uri().path().as_bytes(), Deadline::Never).await?;
                    stream.flush(Deadline::Never).await?;
                    Ok::<_, HttpError>(())
                })
            });
            Ok(Response::new(StatusCode::SWITCHING_PROTOCOLS).with_upgrade(upgrade))
        });

        let input = indoc! {"
        GET /socket HTTP/1.1
        Upgrade: raw

        GET /ignored HTTP/1.1

        "};

        let (output, result) = run(input, &responder).await;

        assert!(result.is_ok());
        assert_eq!(output, "HTTP/1.1 101 Switching Protocols\r\n\r\nraw:/socket");
    }

    #[tokio::test(start_paused = true)]
    async fn read_timeout_is_fatal() {
        let (_client, server) = duplex(1024);
        let responder = responder_fn(route);

        let result = HttpConnection::new(Stream::new(server))
            .process(&responder, Duration::from_millis(50), TIMEOUT)
            .await;

        let e = result.unwrap_err();
        assert!(e.is_timeout());
    }

    #[tokio::test]
    async fn request_body_reaches_responder() {
        let responder = responder_fn(|request: Request| async move {
            let body = request.body().as_bytes().cloned().unwrap_or_default();
            Ok(Response::text(StatusCode::OK, format!("got {} bytes", body.len())))
        });

        let input = "POST /upload HTTP/1.1\nTransfer-Encoding: chunked\n\n3\nabc\n2\nde\n0\n\n";
        let (output, result) = run(input, &responder).await;

        assert!(result.is_ok());
        assert!(output.ends_with("got 5 bytes"));
    }
}
