use super::transport::{ChannelTransport, DisconnectGuard};
use async_stream::stream;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, HeaderMap, HeaderName};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Extension;
use log::*;
use service::AppState;
use sse::{EventSourceHandler, Frame, HttpRequest, Session};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;

/// The handler an EventSource route dispatches to.
#[derive(Clone)]
pub struct RouteHandler(pub Arc<dyn EventSourceHandler>);

/// SSE endpoint that turns the request into a long-lived push stream.
/// The stream stays open until the handler closes it or the client goes away.
pub(crate) async fn sse_handler(
    State(app_state): State<AppState>,
    Extension(RouteHandler(handler)): Extension<RouteHandler>,
    remote: Option<ConnectInfo<SocketAddr>>,
    request: Request,
) -> Response {
    let http_request = to_http_request(&request, remote.map(|ConnectInfo(addr)| addr));
    debug!("Establishing SSE connection for {}", http_request.uri());

    let (tx, mut rx) = mpsc::unbounded_channel::<Frame>();
    let transport = Arc::new(ChannelTransport::new(tx));
    let session = Session::open(
        handler,
        http_request,
        transport,
        app_state.error_sink.clone(),
    );

    let keep_alive = app_state.config.keep_alive();
    let guard = DisconnectGuard::new(session, app_state);

    // Frames arrive from the channel; the guard reports the disconnect when
    // the body is dropped, whichever side ended it.
    let stream = stream! {
        let _guard = guard;
        while let Some(frame) = rx.recv().await {
            yield Ok::<_, Infallible>(to_event(&frame));
        }
    };

    let mut sse = Sse::new(stream);
    if let Some(every) = keep_alive {
        // Keep-alive writes are also what reveals a peer that went away.
        sse = sse.keep_alive(KeepAlive::new().interval(every).text("keep-alive"));
    }

    // Tell nginx not to buffer the stream.
    ([(HeaderName::from_static("x-accel-buffering"), "no")], sse).into_response()
}

/// Frame lines never contain `\r` or `\n`, so axum writes one `data:` record
/// per line, the same bytes the frame renders to.
fn to_event(frame: &Frame) -> Event {
    Event::default().data(frame.data())
}

/// Copy what handlers need out of the axum request. The URI is made absolute
/// so it matches the origin the browser reports for the stream.
fn to_http_request(request: &Request, remote: Option<SocketAddr>) -> HttpRequest {
    let path_and_query = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let uri = match host(request.headers()) {
        Some(host) => format!("http://{host}{path_and_query}"),
        None => path_and_query.to_string(),
    };

    let mut builder = HttpRequest::builder(uri).method(request.method().as_str());
    for (name, value) in request.headers() {
        match value.to_str() {
            Ok(value) => builder = builder.header(name.as_str(), value),
            Err(_) => trace!("Skipping non-ASCII header {name}"),
        }
    }
    if let Some(remote) = remote {
        builder = builder.remote_address(remote);
    }
    builder.build()
}

fn host(headers: &HeaderMap) -> Option<&str> {
    headers.get(header::HOST).and_then(|value| value.to_str().ok())
}
