//! End-to-end tests: a real server on an ephemeral port, read by an HTTP
//! client and decoded with `eventsource-stream`.

use anyhow::{anyhow, bail, Result};
use eventsource_stream::{Event, Eventsource};
use futures_util::stream::{BoxStream, StreamExt};
use service::{config::Config, AppState};
use sse::{BoxError, Error, ErrorSink, EventSourceConnection, EventSourceHandler};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use web::handlers::{EchoHandler, TickerHandler};
use web::router;

const TIMEOUT: Duration = Duration::from_secs(5);
const ALLOWED_ORIGIN: &str = "http://localhost:3000";

struct TestServer {
    base_url: String,
    app_state: AppState,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<std::io::Result<()>>,
}

impl TestServer {
    async fn start(handler: Arc<dyn EventSourceHandler>) -> Result<Self> {
        Self::start_with_keep_alive(handler, 0).await
    }

    async fn start_with_keep_alive(
        handler: Arc<dyn EventSourceHandler>,
        keep_alive_secs: u64,
    ) -> Result<Self> {
        let mut config = Config::default().set_event_source_path("/es");
        config.keep_alive_secs = keep_alive_secs;
        config.allowed_origins = vec![ALLOWED_ORIGIN.to_string()];
        Self::launch(handler, AppState::new(config)).await
    }

    async fn start_with_error_sink(
        handler: Arc<dyn EventSourceHandler>,
        error_sink: Arc<dyn ErrorSink>,
    ) -> Result<Self> {
        let mut config = Config::default().set_event_source_path("/es");
        config.keep_alive_secs = 0;
        Self::launch(handler, AppState::new(config).with_error_sink(error_sink)).await
    }

    async fn launch(handler: Arc<dyn EventSourceHandler>, app_state: AppState) -> Result<Self> {
        let app = router::define_routes(app_state.clone(), handler).merge(
            router::event_source_routes(
                "/ticker",
                Arc::new(TickerHandler::new(Duration::from_millis(20), None)),
                app_state.clone(),
            ),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let base_url = format!("http://{}", listener.local_addr()?);

        let (shutdown, signal) = oneshot::channel::<()>();
        let handle = tokio::spawn(web::serve(listener, app, app_state.clone(), async move {
            let _ = signal.await;
        }));

        Ok(Self {
            base_url,
            app_state,
            shutdown: Some(shutdown),
            handle,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn wait_for_open_streams(&self, expected: usize) -> Result<()> {
        let deadline = tokio::time::Instant::now() + TIMEOUT;
        while self.app_state.connections.len() != expected {
            if tokio::time::Instant::now() > deadline {
                bail!(
                    "expected {expected} open stream(s), found {}",
                    self.app_state.connections.len()
                );
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        Ok(())
    }

    async fn stop(mut self) -> Result<()> {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        tokio::time::timeout(TIMEOUT, self.handle).await???;
        Ok(())
    }
}

async fn open_stream(url: &str) -> Result<BoxStream<'static, Result<Event>>> {
    let response = reqwest::get(url).await?;
    assert_eq!(
        response.headers()["content-type"].to_str()?,
        "text/event-stream"
    );
    Ok(response
        .bytes_stream()
        .eventsource()
        .map(|event| event.map_err(|e| anyhow!("event stream error: {e:?}")))
        .boxed())
}

/// Reads until `count` events arrived or the server ended the stream.
async fn read_events(url: &str, count: usize) -> Result<Vec<Event>> {
    let mut stream = open_stream(url).await?;
    let mut events = Vec::new();

    tokio::time::timeout(TIMEOUT, async {
        while events.len() < count {
            match stream.next().await {
                Some(event) => events.push(event?),
                None => break,
            }
        }
        Ok::<_, anyhow::Error>(())
    })
    .await??;

    Ok(events)
}

fn payloads(events: &[Event]) -> Vec<&str> {
    events.iter().map(|event| event.data.as_str()).collect()
}

/// Sends its messages verbatim, optionally closes, and reports `open <uri>`
/// and `close <uri>` as the callbacks run.
struct Scripted {
    messages: Vec<&'static str>,
    close_after_open: bool,
    lifecycle: mpsc::UnboundedSender<String>,
}

impl Scripted {
    fn new(
        messages: Vec<&'static str>,
        close_after_open: bool,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<String>) {
        let (lifecycle, rx) = mpsc::unbounded_channel();
        let handler = Arc::new(Self {
            messages,
            close_after_open,
            lifecycle,
        });
        (handler, rx)
    }
}

impl EventSourceHandler for Scripted {
    fn on_open(&self, connection: &EventSourceConnection) -> Result<(), BoxError> {
        self.lifecycle
            .send(format!("open {}", connection.http_request().uri()))?;
        for message in &self.messages {
            connection.send(*message);
        }
        if self.close_after_open {
            connection.close();
        }
        Ok(())
    }

    fn on_close(&self, connection: &EventSourceConnection) -> Result<(), BoxError> {
        self.lifecycle
            .send(format!("close {}", connection.http_request().uri()))?;
        Ok(())
    }
}

async fn next_lifecycle(rx: &mut mpsc::UnboundedReceiver<String>) -> Result<String> {
    tokio::time::timeout(TIMEOUT, rx.recv())
        .await?
        .ok_or_else(|| anyhow!("handler dropped"))
}

async fn assert_sent_and_received(messages: &[&str]) -> Result<()> {
    let server = TestServer::start(Arc::new(EchoHandler::new(messages.iter().copied()))).await?;
    let url = server.url("/es/hello?echoThis=yo");

    let events = read_events(&url, messages.len()).await?;

    let expected: Vec<String> = messages.iter().map(|m| format!("{m} yo")).collect();
    assert_eq!(payloads(&events), expected);
    server.stop().await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn can_send_and_read_two_single_line_messages() -> Result<()> {
    assert_sent_and_received(&["a", "b"]).await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn can_send_and_read_three_single_line_messages() -> Result<()> {
    assert_sent_and_received(&["C", "D", "E"]).await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn can_send_and_read_one_multi_line_message() -> Result<()> {
    assert_sent_and_received(&["f\ng\nh"]).await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn handler_sees_the_stream_url_as_its_request_uri() -> Result<()> {
    let (handler, mut lifecycle) = Scripted::new(vec!["f\ng\nh"], false);
    let server = TestServer::start(handler).await?;
    let url = server.url("/es/multi?echoThis=yo");

    let events = read_events(&url, 1).await?;

    assert_eq!(payloads(&events), vec!["f\ng\nh"]);
    assert_eq!(next_lifecycle(&mut lifecycle).await?, format!("open {url}"));
    server.stop().await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn many_sends_in_on_open_arrive_in_order() -> Result<()> {
    let messages: Vec<String> = (0..200).map(|i| format!("message {i}")).collect();
    let server = TestServer::start(Arc::new(EchoHandler::new(messages.clone()))).await?;

    let events = read_events(&server.url("/es/many"), messages.len()).await?;

    let expected: Vec<String> = messages.iter().map(|m| format!("{m} ")).collect();
    assert_eq!(payloads(&events), expected);
    server.stop().await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn server_close_ends_the_stream_and_runs_on_close() -> Result<()> {
    let (handler, mut lifecycle) = Scripted::new(vec!["bye"], true);
    let server = TestServer::start(handler).await?;
    let url = server.url("/es/closing");

    // Asking for more events than are sent: the read ends with the body.
    let events = read_events(&url, 10).await?;

    assert_eq!(payloads(&events), vec!["bye"]);
    assert_eq!(next_lifecycle(&mut lifecycle).await?, format!("open {url}"));
    assert_eq!(next_lifecycle(&mut lifecycle).await?, format!("close {url}"));
    server.wait_for_open_streams(0).await?;
    server.stop().await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn client_disconnect_runs_on_close() -> Result<()> {
    let (handler, mut lifecycle) = Scripted::new(vec!["hello"], false);
    let server = TestServer::start_with_keep_alive(handler, 1).await?;
    let url = server.url("/es/leaving");

    let events = read_events(&url, 1).await?;
    assert_eq!(payloads(&events), vec!["hello"]);

    // The response was dropped by `read_events`; keep-alive writes reveal
    // the dead peer.
    assert_eq!(next_lifecycle(&mut lifecycle).await?, format!("open {url}"));
    assert_eq!(next_lifecycle(&mut lifecycle).await?, format!("close {url}"));
    server.wait_for_open_streams(0).await?;
    server.stop().await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn timer_driven_sends_go_through_the_connection_lane() -> Result<()> {
    let (handler, _lifecycle) = Scripted::new(vec![], false);
    let server = TestServer::start(handler).await?;

    let events = read_events(&server.url("/ticker/demo?limit=3"), 10).await?;

    assert_eq!(payloads(&events), vec!["tick 1", "tick 2", "tick 3"]);
    server.wait_for_open_streams(0).await?;
    server.stop().await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn merged_stream_routes_answer_cors_requests() -> Result<()> {
    let (handler, _lifecycle) = Scripted::new(vec![], true);
    let server = TestServer::start(handler).await?;
    let client = reqwest::Client::new();

    for path in ["/es/hello", "/ticker/demo?limit=1"] {
        let response = client
            .get(server.url(path))
            .header("Origin", ALLOWED_ORIGIN)
            .send()
            .await?;
        let allowed = response
            .headers()
            .get("access-control-allow-origin")
            .map(|value| value.to_str().map(str::to_string))
            .transpose()?;
        assert_eq!(allowed.as_deref(), Some(ALLOWED_ORIGIN), "{path}");
    }
    server.stop().await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shutdown_closes_open_streams() -> Result<()> {
    let (handler, mut lifecycle) = Scripted::new(vec!["first"], false);
    let server = TestServer::start(handler).await?;
    let url = server.url("/es/forever");

    let mut stream = open_stream(&url).await?;
    let first = tokio::time::timeout(TIMEOUT, stream.next())
        .await?
        .ok_or_else(|| anyhow!("stream ended before the first event"))??;
    assert_eq!(first.data, "first");
    server.wait_for_open_streams(1).await?;

    let health: serde_json::Value = reqwest::get(server.url("/health")).await?.json().await?;
    assert_eq!(health["open_streams"], 1);

    server.stop().await?;
    assert_eq!(next_lifecycle(&mut lifecycle).await?, format!("open {url}"));
    assert_eq!(next_lifecycle(&mut lifecycle).await?, format!("close {url}"));
    Ok(())
}

/// Fails in `on_open` after its first send, then keeps serving the lane.
struct FailingOpen;

impl EventSourceHandler for FailingOpen {
    fn on_open(&self, connection: &EventSourceConnection) -> Result<(), BoxError> {
        connection.send("before failure");
        let conn = connection.clone();
        connection.execute(move || {
            conn.send("after failure");
            Ok(())
        });
        Err("no such feed".into())
    }
}

#[derive(Default)]
struct RecordingSink {
    errors: Mutex<Vec<String>>,
}

impl ErrorSink for RecordingSink {
    fn report(&self, _lane: &str, error: &Error) {
        self.errors.lock().unwrap().push(error.to_string());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn handler_failure_reaches_the_error_sink_and_the_stream_survives() -> Result<()> {
    let sink = Arc::new(RecordingSink::default());
    let server = TestServer::start_with_error_sink(Arc::new(FailingOpen), sink.clone()).await?;

    let events = read_events(&server.url("/es/failing"), 2).await?;

    assert_eq!(payloads(&events), vec!["before failure", "after failure"]);
    assert_eq!(
        *sink.errors.lock().unwrap(),
        vec!["Handler error: no such feed".to_string()]
    );
    server.stop().await
}
