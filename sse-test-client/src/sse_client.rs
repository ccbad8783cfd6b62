use anyhow::Result;
use eventsource_client::{self as es, Client};
use futures_util::stream::StreamExt;
use log::*;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub struct Event {
    pub event_type: String,
    pub data: String,
}

pub struct Connection {
    pub label: String,
    pub url: String,
    event_rx: mpsc::UnboundedReceiver<Event>,
    _handle: tokio::task::JoinHandle<()>,
}

impl Connection {
    /// Open a stream against `url`. Reconnection is disabled so a stream the
    /// server closes stays closed.
    pub fn establish(url: &str, label: String) -> Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();

        let client = es::ClientBuilder::for_url(url)?
            .reconnect(es::ReconnectOptions::reconnect(false).build())
            .build();

        let task_label = label.clone();
        let handle = tokio::spawn(async move {
            let mut stream = client.stream();

            loop {
                match stream.next().await {
                    Some(Ok(es::SSE::Event(event))) => {
                        let sse_event = Event {
                            event_type: event.event_type,
                            data: event.data,
                        };

                        if tx.send(sse_event).is_err() {
                            debug!("SSE receiver dropped for {}", task_label);
                            break;
                        }
                    }
                    Some(Ok(_)) => {
                        // Ignore comments (keep-alive)
                    }
                    Some(Err(e)) => {
                        warn!("SSE error for {}: {}", task_label, e);
                        break;
                    }
                    None => {
                        debug!("SSE stream ended for {}", task_label);
                        break;
                    }
                }
            }
        });

        Ok(Self {
            label,
            url: url.to_string(),
            event_rx: rx,
            _handle: handle,
        })
    }

    /// Collect `count` events, failing if they do not all arrive in time.
    pub async fn wait_for_events(&mut self, count: usize, timeout: Duration) -> Result<Vec<Event>> {
        let deadline = Instant::now() + timeout;
        let mut events = Vec::with_capacity(count);

        while events.len() < count {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                anyhow::bail!("Timeout after {} of {} events", events.len(), count);
            }

            match tokio::time::timeout(remaining, self.event_rx.recv()).await {
                Ok(Some(event)) => events.push(event),
                Ok(None) => {
                    anyhow::bail!(
                        "SSE connection closed after {} of {} events",
                        events.len(),
                        count
                    );
                }
                Err(_) => {
                    anyhow::bail!("Timeout after {} of {} events", events.len(), count);
                }
            }
        }

        Ok(events)
    }
}
