//! Stream handlers the server ships with.

use log::*;
use sse::{BoxError, EventSourceConnection, EventSourceHandler};
use std::time::Duration;
use tokio::task::AbortHandle;

/// Sends each configured message, suffixed with the `echoThis` query
/// parameter, as soon as the stream opens.
///
/// `GET /es/hello?echoThis=yo` with messages `a,b` pushes `a yo` then `b yo`.
pub struct EchoHandler {
    messages: Vec<String>,
}

impl EchoHandler {
    pub fn new<I, S>(messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            messages: messages.into_iter().map(Into::into).collect(),
        }
    }
}

impl EventSourceHandler for EchoHandler {
    fn on_open(&self, connection: &EventSourceConnection) -> Result<(), BoxError> {
        let echo = connection
            .http_request()
            .query_param("echoThis")
            .unwrap_or_default()
            .to_string();
        for message in &self.messages {
            connection.send(format!("{message} {echo}"));
        }
        Ok(())
    }

    fn on_close(&self, connection: &EventSourceConnection) -> Result<(), BoxError> {
        debug!("Echo stream {} closed", connection.id());
        Ok(())
    }
}

/// Pushes `tick <n>` every period, driven by a timer that re-enters the
/// connection's lane for each tick. The counter and the timer's abort handle
/// live in the connection's attached data. Closes the stream after `limit`
/// ticks when one is set, which the client may override with `?limit=`.
pub struct TickerHandler {
    period: Duration,
    limit: Option<u64>,
}

const TICKS_KEY: &str = "ticks";
const TIMER_KEY: &str = "timer";

impl TickerHandler {
    pub fn new(period: Duration, limit: Option<u64>) -> Self {
        Self { period, limit }
    }

    fn ticks(connection: &EventSourceConnection) -> u64 {
        connection.data_as::<u64>(TICKS_KEY).map_or(0, |ticks| *ticks)
    }

    fn tick(connection: &EventSourceConnection, limit: Option<u64>) {
        let ticks = Self::ticks(connection) + 1;
        connection
            .set_data(TICKS_KEY, ticks)
            .send(format!("tick {ticks}"));

        if limit.is_some_and(|limit| ticks >= limit) {
            connection.close();
        }
    }
}

impl EventSourceHandler for TickerHandler {
    fn on_open(&self, connection: &EventSourceConnection) -> Result<(), BoxError> {
        let limit = match connection.http_request().query_param("limit") {
            Some(raw) => Some(raw.parse::<u64>()?),
            None => self.limit,
        };
        connection.set_data(TICKS_KEY, 0u64);

        let period = self.period;
        let conn = connection.clone();
        let timer = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                interval.tick().await;
                let lane_conn = conn.clone();
                conn.execute(move || {
                    if lane_conn.is_open() {
                        TickerHandler::tick(&lane_conn, limit);
                    }
                    Ok(())
                });
            }
        });
        connection.set_data(TIMER_KEY, timer.abort_handle());
        Ok(())
    }

    fn on_close(&self, connection: &EventSourceConnection) -> Result<(), BoxError> {
        if let Some(timer) = connection.data_as::<AbortHandle>(TIMER_KEY) {
            timer.abort();
        }
        info!(
            "Ticker stream {} closed after {} tick(s)",
            connection.id(),
            Self::ticks(connection)
        );
        Ok(())
    }
}
