//! Lifecycle of the single event connection to the kiosk server.
//!
//! A supervisor task owns the WebSocket. It forwards every inbound frame as
//! raw text through an mpsc channel, reports open/close transitions on the
//! same channel, and reconnects after [`RetryPolicy::delay`] forever. The
//! supervisor is also the only writer of the [`Connectivity`] watch channel.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use reqwest::Url;
use tokio::{
    net::TcpStream,
    select,
    sync::{mpsc, watch},
    task::JoinHandle,
    time::{self, Instant, Interval, MissedTickBehavior},
};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::{error::SyncError, event::PING};

const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Fixed-delay reconnect schedule with no attempt limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    delay: Duration,
}

impl RetryPolicy {
    pub const fn fixed(delay: Duration) -> Self {
        Self { delay }
    }

    pub const fn immediate() -> Self {
        Self::fixed(Duration::ZERO)
    }

    /// Wait between a close and the next connect attempt.
    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(DEFAULT_RETRY_DELAY)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Opened,
    /// Raw payload of an inbound data frame, parsed or not.
    Message(String),
    /// Clean close, protocol error, or failed connect attempt.
    Closed { reason: String },
}

/// Output-only connectivity indicator for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connectivity {
    pub ok: bool,
    pub status: String,
}

impl Connectivity {
    fn connecting() -> Self {
        Self {
            ok: false,
            status: "connecting".to_string(),
        }
    }

    fn connected() -> Self {
        Self {
            ok: true,
            status: "connected".to_string(),
        }
    }

    fn disconnected(reason: &str, retry_in: Duration) -> Self {
        Self {
            ok: false,
            status: format!("disconnected ({reason}); retrying in {retry_in:?}"),
        }
    }
}

pub struct ConnectionManager {
    url: Url,
    retry: RetryPolicy,
    keepalive: Option<Duration>,
    events: mpsc::Sender<ConnectionEvent>,
    connectivity: watch::Sender<Connectivity>,
    supervisor: Option<JoinHandle<()>>,
}

impl ConnectionManager {
    pub fn new(url: Url, retry: RetryPolicy, events: mpsc::Sender<ConnectionEvent>) -> Self {
        let (connectivity, _) = watch::channel(Connectivity::connecting());
        Self {
            url,
            retry,
            keepalive: None,
            events,
            connectivity,
            supervisor: None,
        }
    }

    pub fn with_keepalive(mut self, keepalive: Option<Duration>) -> Self {
        self.keepalive = keepalive.filter(|period| !period.is_zero());
        self
    }

    pub fn connectivity(&self) -> watch::Receiver<Connectivity> {
        self.connectivity.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.supervisor
            .as_ref()
            .is_some_and(|supervisor| !supervisor.is_finished())
    }

    /// Starts the supervisor. Returns `false` without side effects when a
    /// connection is already open or being established.
    pub fn connect(&mut self) -> bool {
        if self.is_running() {
            debug!(url = %self.url, "connect ignored; connection already active");
            return false;
        }

        let session = Supervisor {
            url: self.url.clone(),
            retry: self.retry,
            keepalive: self.keepalive,
            events: self.events.clone(),
            connectivity: self.connectivity.clone(),
        };
        self.supervisor = Some(tokio::spawn(session.run()));
        true
    }

    pub fn shutdown(&mut self) {
        if let Some(supervisor) = self.supervisor.take() {
            supervisor.abort();
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

enum SessionEnd {
    Lost(String),
    /// The event receiver was dropped; nobody is listening anymore.
    ConsumerGone,
}

struct Supervisor {
    url: Url,
    retry: RetryPolicy,
    keepalive: Option<Duration>,
    events: mpsc::Sender<ConnectionEvent>,
    connectivity: watch::Sender<Connectivity>,
}

impl Supervisor {
    async fn run(self) {
        let mut failures: u64 = 0;

        loop {
            self.connectivity.send_replace(Connectivity::connecting());

            let reason = match connect_async(self.url.as_str()).await {
                Ok((socket, _response)) => {
                    info!(url = %self.url, "event connection open");
                    failures = 0;
                    self.connectivity.send_replace(Connectivity::connected());
                    if self.events.send(ConnectionEvent::Opened).await.is_err() {
                        return;
                    }
                    match self.pump(socket).await {
                        SessionEnd::Lost(reason) => reason,
                        SessionEnd::ConsumerGone => return,
                    }
                }
                Err(err) => SyncError::from(err).to_string(),
            };

            failures += 1;
            let delay = self.retry.delay();
            warn!(url = %self.url, %reason, attempt = failures, ?delay, "event connection closed");
            self.connectivity
                .send_replace(Connectivity::disconnected(&reason, delay));
            if self
                .events
                .send(ConnectionEvent::Closed { reason })
                .await
                .is_err()
            {
                return;
            }

            time::sleep(delay).await;
        }
    }

    async fn pump(&self, socket: Socket) -> SessionEnd {
        let (mut sink, mut source) = socket.split();
        let mut keepalive = self.keepalive.map(|period| {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });

        loop {
            select! {
                frame = source.next() => {
                    let payload = match frame {
                        Some(Ok(Message::Text(text))) => text,
                        Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                            Ok(text) => text,
                            Err(_) => {
                                debug!("dropping non-utf8 binary frame");
                                continue;
                            }
                        },
                        Some(Ok(Message::Close(frame))) => {
                            let reason = frame
                                .map(|frame| format!("closed by server: {} {}", u16::from(frame.code), frame.reason))
                                .unwrap_or_else(|| "closed by server".to_string());
                            return SessionEnd::Lost(reason);
                        }
                        Some(Ok(_)) => continue,
                        Some(Err(err)) => return SessionEnd::Lost(SyncError::from(err).to_string()),
                        None => return SessionEnd::Lost("connection reset".to_string()),
                    };

                    if self.events.send(ConnectionEvent::Message(payload)).await.is_err() {
                        return SessionEnd::ConsumerGone;
                    }
                }
                _ = next_tick(&mut keepalive) => {
                    if let Err(err) = sink.send(Message::Text(PING.to_string())).await {
                        return SessionEnd::Lost(format!("keepalive failed: {err}"));
                    }
                }
            }
        }
    }
}

async fn next_tick(keepalive: &mut Option<Interval>) {
    match keepalive {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}
