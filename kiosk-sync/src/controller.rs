//! Orchestration of snapshot, connection, and reducer.
//!
//! The controller task is the only owner of [`ClientState`]. Connection
//! events, resync completions, and connectivity changes are all handled
//! inside one `select!` loop, so every mutation finishes before the next
//! event is looked at. Concurrent fetches resolve last-write-wins.

use std::future::Future;

use tokio::{
    select,
    sync::{mpsc, watch},
};
use tracing::{debug, info, warn};

use crate::{
    config::SyncConfig,
    connection::{ConnectionEvent, ConnectionManager, Connectivity},
    error::Result,
    event::{decode_frame, ServerEvent},
    model::ClientState,
    reducer::{self, Reduction},
    snapshot::SnapshotFetcher,
};

const EVENT_BUFFER: usize = 64;

/// Whether a reopened connection triggers a snapshot fetch by the client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResyncPolicy {
    /// Fetch a snapshot on every open that follows a close.
    #[default]
    OnReconnect,
    /// Rely on the server pushing a `state` frame to every new connection.
    ServerPush,
}

/// Rendering and connectivity collaborator. Called synchronously from the
/// controller task.
pub trait StateObserver: Send {
    fn state_changed(&mut self, state: &ClientState);

    /// Only `pressed_pins` changed. Defaults to a full re-render.
    fn pressed_changed(&mut self, state: &ClientState) {
        self.state_changed(state);
    }

    fn connectivity_changed(&mut self, _connectivity: &Connectivity) {}

    fn server_title(&mut self, _title: &str) {}
}

/// Read-only view of the latest published state.
#[derive(Debug, Clone)]
pub struct SyncHandle {
    state: watch::Receiver<ClientState>,
}

impl SyncHandle {
    pub fn state(&self) -> ClientState {
        self.state.borrow().clone()
    }

    /// Waits until the controller publishes a state newer than the last one
    /// seen by this handle. Returns `false` once the controller is gone.
    pub async fn changed(&mut self) -> bool {
        self.state.changed().await.is_ok()
    }
}

type ResyncResult = Result<ClientState>;

pub struct SyncController<O> {
    state: ClientState,
    fetcher: SnapshotFetcher,
    observer: O,
    resync: ResyncPolicy,
    published: watch::Sender<ClientState>,
    disconnected_since_open: bool,
}

impl<O: StateObserver> SyncController<O> {
    /// Loads the initial snapshot. A failure here is returned to the caller
    /// unretried.
    pub async fn start(
        fetcher: SnapshotFetcher,
        mut observer: O,
        resync: ResyncPolicy,
    ) -> Result<Self> {
        let state = fetcher.fetch().await?;
        info!(
            courses = state.courses.len(),
            clear_pin = ?state.clear_pin,
            "initial snapshot loaded"
        );
        observer.state_changed(&state);

        let (published, _) = watch::channel(state.clone());
        Ok(Self {
            state,
            fetcher,
            observer,
            resync,
            published,
            disconnected_since_open: false,
        })
    }

    pub fn state(&self) -> &ClientState {
        &self.state
    }

    pub fn handle(&self) -> SyncHandle {
        SyncHandle {
            state: self.published.subscribe(),
        }
    }

    /// Drives the controller until `shutdown` resolves or the connection
    /// side hangs up. Returns the final state.
    pub async fn run_until<F>(
        mut self,
        mut events: mpsc::Receiver<ConnectionEvent>,
        mut connectivity: watch::Receiver<Connectivity>,
        shutdown: F,
    ) -> ClientState
    where
        F: Future<Output = ()> + Send,
    {
        tokio::pin!(shutdown);
        let (resync_tx, mut resync_rx) = mpsc::channel::<ResyncResult>(4);
        let mut connectivity_live = true;

        loop {
            select! {
                _ = &mut shutdown => {
                    info!("sync controller shutting down");
                    break;
                }
                event = events.recv() => match event {
                    Some(event) => self.handle_connection_event(event, &resync_tx),
                    None => {
                        debug!("connection manager hung up");
                        break;
                    }
                },
                Some(fetched) = resync_rx.recv() => self.apply_resync(fetched),
                changed = connectivity.changed(), if connectivity_live => match changed {
                    Ok(()) => {
                        let status = connectivity.borrow_and_update().clone();
                        self.observer.connectivity_changed(&status);
                    }
                    Err(_) => connectivity_live = false,
                },
            }
        }

        self.state
    }

    fn handle_connection_event(
        &mut self,
        event: ConnectionEvent,
        resync_tx: &mpsc::Sender<ResyncResult>,
    ) {
        match event {
            ConnectionEvent::Opened => {
                if self.disconnected_since_open && self.resync == ResyncPolicy::OnReconnect {
                    info!("reconnected; fetching snapshot");
                    self.spawn_resync(resync_tx);
                }
                self.disconnected_since_open = false;
            }
            ConnectionEvent::Closed { reason } => {
                debug!(%reason, "event connection lost");
                self.disconnected_since_open = true;
            }
            ConnectionEvent::Message(raw) => {
                if let Some(event) = decode_frame(&raw) {
                    self.dispatch(event, resync_tx);
                }
            }
        }
    }

    fn dispatch(&mut self, event: ServerEvent, resync_tx: &mpsc::Sender<ResyncResult>) {
        if let ServerEvent::Hello { title: Some(title) } = &event {
            self.observer.server_title(title);
        }

        let reduction = reducer::reduce(&mut self.state, &event);
        debug!(tag = event.tag(), ?reduction, "event reduced");
        match reduction {
            Reduction::ResyncRequired => self.spawn_resync(resync_tx),
            other => self.notify(other),
        }
    }

    fn spawn_resync(&self, resync_tx: &mpsc::Sender<ResyncResult>) {
        let fetcher = self.fetcher.clone();
        let resync_tx = resync_tx.clone();
        tokio::spawn(async move {
            let fetched = fetcher.fetch().await;
            let _ = resync_tx.send(fetched).await;
        });
    }

    fn apply_resync(&mut self, fetched: ResyncResult) {
        match fetched {
            Ok(snapshot) => {
                let reduction = reducer::replace(&mut self.state, snapshot);
                self.notify(reduction);
            }
            Err(err) => warn!(error = %err, "resync failed; keeping current state"),
        }
    }

    fn notify(&mut self, reduction: Reduction) {
        match reduction {
            Reduction::PressedChanged => self.observer.pressed_changed(&self.state),
            Reduction::StateChanged => self.observer.state_changed(&self.state),
            Reduction::Unchanged | Reduction::ResyncRequired => return,
        }
        self.published.send_replace(self.state.clone());
    }
}

/// Wires a full client from `config`: initial snapshot, event connection,
/// and controller loop. Returns the final state once `shutdown` resolves.
pub async fn run_client<O, F>(config: &SyncConfig, observer: O, shutdown: F) -> Result<ClientState>
where
    O: StateObserver,
    F: Future<Output = ()> + Send,
{
    let fetcher = SnapshotFetcher::new(config.snapshot_url.clone());
    let controller = SyncController::start(fetcher, observer, config.resync).await?;

    let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
    let mut manager = ConnectionManager::new(config.events_url.clone(), config.retry, events_tx)
        .with_keepalive(config.keepalive);
    let connectivity = manager.connectivity();
    manager.connect();

    let state = controller.run_until(events_rx, connectivity, shutdown).await;
    manager.shutdown();
    Ok(state)
}
