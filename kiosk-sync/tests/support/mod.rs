//! In-process stand-in for the course board server.
//!
//! Serves `GET /api/state`, `POST /api/clear`, and the `/ws` event socket on
//! an ephemeral port. Frames published through [`FakeBoard::publish`] reach
//! every connected socket through a broadcast channel.

#![allow(dead_code)]

use std::{
    collections::BTreeSet,
    net::SocketAddr,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use anyhow::{anyhow, Result};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use kiosk_sync::{
    connection::Connectivity,
    controller::StateObserver,
    event::{ServerEvent, PING, PONG},
    model::{ClientState, Course, Pin},
};
use serde_json::json;
use tokio::{
    net::TcpListener,
    select,
    sync::{broadcast, mpsc},
    task::JoinHandle,
    time::timeout,
};

pub const BOARD_TITLE: &str = "KDG Course Board";
pub const WAIT: Duration = Duration::from_secs(3);

pub fn course(course_id: &str, pin: Pin) -> Course {
    Course {
        course_id: course_id.to_string(),
        button_gpio_pin: pin,
        title: format!("Course {course_id}"),
        room: "B.101".to_string(),
        description: "An introduction".to_string(),
        overview: "Weekly sessions".to_string(),
        image_path: Some(format!("/static/img/{course_id}.png")),
    }
}

pub fn board_state(courses: Vec<Course>, clear_pin: Option<Pin>) -> ClientState {
    ClientState {
        courses,
        clear_pin,
        ..ClientState::default()
    }
}

struct BoardState {
    snapshot: Mutex<ClientState>,
    raw_snapshot: Mutex<Option<String>>,
    snapshot_status: Mutex<Option<StatusCode>>,
    fail_clear: AtomicBool,
    push_state_on_connect: AtomicBool,
    snapshot_requests: AtomicUsize,
    clear_requests: AtomicUsize,
    connections: AtomicUsize,
    broadcaster: broadcast::Sender<String>,
    kicker: broadcast::Sender<()>,
}

impl BoardState {
    fn snapshot(&self) -> ClientState {
        self.snapshot.lock().expect("board lock").clone()
    }

    fn publish_raw(&self, frame: String) {
        // No receivers just means no kiosk is connected yet.
        let _ = self.broadcaster.send(frame);
    }
}

pub struct FakeBoard {
    addr: SocketAddr,
    state: Arc<BoardState>,
    server: JoinHandle<()>,
}

impl FakeBoard {
    pub async fn start(initial: ClientState) -> Result<Self> {
        let (broadcaster, _) = broadcast::channel(128);
        let (kicker, _) = broadcast::channel(8);
        let state = Arc::new(BoardState {
            snapshot: Mutex::new(initial),
            raw_snapshot: Mutex::new(None),
            snapshot_status: Mutex::new(None),
            fail_clear: AtomicBool::new(false),
            push_state_on_connect: AtomicBool::new(false),
            snapshot_requests: AtomicUsize::new(0),
            clear_requests: AtomicUsize::new(0),
            connections: AtomicUsize::new(0),
            broadcaster,
            kicker,
        });

        let app = Router::new()
            .route("/api/state", get(get_state))
            .route("/api/clear", post(clear_history))
            .route("/ws", get(upgrade))
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self {
            addr,
            state,
            server,
        })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn snapshot(&self) -> ClientState {
        self.state.snapshot()
    }

    pub fn set_snapshot(&self, snapshot: ClientState) {
        *self.state.snapshot.lock().expect("board lock") = snapshot;
    }

    pub fn update_snapshot(&self, edit: impl FnOnce(&mut ClientState)) {
        edit(&mut self.state.snapshot.lock().expect("board lock"));
    }

    /// Serves `body` verbatim from the snapshot endpoint.
    pub fn serve_raw_snapshot(&self, body: &str) {
        *self.state.raw_snapshot.lock().expect("board lock") = Some(body.to_string());
    }

    pub fn fail_snapshots_with(&self, status: Option<StatusCode>) {
        *self.state.snapshot_status.lock().expect("board lock") = status;
    }

    pub fn fail_clear(&self, fail: bool) {
        self.state.fail_clear.store(fail, Ordering::SeqCst);
    }

    pub fn push_state_on_connect(&self, push: bool) {
        self.state.push_state_on_connect.store(push, Ordering::SeqCst);
    }

    pub fn publish(&self, event: &ServerEvent) {
        let frame = serde_json::to_string(event).expect("serialize event");
        self.state.publish_raw(frame);
    }

    pub fn publish_raw(&self, frame: &str) {
        self.state.publish_raw(frame.to_string());
    }

    /// Closes every open event socket from the server side.
    pub fn disconnect_all(&self) {
        let _ = self.state.kicker.send(());
    }

    pub fn snapshot_requests(&self) -> usize {
        self.state.snapshot_requests.load(Ordering::SeqCst)
    }

    pub fn clear_requests(&self) -> usize {
        self.state.clear_requests.load(Ordering::SeqCst)
    }

    pub fn connections(&self) -> usize {
        self.state.connections.load(Ordering::SeqCst)
    }
}

impl Drop for FakeBoard {
    fn drop(&mut self) {
        self.server.abort();
    }
}

async fn get_state(State(board): State<Arc<BoardState>>) -> Response {
    board.snapshot_requests.fetch_add(1, Ordering::SeqCst);

    if let Some(status) = *board.snapshot_status.lock().expect("board lock") {
        return status.into_response();
    }
    if let Some(body) = board.raw_snapshot.lock().expect("board lock").clone() {
        return body.into_response();
    }

    let mut payload = serde_json::to_value(board.snapshot()).expect("serialize snapshot");
    payload["type"] = json!("state");
    Json(payload).into_response()
}

async fn clear_history(State(board): State<Arc<BoardState>>) -> Response {
    board.clear_requests.fetch_add(1, Ordering::SeqCst);
    if board.fail_clear.load(Ordering::SeqCst) {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    board
        .snapshot
        .lock()
        .expect("board lock")
        .history_course_ids
        .clear();
    let frame = serde_json::to_string(&ServerEvent::HistoryCleared).expect("serialize event");
    board.publish_raw(frame);
    Json(json!({ "ok": true })).into_response()
}

async fn upgrade(ws: WebSocketUpgrade, State(board): State<Arc<BoardState>>) -> Response {
    ws.on_upgrade(move |socket| serve_socket(socket, board))
}

async fn serve_socket(mut socket: WebSocket, board: Arc<BoardState>) {
    // Subscribe before greeting so a kiosk that saw `hello` sees every publish.
    let mut inbox = board.broadcaster.subscribe();
    let mut kicks = board.kicker.subscribe();
    board.connections.fetch_add(1, Ordering::SeqCst);

    let hello = json!({ "type": "hello", "title": BOARD_TITLE }).to_string();
    if socket.send(Message::Text(hello)).await.is_err() {
        return;
    }
    if board.push_state_on_connect.load(Ordering::SeqCst) {
        let frame = serde_json::to_string(&ServerEvent::State(board.snapshot()))
            .expect("serialize snapshot");
        if socket.send(Message::Text(frame)).await.is_err() {
            return;
        }
    }

    loop {
        select! {
            published = inbox.recv() => match published {
                Ok(frame) => {
                    if socket.send(Message::Text(frame)).await.is_err() {
                        break;
                    }
                }
                Err(_) => break,
            },
            _ = kicks.recv() => {
                let _ = socket.send(Message::Close(None)).await;
                break;
            }
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Text(text))) if text == PING => {
                    if socket.send(Message::Text(PONG.to_string())).await.is_err() {
                        break;
                    }
                }
                Some(Ok(_)) => {}
                _ => break,
            },
        }
    }
}

/// What the controller told its observer, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Note {
    State(ClientState),
    Pressed(BTreeSet<Pin>),
    Connectivity(bool),
    Title(String),
}

pub struct RecordingObserver {
    notes: mpsc::UnboundedSender<Note>,
}

impl RecordingObserver {
    pub fn new() -> (Self, Notes) {
        let (notes, rx) = mpsc::unbounded_channel();
        (
            Self { notes },
            Notes {
                rx,
                seen: Vec::new(),
            },
        )
    }
}

impl StateObserver for RecordingObserver {
    fn state_changed(&mut self, state: &ClientState) {
        let _ = self.notes.send(Note::State(state.clone()));
    }

    fn pressed_changed(&mut self, state: &ClientState) {
        let _ = self.notes.send(Note::Pressed(state.pressed_pins.clone()));
    }

    fn connectivity_changed(&mut self, connectivity: &Connectivity) {
        let _ = self.notes.send(Note::Connectivity(connectivity.ok));
    }

    fn server_title(&mut self, title: &str) {
        let _ = self.notes.send(Note::Title(title.to_string()));
    }
}

pub struct Notes {
    rx: mpsc::UnboundedReceiver<Note>,
    seen: Vec<Note>,
}

impl Notes {
    /// Skips notes until one matches `wanted`.
    pub async fn wait_for<F>(&mut self, description: &str, mut wanted: F) -> Result<Note>
    where
        F: FnMut(&Note) -> bool,
    {
        let Notes { rx, seen } = self;
        let search = async {
            while let Some(note) = rx.recv().await {
                seen.push(note.clone());
                if wanted(&note) {
                    return Ok(note);
                }
            }
            Err(anyhow!("{description}: observer dropped"))
        };
        timeout(WAIT, search)
            .await
            .map_err(|_| anyhow!("{description}: timed out"))?
    }

    pub async fn wait_for_state<F>(&mut self, description: &str, mut wanted: F) -> Result<ClientState>
    where
        F: FnMut(&ClientState) -> bool,
    {
        match self
            .wait_for(description, |note| matches!(note, Note::State(state) if wanted(state)))
            .await?
        {
            Note::State(state) => Ok(state),
            other => Err(anyhow!("{description}: unexpected note {other:?}")),
        }
    }

    pub async fn wait_for_pressed(&mut self, description: &str, pins: &[Pin]) -> Result<()> {
        let expected: BTreeSet<Pin> = pins.iter().copied().collect();
        self.wait_for(description, |note| {
            matches!(note, Note::Pressed(pressed) if *pressed == expected)
        })
        .await
        .map(|_| ())
    }

    /// The server greets every new socket after subscribing it.
    pub async fn wait_for_connection(&mut self) -> Result<()> {
        self.wait_for("waiting for server greeting", |note| {
            matches!(note, Note::Title(title) if title == BOARD_TITLE)
        })
        .await
        .map(|_| ())
    }

    /// Every note received so far, in arrival order.
    pub fn seen(&mut self) -> &[Note] {
        while let Ok(note) = self.rx.try_recv() {
            self.seen.push(note);
        }
        &self.seen
    }
}
