use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::model::{ClientState, Course, Pin};

/// Keepalive request sent by the client as a bare text frame.
pub const PING: &str = "ping";
/// Keepalive answer from the server. Not JSON, never reaches the reducer.
pub const PONG: &str = "pong";

/// Frames pushed by the kiosk server over the event connection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Full snapshot; replaces local state wholesale.
    State(ClientState),
    PressedUpdate {
        #[serde(default)]
        pressed_pins: Option<Vec<Pin>>,
    },
    CourseAdded {
        #[serde(default)]
        course: Option<CourseRef>,
    },
    HistoryCleared,
    /// The catalog changed server-side; only a fresh snapshot can resolve it.
    CoursesUpdated,
    Hello {
        #[serde(default)]
        title: Option<String>,
    },
    /// Any tag this client does not know yet.
    #[serde(other)]
    Unknown,
}

/// The part of a `course_added` payload the reducer reads. Display fields
/// are ignored here, so a sparse or partly null course still counts.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CourseRef {
    #[serde(default)]
    pub course_id: String,
}

impl From<&Course> for CourseRef {
    fn from(course: &Course) -> Self {
        Self {
            course_id: course.course_id.clone(),
        }
    }
}

impl From<Course> for CourseRef {
    fn from(course: Course) -> Self {
        Self {
            course_id: course.course_id,
        }
    }
}

impl ServerEvent {
    pub fn tag(&self) -> &'static str {
        match self {
            ServerEvent::State(_) => "state",
            ServerEvent::PressedUpdate { .. } => "pressed_update",
            ServerEvent::CourseAdded { .. } => "course_added",
            ServerEvent::HistoryCleared => "history_cleared",
            ServerEvent::CoursesUpdated => "courses_updated",
            ServerEvent::Hello { .. } => "hello",
            ServerEvent::Unknown => "unknown",
        }
    }
}

/// Decodes one inbound text frame. Keepalive answers and anything that is
/// not a well-formed event object yield `None`.
pub fn decode_frame(raw: &str) -> Option<ServerEvent> {
    let trimmed = raw.trim();
    if trimmed == PONG {
        trace!("keepalive answered");
        return None;
    }

    match serde_json::from_str(trimmed) {
        Ok(event) => Some(event),
        Err(error) => {
            debug!(%error, len = raw.len(), "dropping malformed frame");
            None
        }
    }
}
