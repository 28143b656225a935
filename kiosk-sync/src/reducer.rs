//! State reduction for inbound server events.
//!
//! Pressed pins and history arrive as deltas because they change on every
//! button press. Catalog edits are rare and are never patched locally: a
//! `courses_updated` frame only asks the caller for a fresh snapshot.
//!
//! Every arm either assigns a fully built value or leaves the state alone,
//! so a rejected event can never leave a half-applied update behind.

use std::collections::BTreeSet;

use crate::{event::ServerEvent, model::ClientState};

/// What a single reduction did to the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    Unchanged,
    /// Only `pressed_pins` differs.
    PressedChanged,
    /// Anything beyond the pressed set changed, including full replacement.
    StateChanged,
    /// State untouched; the catalog must be refetched.
    ResyncRequired,
}

impl Reduction {
    pub fn is_change(self) -> bool {
        matches!(self, Reduction::PressedChanged | Reduction::StateChanged)
    }
}

pub fn reduce(state: &mut ClientState, event: &ServerEvent) -> Reduction {
    match event {
        ServerEvent::State(snapshot) => replace(state, snapshot.clone()),
        ServerEvent::PressedUpdate { pressed_pins } => {
            let pressed: BTreeSet<_> = pressed_pins.iter().flatten().copied().collect();
            if pressed == state.pressed_pins {
                return Reduction::Unchanged;
            }
            state.pressed_pins = pressed;
            Reduction::PressedChanged
        }
        ServerEvent::CourseAdded { course } => match course {
            Some(course) if !course.course_id.is_empty() => {
                // Catalog membership is untouched; history may name a course
                // the local catalog learns about on the next snapshot.
                state.history_course_ids.push(course.course_id.clone());
                Reduction::StateChanged
            }
            _ => Reduction::Unchanged,
        },
        ServerEvent::HistoryCleared => {
            if state.history_course_ids.is_empty() {
                return Reduction::Unchanged;
            }
            state.history_course_ids.clear();
            Reduction::StateChanged
        }
        ServerEvent::CoursesUpdated => Reduction::ResyncRequired,
        ServerEvent::Hello { .. } | ServerEvent::Unknown => Reduction::Unchanged,
    }
}

/// Installs a snapshot wholesale, whether fetched or pushed. Always reports
/// a change, even for an identical snapshot, so observers re-render after
/// every resync.
pub fn replace(state: &mut ClientState, snapshot: ClientState) -> Reduction {
    let pressed_only = state.pressed_pins != snapshot.pressed_pins
        && state.courses == snapshot.courses
        && state.history_course_ids == snapshot.history_course_ids
        && state.clear_pin == snapshot.clear_pin
        && state.backend == snapshot.backend;
    *state = snapshot;
    if pressed_only {
        Reduction::PressedChanged
    } else {
        Reduction::StateChanged
    }
}
