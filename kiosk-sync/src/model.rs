//! Client-side view of the course board.
//!
//! [`ClientState`] mirrors the JSON object served by `GET /api/state` and
//! carried inside `state` frames, so one type covers both the fetched
//! snapshot and the pushed one.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Electrical pin number of a physical button.
pub type Pin = i64;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Course {
    /// Stable identifier.
    #[serde(default)]
    pub course_id: String,
    pub button_gpio_pin: Pin,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub room: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub overview: String,
    /// Opaque display reference; the server may send `null` or `""`.
    #[serde(default)]
    pub image_path: Option<String>,
}

/// Description of the button input backend the server is reading from.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BackendInfo {
    #[serde(default)]
    pub backend: String,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub course_pins: Vec<Pin>,
    #[serde(default)]
    pub clear_pin: Option<Pin>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientState {
    pub courses: Vec<Course>,
    pub pressed_pins: BTreeSet<Pin>,
    /// Display order; repeated ids are meaningful.
    pub history_course_ids: Vec<String>,
    #[serde(default)]
    pub clear_pin: Option<Pin>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<BackendInfo>,
}

impl ClientState {
    pub fn course(&self, course_id: &str) -> Option<&Course> {
        self.courses
            .iter()
            .find(|course| course.course_id == course_id)
    }

    /// First course bound to `pin`. Duplicate pin assignments resolve to
    /// catalog order.
    pub fn course_for_pin(&self, pin: Pin) -> Option<&Course> {
        self.courses
            .iter()
            .find(|course| course.button_gpio_pin == pin)
    }

    pub fn is_clear_pin(&self, pin: Pin) -> bool {
        self.clear_pin == Some(pin)
    }

    /// History resolved against the catalog. Ids the catalog does not know
    /// yet are skipped, not reported.
    pub fn history_courses(&self) -> impl Iterator<Item = &Course> + '_ {
        self.history_course_ids
            .iter()
            .filter_map(|course_id| self.course(course_id))
    }
}
