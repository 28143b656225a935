use std::io::{self, Write};

use crate::{
    connection::Connectivity,
    controller::StateObserver,
    model::{ClientState, Pin},
};

/// Renders board changes as plain lines on stdout.
#[derive(Debug, Default)]
pub struct TerminalObserver;

impl StateObserver for TerminalObserver {
    fn state_changed(&mut self, state: &ClientState) {
        write_lines(&render_board(state));
    }

    fn pressed_changed(&mut self, state: &ClientState) {
        write_lines(&[render_pressed(state)]);
    }

    fn connectivity_changed(&mut self, connectivity: &Connectivity) {
        let marker = if connectivity.ok { "***" } else { "!!!" };
        write_lines(&[format!("{marker} {}", connectivity.status)]);
    }

    fn server_title(&mut self, title: &str) {
        write_lines(&[format!("*** {title}")]);
    }
}

pub fn render_board(state: &ClientState) -> Vec<String> {
    let mut lines = Vec::with_capacity(state.history_course_ids.len() + 3);

    let clear = state
        .clear_pin
        .map(|pin| format!("clear on pin {pin}"))
        .unwrap_or_else(|| "no clear pin".to_string());
    lines.push(format!("*** {} courses, {clear}", state.courses.len()));

    if state.history_course_ids.is_empty() {
        lines.push("    (history empty)".to_string());
    }
    for course in state.history_courses() {
        lines.push(format!("    {} [{}] {}", course.course_id, course.room, course.title));
    }

    lines.push(render_pressed(state));
    lines
}

pub fn render_pressed(state: &ClientState) -> String {
    if state.pressed_pins.is_empty() {
        return "    pressed: none".to_string();
    }
    let pins: Vec<String> = state
        .pressed_pins
        .iter()
        .map(|&pin| describe_pin(state, pin))
        .collect();
    format!("    pressed: {}", pins.join(", "))
}

fn describe_pin(state: &ClientState, pin: Pin) -> String {
    if state.is_clear_pin(pin) {
        return format!("{pin} (clear)");
    }
    match state.course_for_pin(pin) {
        Some(course) => format!("{pin} ({})", course.course_id),
        None => pin.to_string(),
    }
}

fn write_lines(lines: &[String]) {
    let mut stdout = io::stdout().lock();
    for line in lines {
        if writeln!(stdout, "{line}").is_err() {
            return;
        }
    }
    let _ = stdout.flush();
}
