// Text rendering for the terminal and for Spark messages.

use std::fmt::Write;

use crate::library::{NetworkDevice, PathTrace};
use crate::spark::{Person, Room};

const DEVICE_LABELS: [&str; 4] = ["Device Name", "IP Address", "Up Time", "Last Updated"];
const ROOM_LABELS: [&str; 4] = ["Index", "Selected", "Room Name", "Room ID"];
const SELECTED_MARK: &str = "XXXXXXXX";

fn underline(label: &str) -> String {
    "=".repeat(label.len())
}

fn or_none(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("None")
}

fn device_fields(device: &NetworkDevice) -> [&str; 4] {
    [
        or_none(&device.hostname),
        or_none(&device.management_ip_address),
        or_none(&device.up_time),
        or_none(&device.last_updated),
    ]
}

fn device_row(out: &mut String, c: [&str; 4]) {
    let _ = writeln!(out, "{:<22}{:<22}{:<22}{:<22}", c[0], c[1], c[2], c[3]);
}

fn room_row(out: &mut String, c: [&str; 4]) {
    let _ = writeln!(out, "{:<8}{:<11}{:<22}{:<22}", c[0], c[1], c[2], c[3]);
}

/// Fixed-width device table for the terminal.
pub fn devices_table(devices: &[NetworkDevice]) -> String {
    let mut out = String::new();
    device_row(&mut out, DEVICE_LABELS);
    let lines = DEVICE_LABELS.map(underline);
    device_row(&mut out, lines.each_ref().map(String::as_str));
    for device in devices {
        device_row(&mut out, device_fields(device));
    }
    out
}

/// Device list as a Spark message: one labelled block per device.
pub fn devices_message(devices: &[NetworkDevice]) -> String {
    let mut out = String::new();
    for (n, device) in devices.iter().enumerate() {
        let _ = writeln!(out);
        let _ = writeln!(out, "[Device #{}]", n + 1);
        for (label, value) in DEVICE_LABELS.iter().zip(device_fields(device)) {
            let _ = writeln!(out, "{label}: {value}");
        }
    }
    out
}

/// Hops of a path trace, or the failure reason if the trace failed.
pub fn path_trace_text(trace: &PathTrace) -> String {
    let mut out = String::new();
    if trace.is_failed() {
        let reason = trace.failure_reason.as_deref().unwrap_or("Path trace failed");
        let _ = writeln!(out, "{reason}");
        return out;
    }
    let last = trace.elements.len().saturating_sub(1);
    for (index, hop) in trace.elements.iter().enumerate() {
        let _ = if index == 0 {
            writeln!(out, "Source: {}", or_none(&hop.ip))
        } else if index == last {
            writeln!(out, "Destination: {}", or_none(&hop.ip))
        } else {
            writeln!(out, "({index}) {}", hop.name.as_deref().unwrap_or("???"))
        };
    }
    out
}

/// Numbered room table; the room matching `selected` is marked.
pub fn rooms_table(rooms: &[Room], selected: Option<&str>, current_title: Option<&str>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Numbers of rooms: {}", rooms.len());
    let _ = writeln!(out, "Currently selected room: {}", current_title.unwrap_or("none"));
    let _ = writeln!(out);

    room_row(&mut out, ROOM_LABELS);
    let lines = ROOM_LABELS.map(underline);
    room_row(&mut out, lines.each_ref().map(String::as_str));
    for (n, room) in rooms.iter().enumerate() {
        let index = (n + 1).to_string();
        let mark = if selected == Some(room.id.as_str()) { SELECTED_MARK } else { "" };
        room_row(&mut out, [index.as_str(), mark, room.title.as_str(), room.id.as_str()]);
    }
    out
}

/// Name and primary email of a Spark user.
pub fn identity_text(person: &Person) -> String {
    format!(
        "Spark Username: {}\nSpark User Email: {}\n",
        person.display_name,
        person.primary_email().unwrap_or("none")
    )
}
