//! Value and entry formatting.
//!
//! Values default to their JSON rendering. Missing values render as
//! `undefined` so an unset state call site is distinguishable from a
//! `null` one.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::entry::LogEntry;

/// Rendering used for a missing value.
pub const UNDEFINED: &str = "undefined";

/// Component props as traced on each render pass.
pub type Props = BTreeMap<String, serde_json::Value>;

/// Render a value as compact JSON.
pub fn show_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| format!("<unserializable: {e}>"))
}

/// Render an optional value, using `undefined` when absent.
pub fn show_optional<T>(value: Option<&T>, show: impl Fn(&T) -> String) -> String {
    value.map_or_else(|| UNDEFINED.to_string(), show)
}

/// Render props as `key=value` pairs.
pub fn show_props(props: &Props) -> String {
    show_props_with(props, |_, value| show_json(value))
}

/// Render props as `key=value` pairs with a custom value formatter.
pub fn show_props_with(
    props: &Props,
    show_value: impl Fn(&str, &serde_json::Value) -> String,
) -> String {
    props
        .iter()
        .map(|(key, value)| format!("{key}={}", show_value(key, value)))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Render a log entry as a single human-readable line.
pub fn entry_line(index: usize, entry: &LogEntry) -> String {
    let origin = entry.origin();
    let mut origin_text = origin.kind().to_string();
    if let Some(label) = origin.label() {
        origin_text.push('«');
        origin_text.push_str(label);
        origin_text.push('»');
    }
    let phase = entry.phase().map(|p| p.as_str()).unwrap_or("");
    let message = entry.payload().show().unwrap_or_default();

    format!(
        "{index:>4} {:<16} {origin_text:<20} {phase:<9} {message}",
        entry.component_label()
    )
    .trim_end()
    .to_string()
}

/// Render a log entry as a JSON object.
pub fn entry_json(index: usize, entry: &LogEntry) -> serde_json::Value {
    let origin = entry.origin();
    serde_json::json!({
        "index": index,
        "component": entry.component_label(),
        "origin": {
            "id": origin.id().as_u64(),
            "kind": origin.kind(),
            "label": origin.label(),
        },
        "phase": entry.phase(),
        "message": entry.payload().show(),
    })
}
