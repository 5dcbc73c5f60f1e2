//! Metrics collection.
//!
//! # Metrics
//! - `confnode_loads_total` (counter): loads by result
//! - `confnode_saves_total` (counter): saves by result
//! - `confnode_reference_errors_total` (counter): reference errors by phase
//! - `confnode_watch_events_total` (counter): filesystem events by kind
//! - `confnode_mapper_cache_size` (gauge): cached object mappers

fn result_label(ok: bool) -> &'static str {
    if ok {
        "ok"
    } else {
        "error"
    }
}

pub fn record_load(ok: bool) {
    ::metrics::counter!("confnode_loads_total", "result" => result_label(ok)).increment(1);
}

pub fn record_save(ok: bool) {
    ::metrics::counter!("confnode_saves_total", "result" => result_label(ok)).increment(1);
}

pub fn record_reference_error(phase: &'static str) {
    ::metrics::counter!("confnode_reference_errors_total", "phase" => phase).increment(1);
}

pub fn record_watch_event(kind: &'static str) {
    ::metrics::counter!("confnode_watch_events_total", "kind" => kind).increment(1);
}

pub fn record_mapper_cache_size(size: usize) {
    ::metrics::gauge!("confnode_mapper_cache_size").set(size as f64);
}
