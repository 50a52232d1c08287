use std::sync::Mutex;

/// Structured log sink, the `Logger` seam named in §1 as an interface the core consumes rather
/// than a concrete logging setup it owns. Mirrors `src/core/logger.py`'s `Logger` wrapper
/// (`logger.info("cycle_completed", cycle=1)`), translated to a trait so service loops log
/// through an injected sink instead of calling `tracing` macros at their public boundary.
///
/// `fields` are pre-formatted `key=value` pairs (rather than a typed map) to keep the trait
/// object-safe and dependency-free; [`TracingLogger`] re-emits them as `tracing` fields.
pub trait Logger: Send + Sync {
    fn debug(&self, message: &str, fields: &[(&str, &str)]);
    fn info(&self, message: &str, fields: &[(&str, &str)]);
    fn warn(&self, message: &str, fields: &[(&str, &str)]);
    fn error(&self, message: &str, fields: &[(&str, &str)]);
}

fn format_fields(fields: &[(&str, &str)]) -> String {
    fields
        .iter()
        .map(|(k, v)| format!(" {k}={v}"))
        .collect::<String>()
}

/// Production `Logger`, backed by `tracing` — the same crate `nostr-sdk`/`nostr-relay-pool` log
/// through. Initialization (subscriber setup) is left to the binary crate per §1's external
/// boundary; this type only emits events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn debug(&self, message: &str, fields: &[(&str, &str)]) {
        tracing::debug!("{message}{}", format_fields(fields));
    }

    fn info(&self, message: &str, fields: &[(&str, &str)]) {
        tracing::info!("{message}{}", format_fields(fields));
    }

    fn warn(&self, message: &str, fields: &[(&str, &str)]) {
        tracing::warn!("{message}{}", format_fields(fields));
    }

    fn error(&self, message: &str, fields: &[(&str, &str)]) {
        tracing::error!("{message}{}", format_fields(fields));
    }
}

/// Deterministic test `Logger`: records every call instead of emitting it, so service-loop
/// tests can assert on what was logged without capturing stdout.
#[derive(Default)]
pub struct RecordingLogger {
    records: Mutex<Vec<(String, String)>>,
}

impl RecordingLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.records.lock().unwrap().iter().map(|(m, _)| m.clone()).collect()
    }
}

impl Logger for RecordingLogger {
    fn debug(&self, message: &str, fields: &[(&str, &str)]) {
        self.records.lock().unwrap().push(("debug".into(), format!("{message}{}", format_fields(fields))));
    }

    fn info(&self, message: &str, fields: &[(&str, &str)]) {
        self.records.lock().unwrap().push(("info".into(), format!("{message}{}", format_fields(fields))));
    }

    fn warn(&self, message: &str, fields: &[(&str, &str)]) {
        self.records.lock().unwrap().push(("warn".into(), format!("{message}{}", format_fields(fields))));
    }

    fn error(&self, message: &str, fields: &[(&str, &str)]) {
        self.records.lock().unwrap().push(("error".into(), format!("{message}{}", format_fields(fields))));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_logger_captures_message_text() {
        let logger = RecordingLogger::new();
        logger.info("cycle_completed", &[("cycle", "1")]);
        assert_eq!(logger.messages(), vec!["cycle_completed cycle=1".to_string()]);
    }
}
