//! Global subscriber installation.
//!
//! A process gets one global subscriber, so everything that depends on it is
//! checked in a single test.

use async_trait::async_trait;
use bridge_traits::error::Result as SinkResult;
use bridge_traits::logging::{LogEntry, LogLevel, LoggerSink};
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
use core_runtime::Error;
use std::sync::{Arc, Mutex};

/// Keeps entries at `info` and above.
#[derive(Default)]
struct HostLog(Mutex<Vec<LogEntry>>);

#[async_trait]
impl LoggerSink for HostLog {
    async fn log(&self, entry: LogEntry) -> SinkResult<()> {
        self.0.lock().unwrap().push(entry);
        Ok(())
    }
}

#[test]
fn test_init_installs_forwarding_once() {
    let host = Arc::new(HostLog::default());
    init_logging(
        LoggingConfig::default()
            .with_format(LogFormat::Compact)
            .with_filter("logging_integration=debug")
            .with_logger_sink(host.clone()),
    )
    .expect("first init succeeds");

    tracing::debug!(song_id = "s1", "Window slot filled");
    tracing::info!(
        song_id = "s1",
        stream_url = "https://music.test/rest/stream?id=s1&u=me&t=abc&s=xyz",
        salt = "xyz",
        "Stream resolved"
    );

    {
        let entries = host.0.lock().unwrap();
        assert_eq!(entries.len(), 1, "debug entries stay below the sink level");
        let entry = &entries[0];
        assert_eq!(entry.message, "Stream resolved");
        assert_eq!(entry.fields["stream_url"], "https://music.test/rest/stream");
        assert_eq!(entry.fields["salt"], "[REDACTED]");
        assert_eq!(entry.fields["song_id"], "s1");
    }

    let again = init_logging(LoggingConfig::default());
    assert!(matches!(again, Err(Error::Config(_))));
}
