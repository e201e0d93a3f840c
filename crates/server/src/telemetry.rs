use anyhow::{Context, Result};
use tracing::Subscriber;
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_subscriber::{fmt::MakeWriter, layer::SubscriberExt, EnvFilter, Registry};

/// Bunyan JSON subscriber writing to `sink`.
pub fn subscriber<W>(service_name: &str, filter: EnvFilter, sink: W) -> impl Subscriber + Send + Sync
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    Registry::default()
        .with(filter)
        .with(JsonStorageLayer)
        .with(BunyanFormattingLayer::new(service_name.to_string(), sink))
}

/// Install the global subscriber: `RUST_LOG` filter (default `info`), bunyan
/// JSON lines on stderr. Stdout is reserved for `--scan` results.
pub fn init(service_name: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing::subscriber::set_global_default(subscriber(service_name, filter, std::io::stderr))
        .context("installing tracing subscriber")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Write};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn events_are_bunyan_json_on_the_given_sink() {
        let sink = Captured::default();
        let writer = sink.clone();
        let sub = subscriber("tallyscan-test", EnvFilter::new("info"), move || writer.clone());

        tracing::subscriber::with_default(sub, || {
            tracing::debug!("filtered out");
            tracing::info!(transactions = 2, "Receipt processed");
        });

        let out = String::from_utf8(sink.0.lock().unwrap().clone()).unwrap();
        let lines: Vec<serde_json::Value> = out
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["name"], "tallyscan-test");
        assert_eq!(lines[0]["msg"], "Receipt processed");
        assert_eq!(lines[0]["transactions"], 2);
        assert!(!out.contains("filtered out"));
    }
}
