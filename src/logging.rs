use std::io::Write;

use tokio::sync::broadcast;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;
use tracing_subscriber::fmt::MakeWriter;

/// Capacity of the in-memory log fanout. Slow SSE readers miss old lines.
const LOG_CHANNEL_CAPACITY: usize = 500;

/// `MakeWriter` that tees formatted log lines into a broadcast channel
/// (for the dashboard's live log stream) while still printing to stdout.
#[derive(Clone)]
pub struct SseMakeWriter {
    sender: broadcast::Sender<String>,
}

impl SseMakeWriter {
    pub fn new(sender: broadcast::Sender<String>) -> Self {
        Self { sender }
    }
}

pub struct SseWriter {
    sender: broadcast::Sender<String>,
}

impl Write for SseWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let msg = String::from_utf8_lossy(buf).to_string();
        let _ = self.sender.send(msg); // Ignored if no receivers
        std::io::stdout().write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        std::io::stdout().flush()
    }
}

impl<'a> MakeWriter<'a> for SseMakeWriter {
    type Writer = SseWriter;

    fn make_writer(&'a self) -> Self::Writer {
        SseWriter {
            sender: self.sender.clone(),
        }
    }
}

/// Install the global subscriber and hand back the log fanout sender.
/// `SCRIPTSHED_DEBUG=1` lowers the level to DEBUG.
pub fn init() -> broadcast::Sender<String> {
    let (sender, _receiver) = broadcast::channel(LOG_CHANNEL_CAPACITY);
    let debug = std::env::var("SCRIPTSHED_DEBUG").is_ok_and(|v| v == "1");
    let level = if debug { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(SseMakeWriter::new(sender.clone()))
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();
    sender
}
