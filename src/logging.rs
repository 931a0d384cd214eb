use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use tracing_subscriber::fmt::SubscriberBuilder;

/// Install the global subscriber.
///
/// `RUST_LOG` wins over the verbosity count. Logs go to stderr so stdout
/// only carries the streamed answer, or to `log_file` when given.
pub fn setup_logging(verbose_level: u8, log_file: Option<&Path>) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::EnvFilter::from_default_env()
    } else {
        let filter_str = match verbose_level {
            0 => "warn,chat_stream=info,stream_core=info",
            1 => "info,chat_stream=debug,stream_core=debug",
            _ => "debug,chat_stream=trace,stream_core=trace",
        };
        tracing_subscriber::EnvFilter::new(filter_str)
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .with_level(true);

    let Some(path) = log_file else {
        let subscriber: SubscriberBuilder<_, _, _, fn() -> Box<dyn io::Write + Send>> =
            subscriber.with_writer(|| Box::new(io::stderr()) as Box<dyn io::Write + Send>);
        subscriber.init();
        return Ok(());
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory: {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file: {}", path.display()))?;

    subscriber
        .with_ansi(false)
        .with_writer(std::sync::Mutex::new(file))
        .init();
    Ok(())
}
