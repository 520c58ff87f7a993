use crate::cli::LogFormat;
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber, writing to stderr
///
/// `RUST_LOG` takes precedence over the default `info` level. Calling this more
/// than once is harmless; later calls are ignored.
pub fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    let _ = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
