use std::path::Path;
use std::sync::OnceLock;
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

/// Install the global subscriber. `RUST_LOG` wins over `level` when set.
pub fn init_logger(level: &str, to_file: bool, file_path: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let console_layer = fmt::layer()
        .with_target(false)
        .with_ansi(true)
        .with_writer(std::io::stdout);

    if !to_file {
        tracing_subscriber::registry()
            .with(filter)
            .with(console_layer)
            .init();
        return;
    }

    let path = Path::new(file_path);
    let dir = path.parent().unwrap_or_else(|| Path::new("./logs"));
    let name = path
        .file_name()
        .unwrap_or_else(|| std::ffi::OsStr::new("watcher.log"));
    let (non_blocking, guard) = tracing_appender::non_blocking(rolling::daily(dir, name));
    GUARD.set(guard).ok();

    let file_layer = fmt::layer()
        .with_target(true)
        .with_ansi(false)
        .with_writer(non_blocking);

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();
}
