/// Logging initialization.
///
/// Writes to `<data_dir>/koomind.log` so that front-ends drawing on the terminal are not
/// interleaved with log output. Falls back to stderr if the file cannot be opened.
///
/// Default filter is `koomind_core=debug,info`; `RUST_LOG` overrides it.
pub fn init_logging(data_dir: &str) {
    use tracing_subscriber::prelude::*;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "koomind_core=debug,info".into());

    let log_path = std::path::Path::new(data_dir).join("koomind.log");
    let _ = std::fs::create_dir_all(data_dir);
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .ok();

    let stderr_layer = file.is_none().then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
    });
    let file_layer = file.map(|file| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .with_target(true)
    });

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init();
}
