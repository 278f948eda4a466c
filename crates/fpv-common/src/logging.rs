use tracing_subscriber::EnvFilter;

/// Initializes `tracing` the same way across all four daemons: `RUST_LOG`
/// if set, `info` otherwise, compact single-line formatting suited to
/// journald/syslog capture on an embedded router.
pub fn init(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.to_string()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .compact()
        .try_init();
}
