/// Initialize tracing with an env-filter layer.
///
/// Honors `RUST_LOG` when set, otherwise defaults to `teal_archive=info`.
/// Intended for binaries and test harnesses embedding this crate; calling it
/// twice panics (the global subscriber can only be set once).
pub fn init() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "teal_archive=info".into()),
        )
        .init();
}
