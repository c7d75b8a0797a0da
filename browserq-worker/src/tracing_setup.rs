use tracing_subscriber::EnvFilter;

/// Install the global subscriber from the logging section.
///
/// `RUST_LOG`, when set, replaces the configured level.
pub fn install_tracing_from_config(cfg: &browserq_config::LoggingConfig) {
    use tracing_subscriber::fmt::time::ChronoUtc;

    let env_filter_str = std::env::var("RUST_LOG").unwrap_or_else(|_| cfg.level.clone());
    let env_filter = EnvFilter::new(&env_filter_str);

    if cfg.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_timer(ChronoUtc::rfc_3339())
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_timer(ChronoUtc::rfc_3339())
            .init();
    }
}
