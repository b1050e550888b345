use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is not set. An explicit level applies to this
/// crate only; dependencies stay at `info`.
fn default_filter(verbose: bool, level: Option<&str>) -> EnvFilter {
    let directives = match (verbose, level) {
        (true, _) => "formatkit=debug,info".to_string(),
        (false, Some(level)) => format!("formatkit={level},info"),
        (false, None) => "formatkit=info".to_string(),
    };
    EnvFilter::new(directives)
}

pub fn init_logger(verbose: bool, json: bool, level: Option<&str>) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(verbose, level));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false)
                    .json(),
            )
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false)
                    .compact(),
            )
            .init();
    }
}
