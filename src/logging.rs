#![forbid(unsafe_code)]

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Used when `RUST_LOG` is unset or blank. Binaries log under their own
/// target (`backend`, `auto_download`, `submit`), so they are listed next to
/// the library; everything else stays at `warn`.
const DEFAULT_FILTER: &str =
    "warn,musicapi_tools=info,backend=info,auto_download=info,submit=info";

/// Installs the global subscriber for a binary. A non-blank `RUST_LOG`
/// replaces the default filter entirely.
pub fn init() {
    let filter = build_filter(std::env::var("RUST_LOG").ok().as_deref());
    // A second call (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .try_init();
}

fn build_filter(rust_log: Option<&str>) -> EnvFilter {
    match rust_log.map(str::trim).filter(|value| !value.is_empty()) {
        Some(directives) => EnvFilter::builder().parse_lossy(directives),
        None => EnvFilter::new(DEFAULT_FILTER),
    }
}
