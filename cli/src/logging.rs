//! Initializes `tracing` with [`log_format::TextWithSpanIds`](crate::log_format)
//! and an env-filter driven by `RUST_LOG` (default `info`). Both the
//! exploration-runner and the admin binary call this first thing in `main`.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .event_format(crate::log_format::TextWithSpanIds::new())
        .with_writer(std::io::stderr);

    let _ = tracing_subscriber::registry().with(filter).with(fmt_layer).try_init();
}
