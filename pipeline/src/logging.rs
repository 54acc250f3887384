//! Tracing setup for the pipeline binary.
//!
//! Stage start/finish lines are part of the user-visible contract, so the
//! default filter is `info` rather than `warn`. Output goes to stderr in
//! compact (timestamped) format; stdout is reserved for the no-changes
//! skip message.
//!
//! `RUST_LOG` overrides the default as usual:
//! ```bash
//! RUST_LOG=agent_pipeline=debug agent-pipeline
//! ```

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber. Reads `RUST_LOG`, defaults to `info`.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
