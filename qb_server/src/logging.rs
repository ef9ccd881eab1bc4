//! Logging setup and structured event helpers.
//!
//! The server logs through `tracing`. The library logs through the `log`
//! facade; `tracing-subscriber` forwards those records into the same output.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Directives used when `RUST_LOG` is unset or unparsable
pub const DEFAULT_DIRECTIVES: &str = "info,sqlx=warn,hyper=warn";

fn filter_from(rust_log: Option<&str>) -> EnvFilter {
    rust_log
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_DIRECTIVES))
}

/// Install the global subscriber. Later calls are ignored.
///
/// ```no_run
/// qb_server::logging::init();
/// tracing::info!("ready");
/// ```
pub fn init() {
    let rust_log = std::env::var("RUST_LOG").ok();
    let installed = tracing_subscriber::registry()
        .with(filter_from(rust_log.as_deref()))
        .with(
            fmt::layer()
                .with_target(true)
                .with_file(true)
                .with_line_number(true),
        )
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!(directives = rust_log.as_deref().unwrap_or(DEFAULT_DIRECTIVES), "logging ready");
    }
}

/// Warn about a request that failed an authenticity or ownership check
///
/// ```
/// qb_server::logging::log_security_event("invalid_webhook_signature", None, "signature mismatch");
/// ```
pub fn log_security_event(event_type: &str, principal: Option<&str>, message: &str) {
    tracing::warn!(
        target: "security",
        event_type,
        principal = principal.unwrap_or("-"),
        "{message}"
    );
}

pub fn log_subscription_event(principal: &str, transition: &str, source: &str) {
    tracing::info!(target: "subscription", principal, transition, source, "subscription changed");
}
