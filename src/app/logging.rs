// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use std::str::FromStr;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const QUIET_DEPENDENCIES: &str =
    "h2=info,hyper=info,hyper_util=info,reqwest=info,rustls=info,alloy_transport_http=info,alloy_pubsub=info";

/// Every `target:` the crate logs under, one per subsystem. Usable as
/// directive names, e.g. `info,tracker=debug`.
pub const LOG_TARGETS: &[&str] = &[
    "reconciler",
    "allowance",
    "tracker",
    "orchestrator",
    "routing",
    "wallet",
    "blocks",
    "config",
    "lucky",
    "notify",
    "retry",
    "token_manager",
];

/// Expand a bare level (e.g. "debug") with quiet defaults for chatty transport
/// crates. Directive strings containing ',' or '=' are used as given.
pub fn filter_spec(log_level: &str) -> String {
    let normalized = log_level.trim();
    if normalized.is_empty() {
        return format!("info,{QUIET_DEPENDENCIES}");
    }
    if normalized.contains(',') || normalized.contains('=') {
        normalized.to_string()
    } else {
        format!("{normalized},{QUIET_DEPENDENCIES}")
    }
}

pub fn setup_logging(log_level: &str, json_format: bool) {
    let spec = filter_spec(log_level);
    let filter = EnvFilter::from_str(&spec).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::registry().with(filter);

    let installed = if json_format {
        let json_layer = fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(false);
        subscriber.with(json_layer).try_init().is_ok()
    } else {
        let fmt_layer = fmt::layer().with_target(true).compact();
        subscriber.with(fmt_layer).try_init().is_ok()
    };

    if installed {
        let base = spec.split(',').next().unwrap_or("info");
        tracing::info!(
            target: "config",
            base,
            format = if json_format { "json" } else { "compact" },
            "Logging initialized"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_level_gets_dependency_defaults() {
        let spec = filter_spec("debug");
        assert!(spec.starts_with("debug,"));
        assert!(spec.contains("hyper=info"));
    }

    #[test]
    fn custom_directives_are_respected() {
        assert_eq!(filter_spec("warn,tracker=trace"), "warn,tracker=trace");
        assert!(filter_spec("  ").starts_with("info,"));
    }
}
