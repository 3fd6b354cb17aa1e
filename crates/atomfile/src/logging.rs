//! Shared logging initialization for processes using atomfile.
//!
//! `ATOMFILE_LOG` takes either a bare level, which applies to this crate's
//! events while everything else stays at `warn`, or a full filter directive
//! list such as `atomfile=trace,mygame=info` that is used as given.

use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;

static INIT: OnceLock<()> = OnceLock::new();

const CRATE_TARGET: &str = env!("CARGO_CRATE_NAME");

fn parse_level(raw: Option<&str>) -> &'static str {
    match raw.unwrap_or("info").trim().to_ascii_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "warn" => "warn",
        "error" => "error",
        "off" => "off",
        _ => "info",
    }
}

/// Filter directives for a raw `ATOMFILE_LOG` value.
fn directives(raw: Option<&str>) -> String {
    match raw {
        Some(list) if list.contains('=') => list.trim().to_string(),
        _ => format!("warn,{CRATE_TARGET}={}", parse_level(raw)),
    }
}

/// Initialize process-level tracing output from `ATOMFILE_LOG`.
///
/// This is safe to call multiple times; only the first call initializes the
/// subscriber. It is best-effort and never returns an error, so a host that
/// installed its own subscriber keeps it.
pub fn init() {
    if INIT.get().is_some() {
        return;
    }
    let filter = EnvFilter::new(directives(std::env::var("ATOMFILE_LOG").ok().as_deref()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
    let _ = INIT.set(());
}
