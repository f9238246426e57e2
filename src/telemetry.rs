//! Tracing setup.
//!
//! - LOG_LEVEL sets the filter (e.g. "debug" or "info,smile_analytics=debug,sqlx=warn").
//! - LOG_FORMAT selects "pretty" (default) or "json".
//!
//! Logs go to stderr; stdout carries command output only.

use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let filter = EnvFilter::try_from_env("LOG_LEVEL")
        .unwrap_or_else(|_| EnvFilter::new("info,smile_analytics=info,sqlx=warn"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    match std::env::var("LOG_FORMAT").as_deref() {
        Ok("json") => builder.json().init(),
        _ => builder.init(),
    }
}
