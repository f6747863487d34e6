//! Tracing initialisation for the binary.
//!
//! - `LEXIS_LOG` sets the filter (default `info,lexis=debug`).
//! - `LEXIS_LOG_FORMAT` selects `pretty` (default) or `json`.
//!
//! Logs go to stderr; stdout carries lesson output only.

use tracing_subscriber::EnvFilter;

pub const DEFAULT_FILTER: &str = "info,lexis=debug";

pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_env("LEXIS_LOG").unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    match std::env::var("LEXIS_LOG_FORMAT").as_deref() {
        Ok("json") => builder.json().init(),
        _ => builder.init(),
    }
}
