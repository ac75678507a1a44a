//! Log subscriber setup.
//!
//! `LOG_LEVEL` takes standard `EnvFilter` directives. Events are emitted on the targets
//! "transcorrect" (startup, config), "correct" (model and analyzer results), "bank"
//! (imports, listings), "progress", "store" (document reads/writes) and "deck"
//! (generation diagnostics), so e.g. `LOG_LEVEL=info,correct=debug` narrows the output
//! to correction traffic. Per-request spans come from the router's TraceLayer.
//!
//! `LOG_FORMAT=json` switches to one JSON object per line; anything else is human readable.

use tracing_subscriber::EnvFilter;

const DEFAULT_DIRECTIVES: &str =
    "info,transcorrect=debug,transcorrect_backend=debug,correct=debug,bank=debug,tower_http=info,axum=info";

pub fn init_tracing() {
    let filter = EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    if wants_json(std::env::var("LOG_FORMAT").ok().as_deref()) {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn wants_json(format: Option<&str>) -> bool {
    format.is_some_and(|f| f.trim().eq_ignore_ascii_case("json"))
}
