//! Tracing setup for the binary.

use tracing_subscriber::EnvFilter;

/// Pipeline, pool and process targets at debug; everything else (tower_http
/// request spans included) at info.
const DEFAULT_FILTER: &str = "info,quiz=debug,quiz_cache=debug,infraquiz=debug";

/// Install the global subscriber. `LOG_LEVEL` replaces the filter and
/// `LOG_FORMAT=json` switches to one flat JSON object per event.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let fmt = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    if json_requested(std::env::var("LOG_FORMAT").ok().as_deref()) {
        fmt.json().flatten_event(true).init();
    } else {
        fmt.compact().init();
    }
}

fn json_requested(format: Option<&str>) -> bool {
    format.is_some_and(|f| f.trim().eq_ignore_ascii_case("json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_json_selects_json_output() {
        assert!(json_requested(Some("json")));
        assert!(json_requested(Some(" JSON ")));
        assert!(!json_requested(Some("pretty")));
        assert!(!json_requested(None));
    }
}
