use std::sync::OnceLock;

static ENABLED: OnceLock<bool> = OnceLock::new();

fn enabled() -> bool {
    *ENABLED.get_or_init(|| {
        std::env::var("ST_SEARCH_TRACE")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    })
}

/// One line per plan request when `ST_SEARCH_TRACE=1` is set.
pub fn plan_line(dim: usize, routine: &str, nodes: u64, outcome: &str) {
    if enabled() {
        eprintln!("[plan] dim={dim} routine={routine} nodes={nodes} outcome={outcome}");
    }
}
