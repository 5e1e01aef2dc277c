use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use market::dexscreener::DEFAULT_BASE_URL;
use poller::types::DEFAULT_MAX_CONCURRENT_FETCHES;

#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Snapshot file holding every registered alert.
    pub alerts_file: PathBuf,

    // =========================
    // Price source
    // =========================
    /// Origin of the DexScreener API. Overridden in tests and when going
    /// through a caching proxy.
    pub dexscreener_url: String,

    /// End-to-end bound on a single HTTP request to the price source.
    ///
    /// The poller applies its own, longer, per-fetch timeout on top of this.
    pub http_timeout: Duration,

    /// Maximum number of price fetches in flight within one poll tick.
    pub max_concurrent_fetches: usize,

    // =========================
    // Delivery
    // =========================
    /// Discord webhook alerts are posted to. Alerts only go to the log when
    /// unset.
    pub discord_webhook_url: Option<String>,

    /// Role mentioned on every alert post, e.g. the `@vwap` role.
    pub alert_role_id: Option<String>,

    /// Emit JSON logs (`APP_ENV=production`).
    pub json_logs: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup. Unparseable numbers fall
    /// back to their defaults, empty strings count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        Self {
            alerts_file: get("ALERTS_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("alerts.json")),

            dexscreener_url: get("DEXSCREENER_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            http_timeout: Duration::from_secs(parse_or(get("HTTP_TIMEOUT_SECS"), 10)),
            max_concurrent_fetches: parse_or(
                get("MAX_CONCURRENT_FETCHES"),
                DEFAULT_MAX_CONCURRENT_FETCHES,
            )
            .max(1),

            discord_webhook_url: get("DISCORD_WEBHOOK_URL"),
            alert_role_id: get("ALERT_ROLE_ID"),
            json_logs: get("APP_ENV").is_some_and(|env| env.eq_ignore_ascii_case("production")),
        }
    }
}

fn parse_or<T: FromStr>(raw: Option<String>, default: T) -> T {
    raw.and_then(|v| v.parse().ok()).unwrap_or(default)
}
