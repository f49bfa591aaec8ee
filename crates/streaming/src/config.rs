use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_LIVE_URL: &str = "ws://localhost:8000/live";

/// Timing and policy knobs for [`crate::LiveSyncController`].
#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    /// Interval between full re-fetches once the session is polling.
    pub poll_interval: Duration,
    /// Fixed wait before each reopen attempt of the live channel.
    pub reconnect_delay: Duration,
    /// Consecutive failed opens tolerated before polling takes over for good.
    pub max_connect_failures: u32,
    /// First bootstrap retry delay; doubles per consecutive failure.
    pub bootstrap_backoff: Duration,
    pub bootstrap_backoff_max: Duration,
    /// Re-fetch the full snapshot after every applied push.
    pub refresh_on_push: bool,
    /// Upper bound on a single snapshot or election request.
    pub fetch_timeout: Duration,
    /// Upper bound on opening the live channel.
    pub connect_timeout: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            reconnect_delay: Duration::from_secs(3),
            max_connect_failures: 3,
            bootstrap_backoff: Duration::from_secs(1),
            bootstrap_backoff_max: Duration::from_secs(60),
            refresh_on_push: true,
            fetch_timeout: Duration::from_secs(15),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl SyncConfig {
    /// Defaults overridden by `PSI_*` environment variables. Unparseable
    /// values are ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(secs) = env_parse::<f64>("PSI_POLL_INTERVAL_S") {
            config.poll_interval = secs_to_duration(secs, config.poll_interval);
        }
        if let Some(secs) = env_parse::<f64>("PSI_RECONNECT_DELAY_S") {
            config.reconnect_delay = secs_to_duration(secs, config.reconnect_delay);
        }
        if let Some(n) = env_parse::<u32>("PSI_MAX_CONNECT_FAILURES") {
            config.max_connect_failures = n.max(1);
        }
        if let Some(secs) = env_parse::<f64>("PSI_BOOTSTRAP_BACKOFF_S") {
            config.bootstrap_backoff = secs_to_duration(secs, config.bootstrap_backoff);
        }
        if let Some(secs) = env_parse::<f64>("PSI_FETCH_TIMEOUT_S") {
            config.fetch_timeout = secs_to_duration(secs, config.fetch_timeout);
        }
        if let Some(secs) = env_parse::<f64>("PSI_CONNECT_TIMEOUT_S") {
            config.connect_timeout = secs_to_duration(secs, config.connect_timeout);
        }
        if let Some(flag) = std::env::var("PSI_REFRESH_ON_PUSH").ok().and_then(|v| parse_flag(&v)) {
            config.refresh_on_push = flag;
        }
        config
    }

    /// Delay before bootstrap attempt `failures + 1`: `base * 2^(failures-1)`,
    /// capped at `bootstrap_backoff_max`.
    pub fn bootstrap_delay(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(16) as i32;
        let secs = self.bootstrap_backoff.as_secs_f64() * 2.0_f64.powi(exponent);
        Duration::from_secs_f64(secs.min(self.bootstrap_backoff_max.as_secs_f64()))
    }
}

/// Where the snapshot API and the live channel live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub api_base: String,
    pub live_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_URL.to_string(),
            live_url: DEFAULT_LIVE_URL.to_string(),
        }
    }
}

impl Endpoints {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_base: std::env::var("PSI_API_URL").unwrap_or(defaults.api_base),
            live_url: std::env::var("PSI_WS_URL").unwrap_or(defaults.live_url),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.api_base.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse::<T>().ok())
}

fn secs_to_duration(secs: f64, fallback: Duration) -> Duration {
    if secs.is_finite() && secs >= 0.0 {
        Duration::from_secs_f64(secs)
    } else {
        fallback
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_dashboard_behaviour() {
        let c = SyncConfig::default();
        assert_eq!(c.poll_interval, Duration::from_secs(10));
        assert_eq!(c.max_connect_failures, 3);
        assert!(c.refresh_on_push);
        assert_eq!(c.fetch_timeout, Duration::from_secs(15));
        assert_eq!(c.connect_timeout, Duration::from_secs(10));
    }

    #[test]
    fn bootstrap_delay_doubles_and_caps() {
        let c = SyncConfig {
            bootstrap_backoff: Duration::from_secs(2),
            bootstrap_backoff_max: Duration::from_secs(20),
            ..SyncConfig::default()
        };
        assert_eq!(c.bootstrap_delay(0), Duration::from_secs(2));
        assert_eq!(c.bootstrap_delay(1), Duration::from_secs(2));
        assert_eq!(c.bootstrap_delay(2), Duration::from_secs(4));
        assert_eq!(c.bootstrap_delay(4), Duration::from_secs(16));
        assert_eq!(c.bootstrap_delay(5), Duration::from_secs(20));
        assert_eq!(c.bootstrap_delay(u32::MAX), Duration::from_secs(20));
    }

    #[test]
    fn endpoint_urls_join_cleanly() {
        let e = Endpoints {
            api_base: "http://psi.local:8000/".into(),
            live_url: DEFAULT_LIVE_URL.into(),
        };
        assert_eq!(e.url("/countries"), "http://psi.local:8000/countries");
        assert_eq!(e.url("country/7"), "http://psi.local:8000/country/7");
    }

    #[test]
    fn flags_accept_common_spellings() {
        assert_eq!(parse_flag(" TRUE "), Some(true));
        assert_eq!(parse_flag("off"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    fn negative_durations_fall_back() {
        let fallback = Duration::from_secs(5);
        assert_eq!(secs_to_duration(-1.0, fallback), fallback);
        assert_eq!(secs_to_duration(f64::NAN, fallback), fallback);
        assert_eq!(secs_to_duration(0.5, fallback), Duration::from_millis(500));
    }
}
