use tracing::warn;

pub const ENV_PROFILE: &str = "WALLET_SESSION_PROFILE";
pub const ENV_PROXY_URL: &str = "WALLET_SESSION_EIP1193_PROXY_URL";
pub const ENV_REQUEST_TIMEOUT_MS: &str = "WALLET_SESSION_REQUEST_TIMEOUT_MS";
pub const ENV_POLL_INTERVAL_MS: &str = "WALLET_SESSION_POLL_INTERVAL_MS";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RuntimeProfile {
    /// Falls back to the in-memory deterministic provider.
    #[default]
    Development,
    /// A real wallet runtime is required; otherwise no provider is present.
    Production,
}

impl RuntimeProfile {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "dev" | "development" => Some(RuntimeProfile::Development),
            "prod" | "production" => Some(RuntimeProfile::Production),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionAdapterConfig {
    pub runtime_profile: RuntimeProfile,
    pub eip1193_proxy_url: Option<String>,
    pub request_timeout_ms: u64,
    pub event_poll_interval_ms: u64,
}

impl Default for SessionAdapterConfig {
    fn default() -> Self {
        Self {
            runtime_profile: RuntimeProfile::Development,
            eip1193_proxy_url: None,
            request_timeout_ms: 15_000,
            event_poll_interval_ms: 1_000,
        }
    }
}

impl SessionAdapterConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup; unparseable values keep
    /// their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();
        if let Some(raw) = lookup(ENV_PROFILE) {
            match RuntimeProfile::parse(&raw) {
                Some(profile) => cfg.runtime_profile = profile,
                None => warn!(value = %raw, "unknown {}; using development", ENV_PROFILE),
            }
        }
        cfg.eip1193_proxy_url = lookup(ENV_PROXY_URL)
            .map(|url| url.trim().to_owned())
            .filter(|url| !url.is_empty());
        if let Some(ms) = parse_ms(&lookup, ENV_REQUEST_TIMEOUT_MS) {
            cfg.request_timeout_ms = ms;
        }
        if let Some(ms) = parse_ms(&lookup, ENV_POLL_INTERVAL_MS) {
            cfg.event_poll_interval_ms = ms;
        }
        cfg
    }

    pub fn strict_runtime_required(&self) -> bool {
        self.runtime_profile == RuntimeProfile::Production
    }
}

fn parse_ms(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<u64> {
    let raw = lookup(key)?;
    match raw.trim().parse::<u64>() {
        Ok(ms) if ms > 0 => Some(ms),
        _ => {
            warn!(key, value = %raw, "ignoring invalid millisecond setting");
            None
        }
    }
}
