//! Process configuration (§10, ambient). Loaded once at startup from
//! environment variables with defaults for everything optional, grounded
//! on the teacher's `DnsConfig::from_env` shape (`if let Ok(v) =
//! std::env::var(...)` overrides atop a `Default` impl, then a single
//! `validate()` pass) but re-scoped to this forwarder's own option set.

use std::net::SocketAddr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::forwarder::Upstream;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_udp: SocketAddr,
    pub bind_tcp: SocketAddr,

    pub upstream_domestic: Vec<Upstream>,
    pub upstream_intl: Vec<Upstream>,
    pub upstream_ads_sink: Option<Upstream>,

    pub rules_domestic: Vec<String>,
    pub rules_intl: Vec<String>,
    pub rules_ads: Vec<String>,

    pub cache_enabled: bool,
    pub cache_max_entries: usize,
    pub cache_min_ttl: u32,
    pub cache_max_ttl: u32,

    pub subscriptions_enabled: bool,
    pub subscriptions_refresh_interval: Duration,
    pub subscriptions_max_concurrent: usize,
    pub subscriptions_max_errors: u32,

    pub admin_token: Option<String>,

    pub query_log_capacity: usize,
    pub handler_timeout: Duration,
    pub upstream_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_udp: "0.0.0.0:53".parse().unwrap(),
            bind_tcp: "0.0.0.0:53".parse().unwrap(),
            upstream_domestic: Vec::new(),
            upstream_intl: Vec::new(),
            upstream_ads_sink: None,
            rules_domestic: Vec::new(),
            rules_intl: Vec::new(),
            rules_ads: Vec::new(),
            cache_enabled: true,
            cache_max_entries: 10_000,
            cache_min_ttl: 60,
            cache_max_ttl: 86_400,
            subscriptions_enabled: true,
            subscriptions_refresh_interval: Duration::from_secs(21_600),
            subscriptions_max_concurrent: 4,
            subscriptions_max_errors: 10,
            admin_token: None,
            query_log_capacity: 1000,
            handler_timeout: Duration::from_millis(5000),
            upstream_timeout: Duration::from_millis(3000),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("BIND_UDP") {
            config.bind_udp = v
                .parse()
                .map_err(|e| ConfigError::InvalidBindAddress(v.clone(), format!("{e}")))?;
        }
        if let Ok(v) = std::env::var("BIND_TCP") {
            config.bind_tcp = v
                .parse()
                .map_err(|e| ConfigError::InvalidBindAddress(v.clone(), format!("{e}")))?;
        }

        if let Ok(v) = std::env::var("UPSTREAM_DOMESTIC") {
            config.upstream_domestic = parse_upstreams(&v)?;
        }
        if let Ok(v) = std::env::var("UPSTREAM_INTL") {
            config.upstream_intl = parse_upstreams(&v)?;
        }
        if let Ok(v) = std::env::var("UPSTREAM_ADS_SINK") {
            config.upstream_ads_sink = Some(
                Upstream::parse(v.trim()).map_err(ConfigError::InvalidUpstream)?,
            );
        }

        if let Ok(v) = std::env::var("RULES_DOMESTIC") {
            config.rules_domestic = split_csv(&v);
        }
        if let Ok(v) = std::env::var("RULES_INTL") {
            config.rules_intl = split_csv(&v);
        }
        if let Ok(v) = std::env::var("RULES_ADS") {
            config.rules_ads = split_csv(&v);
        }

        if let Ok(v) = std::env::var("CACHE_ENABLED") {
            config.cache_enabled = parse_bool(&v, "CACHE_ENABLED")?;
        }
        if let Ok(v) = std::env::var("CACHE_MAX_ENTRIES") {
            config.cache_max_entries = parse_int(&v, "CACHE_MAX_ENTRIES")?;
        }
        if let Ok(v) = std::env::var("CACHE_MIN_TTL") {
            config.cache_min_ttl = parse_int(&v, "CACHE_MIN_TTL")?;
        }
        if let Ok(v) = std::env::var("CACHE_MAX_TTL") {
            config.cache_max_ttl = parse_int(&v, "CACHE_MAX_TTL")?;
        }

        if let Ok(v) = std::env::var("SUBSCRIPTIONS_ENABLED") {
            config.subscriptions_enabled = parse_bool(&v, "SUBSCRIPTIONS_ENABLED")?;
        }
        if let Ok(v) = std::env::var("SUBSCRIPTIONS_REFRESH_INTERVAL") {
            config.subscriptions_refresh_interval =
                Duration::from_secs(parse_int(&v, "SUBSCRIPTIONS_REFRESH_INTERVAL")?);
        }
        if let Ok(v) = std::env::var("SUBSCRIPTIONS_MAX_CONCURRENT") {
            config.subscriptions_max_concurrent = parse_int(&v, "SUBSCRIPTIONS_MAX_CONCURRENT")?;
        }
        if let Ok(v) = std::env::var("SUBSCRIPTIONS_MAX_ERRORS") {
            config.subscriptions_max_errors = parse_int(&v, "SUBSCRIPTIONS_MAX_ERRORS")?;
        }

        if let Ok(v) = std::env::var("ADMIN_TOKEN") {
            config.admin_token = Some(v);
        }

        if let Ok(v) = std::env::var("QUERY_LOG_CAPACITY") {
            config.query_log_capacity = parse_int(&v, "QUERY_LOG_CAPACITY")?;
        }
        if let Ok(v) = std::env::var("HANDLER_TIMEOUT_MS") {
            config.handler_timeout = Duration::from_millis(parse_int(&v, "HANDLER_TIMEOUT_MS")?);
        }
        if let Ok(v) = std::env::var("UPSTREAM_TIMEOUT_MS") {
            config.upstream_timeout = Duration::from_millis(parse_int(&v, "UPSTREAM_TIMEOUT_MS")?);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_min_ttl > self.cache_max_ttl {
            return Err(ConfigError::InvalidTtlRange(self.cache_min_ttl, self.cache_max_ttl));
        }
        if self.subscriptions_max_concurrent == 0 {
            return Err(ConfigError::InvalidMaxConcurrent);
        }
        let has_rules = !self.rules_domestic.is_empty() || !self.rules_intl.is_empty();
        let has_upstreams = !self.upstream_domestic.is_empty() || !self.upstream_intl.is_empty();
        if has_rules && !has_upstreams {
            return Err(ConfigError::InvalidUpstream(
                "at least one domestic or international upstream is required when any rule set is non-empty".into(),
            ));
        }
        Ok(())
    }
}

fn split_csv(v: &str) -> Vec<String> {
    v.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect()
}

fn parse_upstreams(v: &str) -> Result<Vec<Upstream>, ConfigError> {
    split_csv(v)
        .into_iter()
        .map(|s| Upstream::parse(&s).map_err(ConfigError::InvalidUpstream))
        .collect()
}

fn parse_bool(v: &str, field: &str) -> Result<bool, ConfigError> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(ConfigError::ParseError(field.to_string(), v.to_string())),
    }
}

fn parse_int<T: std::str::FromStr>(v: &str, field: &str) -> Result<T, ConfigError> {
    v.trim()
        .parse()
        .map_err(|_| ConfigError::ParseError(field.to_string(), v.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn ttl_range_violation_is_rejected() {
        let mut config = Config::default();
        config.cache_min_ttl = 100;
        config.cache_max_ttl = 10;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidTtlRange(100, 10))));
    }

    #[test]
    fn rules_without_upstreams_is_rejected() {
        let mut config = Config::default();
        config.rules_domestic = vec!["example.com".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_max_concurrent_is_rejected() {
        let mut config = Config::default();
        config.subscriptions_max_concurrent = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidMaxConcurrent)));
    }
}
