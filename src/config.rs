//! Process configuration, read from the environment.

use figment::Figment;
use figment::providers::Env;
use fundu::{DurationParser, TimeUnit};
use serde::{Deserialize, Deserializer};
use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration. Every key has a default except `DATABASE_URL` and
/// `PATTERNS_FILE`, which are optional.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Postgres connection string; records are kept in memory when unset.
    #[serde(default)]
    pub database_url: Option<String>,

    #[serde(default = "default_source_base_url")]
    pub source_base_url: String,
    #[serde(default = "default_source_list_path")]
    pub source_list_path: String,
    #[serde(default = "default_source_page_size")]
    pub source_page_size: u32,

    #[serde(default = "default_poll_interval", deserialize_with = "deserialize_duration")]
    pub poll_interval: Duration,
    #[serde(
        default = "default_supplementary_interval",
        deserialize_with = "deserialize_duration"
    )]
    pub supplementary_interval: Duration,
    #[serde(default = "default_page_cap")]
    pub page_cap: u32,
    #[serde(default = "default_page_delay", deserialize_with = "deserialize_duration")]
    pub page_delay: Duration,
    #[serde(default = "default_request_timeout", deserialize_with = "deserialize_duration")]
    pub request_timeout: Duration,
    #[serde(default = "default_recency_days")]
    pub recency_days: u32,

    /// TOML file overriding the built-in extraction patterns.
    #[serde(default)]
    pub patterns_file: Option<PathBuf>,

    #[serde(default = "default_shutdown_timeout", deserialize_with = "deserialize_duration")]
    pub shutdown_timeout: Duration,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_source_base_url() -> String {
    "https://www.safe182.go.kr".to_string()
}

fn default_source_list_path() -> String {
    "/home/lcm/lcmMssList.do".to_string()
}

fn default_source_page_size() -> u32 {
    10
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(5 * 60)
}

fn default_supplementary_interval() -> Duration {
    Duration::from_secs(30 * 60)
}

fn default_page_cap() -> u32 {
    3
}

fn default_page_delay() -> Duration {
    Duration::from_millis(500)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(15)
}

fn default_recency_days() -> u32 {
    90
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(8)
}

impl Config {
    /// Load from the raw process environment (`PORT`, `POLL_INTERVAL`, ...).
    pub fn load() -> Result<Self, figment::Error> {
        Self::from_figment(Figment::new().merge(Env::raw()))
    }

    pub fn from_figment(figment: Figment) -> Result<Self, figment::Error> {
        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would only fail once the scheduler is running.
    fn validate(&self) -> Result<(), figment::Error> {
        let zero = [
            ("poll_interval", self.poll_interval.is_zero()),
            ("supplementary_interval", self.supplementary_interval.is_zero()),
            ("page_cap", self.page_cap == 0),
            ("recency_days", self.recency_days == 0),
        ];
        match zero.iter().find(|(_, is_zero)| *is_zero) {
            Some((key, _)) => Err(figment::Error::from(format!("{key} must be greater than zero"))),
            None => Ok(()),
        }
    }
}

const DURATION_UNITS: &[TimeUnit] = &[
    TimeUnit::MilliSecond,
    TimeUnit::Second,
    TimeUnit::Minute,
    TimeUnit::Hour,
];

/// Parse `500ms`, `15s`, `5m`, or a bare number of seconds.
pub fn parse_duration(value: &str) -> Result<Duration, String> {
    let parsed = DurationParser::with_time_units(DURATION_UNITS)
        .parse(value.trim())
        .map_err(|e| format!("invalid duration {value:?}: {e}"))?;
    Duration::try_from(parsed).map_err(|e| format!("invalid duration {value:?}: {e}"))
}

/// Accepts an integer number of seconds or a duration string.
fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::{self, Visitor};

    struct DurationVisitor;

    impl Visitor<'_> for DurationVisitor {
        type Value = Duration;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a duration such as \"500ms\" or a number of seconds")
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> Result<Duration, E> {
            Ok(Duration::from_secs(value))
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> Result<Duration, E> {
            u64::try_from(value)
                .map(Duration::from_secs)
                .map_err(|_| E::custom(format!("duration cannot be negative: {value}")))
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<Duration, E> {
            parse_duration(value).map_err(E::custom)
        }
    }

    deserializer.deserialize_any(DurationVisitor)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(pairs: &[(&str, &str)]) -> Result<Config, figment::Error> {
        let figment = pairs
            .iter()
            .fold(Figment::new(), |f, (k, v)| f.merge((*k, *v)));
        Config::from_figment(figment)
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.poll_interval, Duration::from_secs(300));
        assert_eq!(config.supplementary_interval, Duration::from_secs(1800));
        assert_eq!(config.page_cap, 3);
        assert_eq!(config.page_delay, Duration::from_millis(500));
        assert_eq!(config.request_timeout, Duration::from_secs(15));
        assert_eq!(config.recency_days, 90);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(8));
        assert!(config.database_url.is_none());
        assert!(config.patterns_file.is_none());
    }

    #[test]
    fn test_duration_strings() {
        let config = config(&[("poll_interval", "90s"), ("page_delay", "250ms")]).unwrap();
        assert_eq!(config.poll_interval, Duration::from_secs(90));
        assert_eq!(config.page_delay, Duration::from_millis(250));
    }

    #[test]
    fn test_duration_integer_seconds() {
        let figment = Figment::new().merge(("request_timeout", 20));
        let config = Config::from_figment(figment).unwrap();
        assert_eq!(config.request_timeout, Duration::from_secs(20));
    }

    #[test]
    fn test_invalid_duration_is_an_error() {
        assert!(config(&[("poll_interval", "soon")]).is_err());
    }

    #[test]
    fn test_zero_values_are_rejected() {
        for key in ["poll_interval", "supplementary_interval"] {
            let err = config(&[(key, "0s")]).unwrap_err();
            assert!(err.to_string().contains(key), "{err}");
        }
        let err = Config::from_figment(Figment::new().merge(("supplementary_interval", 0))).unwrap_err();
        assert!(err.to_string().contains("supplementary_interval"));
        for key in ["page_cap", "recency_days"] {
            let err = Config::from_figment(Figment::new().merge((key, 0))).unwrap_err();
            assert!(err.to_string().contains(key), "{err}");
        }
    }

    #[test]
    fn test_nonzero_values_are_accepted() {
        let config = config(&[("poll_interval", "1s"), ("page_delay", "0ms")]).unwrap();
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert!(config.page_delay.is_zero());
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("5m"), Ok(Duration::from_secs(300)));
        assert_eq!(parse_duration("2h"), Ok(Duration::from_secs(7200)));
        assert_eq!(parse_duration("45"), Ok(Duration::from_secs(45)));
        assert!(parse_duration("-3s").is_err());
    }
}
