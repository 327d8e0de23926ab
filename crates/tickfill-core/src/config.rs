//! Explicit configuration for the fetcher.
//!
//! Values are layered: environment variables provide defaults and
//! command-line flags override them. Nothing is read from global state after
//! a [`FetcherConfig`] is built.
//!
//! | Variable | Meaning |
//! |----------|---------|
//! | `TICKFILL_ENDPOINT` | URL template with `{start_date}` and `{end_date}` |
//! | `TICKFILL_API_KEY` | API key; sent as a bearer token unless a header is named |
//! | `TICKFILL_API_KEY_HEADER` | Header carrying the API key instead of `Authorization` |
//! | `TICKFILL_TIMEOUT_MS` | Per-request timeout |
//! | `TICKFILL_MAX_REQUESTS_PER_MINUTE` | Optional fetch pacing |

use std::env;
use std::num::NonZeroU32;

use thiserror::Error;

use crate::http_client::HttpAuth;

pub const START_DATE_PLACEHOLDER: &str = "{start_date}";
pub const END_DATE_PLACEHOLDER: &str = "{end_date}";
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Invalid or missing configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("no endpoint configured; pass --endpoint or set TICKFILL_ENDPOINT")]
    MissingEndpoint,
    #[error("endpoint template '{template}' is invalid: {reason}")]
    InvalidTemplate { template: String, reason: String },
    #[error("invalid value for {name}: '{value}'")]
    InvalidValue { name: &'static str, value: String },
}

/// Validated fetcher configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetcherConfig {
    pub endpoint_template: String,
    pub auth: HttpAuth,
    pub timeout_ms: u64,
    pub max_requests_per_minute: Option<NonZeroU32>,
}

impl FetcherConfig {
    /// Configuration with no auth, the default timeout and no pacing.
    pub fn new(endpoint_template: impl Into<String>) -> Result<Self, ConfigError> {
        let endpoint_template = endpoint_template.into();
        validate_template(&endpoint_template)?;
        Ok(Self {
            endpoint_template,
            auth: HttpAuth::None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_requests_per_minute: None,
        })
    }

    pub fn with_auth(mut self, auth: HttpAuth) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_max_requests_per_minute(mut self, limit: Option<NonZeroU32>) -> Self {
        self.max_requests_per_minute = limit;
        self
    }
}

/// Partially specified fetcher settings from one configuration layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetcherSettings {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub api_key_header: Option<String>,
    pub timeout_ms: Option<u64>,
    pub max_requests_per_minute: Option<u32>,
}

impl FetcherSettings {
    /// Read the `TICKFILL_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Read settings through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        Ok(Self {
            endpoint: read("TICKFILL_ENDPOINT"),
            api_key: read("TICKFILL_API_KEY"),
            api_key_header: read("TICKFILL_API_KEY_HEADER"),
            timeout_ms: read("TICKFILL_TIMEOUT_MS")
                .map(|value| parse_number("TICKFILL_TIMEOUT_MS", &value))
                .transpose()?,
            max_requests_per_minute: read("TICKFILL_MAX_REQUESTS_PER_MINUTE")
                .map(|value| parse_number("TICKFILL_MAX_REQUESTS_PER_MINUTE", &value))
                .transpose()?,
        })
    }

    /// Layer `overrides` on top of `self`; set fields in `overrides` win.
    pub fn merge(self, overrides: Self) -> Self {
        Self {
            endpoint: overrides.endpoint.or(self.endpoint),
            api_key: overrides.api_key.or(self.api_key),
            api_key_header: overrides.api_key_header.or(self.api_key_header),
            timeout_ms: overrides.timeout_ms.or(self.timeout_ms),
            max_requests_per_minute: overrides
                .max_requests_per_minute
                .or(self.max_requests_per_minute),
        }
    }

    pub fn build(self) -> Result<FetcherConfig, ConfigError> {
        let endpoint = self.endpoint.ok_or(ConfigError::MissingEndpoint)?;

        let auth = match (self.api_key, self.api_key_header) {
            (None, _) => HttpAuth::None,
            (Some(key), None) => HttpAuth::BearerToken(key),
            (Some(key), Some(name)) => HttpAuth::Header { name, value: key },
        };

        let timeout_ms = self.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS);
        if timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                name: "timeout_ms",
                value: String::from("0"),
            });
        }

        let max_requests_per_minute = match self.max_requests_per_minute {
            None => None,
            Some(limit) => Some(NonZeroU32::new(limit).ok_or(ConfigError::InvalidValue {
                name: "max_requests_per_minute",
                value: limit.to_string(),
            })?),
        };

        Ok(FetcherConfig::new(endpoint)?
            .with_auth(auth)
            .with_timeout_ms(timeout_ms)
            .with_max_requests_per_minute(max_requests_per_minute))
    }
}

fn parse_number<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| ConfigError::InvalidValue {
            name,
            value: value.to_owned(),
        })
}

fn validate_template(template: &str) -> Result<(), ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidTemplate {
        template: template.to_owned(),
        reason: reason.to_owned(),
    };

    if !(template.starts_with("http://") || template.starts_with("https://")) {
        return Err(invalid("must start with http:// or https://"));
    }
    if !template.contains(START_DATE_PLACEHOLDER) {
        return Err(invalid("missing {start_date} placeholder"));
    }
    if !template.contains(END_DATE_PLACEHOLDER) {
        return Err(invalid("missing {end_date} placeholder"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const TEMPLATE: &str = "https://data.example.test/history?from={start_date}&to={end_date}";

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn flags_override_environment() {
        let env = FetcherSettings::from_lookup(lookup(&[
            ("TICKFILL_ENDPOINT", "https://env.example.test/h?s={start_date}&e={end_date}"),
            ("TICKFILL_API_KEY", "env-key"),
            ("TICKFILL_TIMEOUT_MS", "1500"),
        ]))
        .expect("env settings");

        let config = env
            .merge(FetcherSettings {
                endpoint: Some(TEMPLATE.to_owned()),
                ..FetcherSettings::default()
            })
            .build()
            .expect("config");

        assert_eq!(config.endpoint_template, TEMPLATE);
        assert_eq!(config.auth, HttpAuth::BearerToken(String::from("env-key")));
        assert_eq!(config.timeout_ms, 1500);
        assert_eq!(config.max_requests_per_minute, None);
    }

    #[test]
    fn api_key_header_switches_auth_mode() {
        let config = FetcherSettings {
            endpoint: Some(TEMPLATE.to_owned()),
            api_key: Some(String::from("secret")),
            api_key_header: Some(String::from("X-API-Key")),
            ..FetcherSettings::default()
        }
        .build()
        .expect("config");

        assert_eq!(
            config.auth,
            HttpAuth::Header {
                name: String::from("X-API-Key"),
                value: String::from("secret"),
            }
        );
    }

    #[test]
    fn missing_endpoint_is_reported() {
        let error = FetcherSettings::default().build().expect_err("must fail");
        assert_eq!(error, ConfigError::MissingEndpoint);
    }

    #[test]
    fn template_requires_both_placeholders() {
        let error = FetcherConfig::new("https://data.example.test/history?from={start_date}")
            .expect_err("must fail");
        assert!(matches!(error, ConfigError::InvalidTemplate { .. }));

        let error = FetcherConfig::new("ftp://data.example.test/{start_date}/{end_date}")
            .expect_err("must fail");
        assert!(matches!(error, ConfigError::InvalidTemplate { .. }));
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        let error = FetcherSettings::from_lookup(lookup(&[("TICKFILL_TIMEOUT_MS", "soon")]))
            .expect_err("must fail");
        assert_eq!(
            error,
            ConfigError::InvalidValue {
                name: "TICKFILL_TIMEOUT_MS",
                value: String::from("soon"),
            }
        );

        let error = FetcherSettings {
            endpoint: Some(TEMPLATE.to_owned()),
            max_requests_per_minute: Some(0),
            ..FetcherSettings::default()
        }
        .build()
        .expect_err("zero pacing must fail");
        assert!(matches!(error, ConfigError::InvalidValue { .. }));
    }
}
