//! Configuration for the gateway client.
//!
//! Use the defaults, a TOML document, or override via environment
//! variables:
//!
//! - `GATEWAY_ADDR`                  (default: "127.0.0.1:4002")
//! - `GATEWAY_CLIENT_ID`             (default: random positive id)
//! - `GATEWAY_CONNECT_OPTIONS`       (default: "")
//! - `GATEWAY_OPTIONAL_CAPABILITIES` (default: "")
//! - `GATEWAY_TZ_OFFSET_MINUTES`     (default: "0")
//! - `GATEWAY_REQUEST_TIMEOUT_MS`    (default: unset, `0` also means no local timeout)

use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use chrono::FixedOffset;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::ClientError;

/// Client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Gateway `host:port`.
    pub address: String,

    /// Fixed client id; a random positive 31-bit id when unset.
    pub client_id: Option<i32>,

    /// Appended to the handshake version range (e.g. `+PACEAPI`).
    pub connect_options: String,

    /// Capability string sent with StartAPI.
    pub optional_capabilities: String,

    /// Offset applied to zone-less timestamps from the gateway.
    pub tz_offset_minutes: i32,

    /// Bound on a single TCP dial (also per redirect hop).
    #[serde(with = "duration_ms")]
    pub dial_timeout: Duration,

    /// Bound on the whole connect sequence, redirects included.
    #[serde(with = "duration_ms")]
    pub connect_timeout: Duration,

    /// Bound on each socket write.
    #[serde(with = "duration_ms")]
    pub write_timeout: Duration,

    /// Bound on one request/response round trip; `None` waits for the
    /// gateway (or the connection) indefinitely. `0` in TOML or the
    /// environment means `None`.
    #[serde(with = "optional_duration_ms", skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            address: "127.0.0.1:4002".to_string(),
            client_id: None,
            connect_options: String::new(),
            optional_capabilities: String::new(),
            tz_offset_minutes: 0,
            dial_timeout: Duration::from_secs(3),
            connect_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(5),
            request_timeout: None,
        }
    }
}

impl ClientConfig {
    /// Defaults with the given address.
    pub fn new(address: impl Into<String>) -> Self {
        ClientConfig {
            address: address.into(),
            ..Default::default()
        }
    }

    /// Construct a `ClientConfig` from environment variables, falling back
    /// to defaults.
    pub fn from_env() -> Result<Self, ClientError> {
        let defaults = ClientConfig::default();

        let address = env::var("GATEWAY_ADDR").unwrap_or(defaults.address);
        let client_id = match env::var("GATEWAY_CLIENT_ID") {
            Ok(raw) => Some(parse_value("GATEWAY_CLIENT_ID", &raw)?),
            Err(_) => None,
        };
        let connect_options =
            env::var("GATEWAY_CONNECT_OPTIONS").unwrap_or(defaults.connect_options);
        let optional_capabilities =
            env::var("GATEWAY_OPTIONAL_CAPABILITIES").unwrap_or(defaults.optional_capabilities);
        let tz_offset_minutes = read_env_or_default("GATEWAY_TZ_OFFSET_MINUTES", 0i32)?;
        let request_timeout_ms = read_env_or_default("GATEWAY_REQUEST_TIMEOUT_MS", 0u64)?;

        let config = ClientConfig {
            address,
            client_id,
            connect_options,
            optional_capabilities,
            tz_offset_minutes,
            request_timeout: optional_duration_ms::from_millis(request_timeout_ms),
            ..defaults
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document; missing keys take their defaults.
    pub fn from_toml_str(doc: &str) -> Result<Self, ClientError> {
        let config: ClientConfig =
            toml::from_str(doc).map_err(|e| ClientError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_client_id(mut self, client_id: i32) -> Self {
        self.client_id = Some(client_id);
        self
    }

    pub fn with_connect_options(mut self, options: impl Into<String>) -> Self {
        self.connect_options = options.into();
        self
    }

    pub fn with_optional_capabilities(mut self, capabilities: impl Into<String>) -> Self {
        self.optional_capabilities = capabilities.into();
        self
    }

    pub fn with_tz_offset_minutes(mut self, minutes: i32) -> Self {
        self.tz_offset_minutes = minutes;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn without_request_timeout(mut self) -> Self {
        self.request_timeout = None;
        self
    }

    /// Reject values the connect sequence cannot work with.
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.address.trim().is_empty() {
            return Err(ClientError::Config("address is empty".to_string()));
        }
        if let Some(id) = self.client_id {
            if id < 0 {
                return Err(ClientError::Config(format!("client id {id} is negative")));
            }
        }
        if self.request_timeout == Some(Duration::ZERO) {
            return Err(ClientError::Config(
                "request timeout of zero; leave it unset to wait indefinitely".to_string(),
            ));
        }
        self.tz_offset()?;
        Ok(())
    }

    /// `tz_offset_minutes` as a chrono offset.
    pub fn tz_offset(&self) -> Result<FixedOffset, ClientError> {
        self.tz_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| {
                ClientError::Config(format!(
                    "timezone offset of {} minutes is out of range",
                    self.tz_offset_minutes
                ))
            })
    }

    /// The configured client id, or a fresh random positive one.
    pub fn resolve_client_id(&self) -> i32 {
        self.client_id
            .unwrap_or_else(|| rand::thread_rng().gen_range(1..=i32::MAX))
    }
}

fn read_env_or_default<T>(key: &str, default: T) -> Result<T, ClientError>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(key) {
        Ok(val) => parse_value(key, &val),
        Err(_) => Ok(default),
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ClientError>
where
    T: FromStr,
    T::Err: Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| ClientError::Config(format!("{key}={raw:?}: {e}")))
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Like `duration_ms`, with `0` standing for "no timeout".
mod optional_duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn from_millis(ms: u64) -> Option<Duration> {
        (ms > 0).then(|| Duration::from_millis(ms))
    }

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.map_or(0, |d| d.as_millis() as u64))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        u64::deserialize(deserializer).map(from_millis)
    }
}
