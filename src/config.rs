//! # Client configuration
//!
//! Limits, buffer sizes, the backoff policy and the default endpoint. Every field
//! has a default suited to a small device; a JSON document, for example one
//! stored as a `ConfigData` resource, can override any subset:
//!
//! ```rust
//! use libiotc::config::Config;
//!
//! let config = Config::from_json(br#"{"max_contexts": 4, "default_port": 443}"#).unwrap();
//! assert_eq!(config.max_contexts, 4);
//! assert_eq!(config.default_port, 443);
//! assert_eq!(config.io_buffer_size, 32);
//! ```

use heapless::{String, Vec};
use serde::Deserialize;

use crate::backoff::{DEFAULT_BACKOFF_TABLE, DEFAULT_DECAY_TABLE, MAX_BACKOFF_STEPS};
use crate::error::State;
use crate::mqtt::serializer::MAX_REMAINING_LENGTH;

/// Longest host name a configuration can name.
pub const HOST_MAX_LEN: usize = 128;

/// Longest resource name a configuration can name.
pub const RESOURCE_NAME_MAX_LEN: usize = 64;

/// Host used by [`Client::connect`](crate::client::Client::connect).
pub const DEFAULT_HOST: &str = "mqtt.googleapis.com";

/// Port used by [`Client::connect`](crate::client::Client::connect).
pub const DEFAULT_PORT: u16 = 8883;

/// Name of the root CA bundle in the resource store.
pub const DEFAULT_CA_RESOURCE: &str = "roots.pem";

/// Settings fixed for the lifetime of a [`Client`](crate::client::Client).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Number of connection contexts that can exist at once.
    pub max_contexts: usize,
    /// Number of timed tasks that can be scheduled at once.
    pub max_timed_tasks: usize,
    /// Size of each connection's TLS decode buffer.
    pub io_buffer_size: usize,
    /// Largest inbound packet body accepted by the parser.
    pub max_inbound_packet: usize,
    /// Reconnect delays, in seconds, indexed by the backoff penalty.
    pub backoff_table: Vec<u32, MAX_BACKOFF_STEPS>,
    /// Seconds spent at each penalty index before it decays.
    pub decay_table: Vec<u32, MAX_BACKOFF_STEPS>,
    /// Broker host used when none is supplied.
    pub default_host: String<HOST_MAX_LEN>,
    /// Broker port used when none is supplied.
    pub default_port: u16,
    /// Resource holding the root CA bundle.
    pub ca_resource: String<RESOURCE_NAME_MAX_LEN>,
}

fn bounded<const N: usize>(text: &str) -> String<N> {
    let mut out = String::new();
    let _ = out.push_str(text);
    out
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_contexts: 2,
            max_timed_tasks: 64,
            io_buffer_size: 32,
            max_inbound_packet: 64 * 1024,
            backoff_table: Vec::from_slice(&DEFAULT_BACKOFF_TABLE).unwrap_or_default(),
            decay_table: Vec::from_slice(&DEFAULT_DECAY_TABLE).unwrap_or_default(),
            default_host: bounded(DEFAULT_HOST),
            default_port: DEFAULT_PORT,
            ca_resource: bounded(DEFAULT_CA_RESOURCE),
        }
    }
}

impl Config {
    /// Parses a JSON object; absent fields keep their defaults.
    ///
    /// Fails with [`State::Serialization`] for malformed JSON and with
    /// [`State::InvalidParameter`] when the result does not [`validate`](Self::validate).
    pub fn from_json(json: &[u8]) -> Result<Self, State> {
        let (config, _) =
            serde_json_core::from_slice::<Config>(json).map_err(|_| State::Serialization)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the settings for consistency.
    ///
    /// The backoff and decay tables must be non-empty and of equal length, every
    /// limit must be non-zero and the inbound packet limit must be representable
    /// in MQTT.
    pub fn validate(&self) -> Result<(), State> {
        if self.backoff_table.is_empty() || self.backoff_table.len() != self.decay_table.len() {
            return Err(State::InvalidParameter);
        }
        if self.max_contexts == 0
            || self.max_timed_tasks == 0
            || self.io_buffer_size == 0
            || self.max_inbound_packet == 0
            || self.max_inbound_packet > MAX_REMAINING_LENGTH
        {
            return Err(State::InvalidParameter);
        }
        if self.default_host.is_empty() || self.ca_resource.is_empty() {
            return Err(State::InvalidParameter);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.backoff_table.len(), 10);
        assert_eq!(config.default_host.as_str(), DEFAULT_HOST);
    }

    #[test]
    fn test_tables_from_json() {
        let config = Config::from_json(br#"{"backoff_table":[1,2],"decay_table":[5,5]}"#).unwrap();
        assert_eq!(config.backoff_table.as_slice(), &[1, 2]);
        assert_eq!(config.ca_resource.as_str(), DEFAULT_CA_RESOURCE);
    }

    #[test]
    fn test_mismatched_tables_rejected() {
        assert_eq!(
            Config::from_json(br#"{"backoff_table":[1,2,3],"decay_table":[5]}"#),
            Err(State::InvalidParameter)
        );
        assert_eq!(
            Config::from_json(br#"{"backoff_table":[],"decay_table":[]}"#),
            Err(State::InvalidParameter)
        );
    }

    #[test]
    fn test_malformed_json() {
        assert_eq!(Config::from_json(b"{\"max_contexts\":"), Err(State::Serialization));
    }
}
