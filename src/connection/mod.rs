//! # Connection contexts
//!
//! A connection context is one logical link to the broker. It keeps the
//! [`ConnectionData`] needed to (re)connect and, while a link is up, the layer
//! chain that carries it:
//!
//! ```text
//!   ┌─────────────────────────── Connection ───────────────────────────┐
//!   │  LogicLayer ──▶ CodecLayer ──▶ TlsLayer ──▶ IoLayer ──▶ socket     │
//!   │  (persists      (per link)     (per link)   (per link)             │
//!   │   across links)                                                    │
//!   └────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The logic layer outlives individual links so a continued session can carry
//! its subscriptions and unacknowledged publishes into the next one.
//!
//! State transitions:
//!
//! ```text
//!  Uninitialized ──connect──▶ Connecting ──CONNACK──▶ Connected
//!                                 │                      │
//!                                 └──error──▶ Closing ◀──┘ shutdown / error
//!                                               │
//!                                               ▼
//!                           Connecting ◀──── Closed
//!                        (auto-reconnect)
//! ```

#![allow(missing_docs)]
#![deny(unsafe_code)]

/// The layer chain of one context
pub mod stack;

pub use stack::Connection;

use alloc::string::String;

use crate::crypto::PrivateKey;
use crate::crypto::jwt::create_jwt_es256;
use crate::error::State;
use crate::memory::ByteBuffer;
use crate::mqtt::logic::{LogicTimeouts, SessionType};
use crate::mqtt::{LastWill, Packet};

/// Username sent in CONNECT; the broker authenticates through the JWT password.
pub const DEFAULT_USERNAME: &str = "unused";

/// Lifecycle of a connection context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Uninitialized,
    Connecting,
    Connected,
    Closing,
    Closed,
}

#[cfg(feature = "defmt")]
impl defmt::Format for ConnectionState {
    fn format(&self, f: defmt::Formatter) {
        match self {
            ConnectionState::Uninitialized => defmt::write!(f, "Uninitialized"),
            ConnectionState::Connecting => defmt::write!(f, "Connecting"),
            ConnectionState::Connected => defmt::write!(f, "Connected"),
            ConnectionState::Closing => defmt::write!(f, "Closing"),
            ConnectionState::Closed => defmt::write!(f, "Closed"),
        }
    }
}

/// Endpoint, identity and timing of a connection.
#[derive(Debug, Clone)]
pub struct ConnectionData {
    pub host: String,
    pub port: u16,
    /// MQTT client id, the device path of the cloud registry.
    pub client_id: String,
    pub username: String,
    /// JWT, regenerated before every connect.
    pub password: String,
    pub project_id: String,
    pub private_key: PrivateKey,
    /// Seconds allowed for socket connect, TLS handshake and CONNACK together.
    pub connection_timeout: u32,
    /// MQTT keepalive interval in seconds, zero to disable.
    pub keepalive_timeout: u16,
    /// Lifetime of each generated JWT, in seconds.
    pub jwt_expiration: u32,
    pub will: Option<LastWill<'static>>,
    pub session: SessionType,
}

impl ConnectionData {
    pub fn timeouts(&self) -> LogicTimeouts {
        LogicTimeouts { connection: self.connection_timeout, keepalive: self.keepalive_timeout }
    }

    /// Replaces the password with a fresh JWT issued at `issued_at`.
    pub fn refresh_password<C: crate::crypto::Crypto + ?Sized>(
        &mut self,
        crypto: &mut C,
        issued_at: u64,
    ) -> Result<(), State> {
        self.password = create_jwt_es256(
            crypto,
            &self.project_id,
            issued_at,
            self.jwt_expiration,
            &self.private_key,
        )?;
        Ok(())
    }

    /// CONNECT packet borrowing every field from `self`.
    pub fn connect_packet(&self) -> Packet<'_> {
        Packet::Connect {
            client_id: ByteBuffer::share_str(&self.client_id),
            username: Some(ByteBuffer::share_str(&self.username)),
            password: Some(ByteBuffer::share_str(&self.password)),
            keepalive: self.keepalive_timeout,
            clean_session: self.session == SessionType::Clean,
            will: self.will.as_ref().map(|will| LastWill {
                topic: ByteBuffer::share(will.topic.as_slice()),
                message: ByteBuffer::share(will.message.as_slice()),
                qos: will.qos,
                retain: will.retain,
            }),
        }
    }
}
