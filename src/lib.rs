//! # libiotc - MQTT cloud client for embedded devices
//!
//! A client library that keeps a device connected to a cloud MQTT broker over TLS,
//! authenticating with short-lived ES256 JWTs. Everything runs on a single thread
//! of control: a non-blocking event engine drives a chain of resumable layers per
//! connection, and the board support package supplies sockets, TLS, crypto,
//! storage, time and randomness through traits. The library supports `no_std`
//! environments with an allocator.
//!
//! ## Features
//!
//! ### Connectivity
//! - **MQTT 3.1.1**: CONNECT with last will, QoS 0 and 1 publish, subscribe with
//!   wildcard dispatch, keepalive pings, clean and continued sessions
//! - **TLS**: certificate bundle loaded from the resource store, handshake driven
//!   through readiness events
//! - **Reconnect**: a shared backoff policy with jitter and decay
//!
//! ### Runtime
//! - Time events with O(log n) scheduling, cancellation and restart
//! - Timed user tasks, one-shot or repeating
//! - Growable and borrowed byte buffers
//!
//! ## Usage
//!
//! Add this to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! libiotc = "0.1.0"
//! ```
//!
//! ### Connecting and publishing
//!
//! ```rust,ignore
//! use libiotc::client::{Client, ConnectOptions};
//! use libiotc::config::Config;
//! use libiotc::crypto::PrivateKey;
//! use libiotc::mqtt::QoS;
//! use libiotc::State;
//!
//! let mut client = Client::initialize(MyBoard::new(), Config::default())?;
//! let context = client.create_context()?;
//!
//! client.connect(
//!     context,
//!     "my-project",
//!     "projects/my-project/locations/europe-west1/registries/sensors/devices/d1",
//!     &PrivateKey::pem(DEVICE_KEY),
//!     ConnectOptions::default(),
//!     |client, context, state| {
//!         if state == State::Ok {
//!             let _ = client.schedule_timed_task(
//!                 context,
//!                 move |client, _| {
//!                     let _ = client.publish(context, "/devices/d1/events", "21.5", QoS::AtLeastOnce, None);
//!                 },
//!                 60,
//!                 true,
//!             );
//!         }
//!     },
//! )?;
//!
//! client.events_process_blocking();
//! ```
//!
//! ### Matching topics
//!
//! ```rust
//! use libiotc::mqtt::match_topics;
//!
//! assert_eq!(match_topics(Some("sensors/#"), Some("sensors/room1/temp")), 0);
//! assert_eq!(match_topics(Some("sensors/#"), Some("actuators/fan")), 1);
//! ```
//!
//! ## Architecture
//!
//! ```text
//!   user API (client) ──▶ connection context
//!                            logic ──▶ codec ──▶ TLS ──▶ IO ──▶ Platform sockets
//!                              ▲                                      │
//!   event engine ──────────────┴──── time events, readiness ◀─────────┘
//! ```
//!
//! ## Optional Features
//!
//! - `std`: Enable standard library support (default: disabled)
//! - `defmt`: Enable defmt formatting of status and error types

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(missing_docs)]
#![warn(missing_debug_implementations)]
#![doc(html_root_url = "https://shishir-dey.github.io/libiotc/")]

extern crate alloc;

/// Status and error codes shared by every layer.
pub mod error;

/// Limits, buffer sizes, backoff tables and the default endpoint.
pub mod config;

/// Byte buffers and slot arenas.
pub mod memory;

/// Time events and the event dispatcher.
pub mod event;

/// Reconnect penalty shared by all connection contexts.
pub mod backoff;

/// Suspension points of the resumable layers.
pub mod layer;

/// Network abstraction layer: socket traits, readiness polling and the raw IO layer.
pub mod network;

/// TLS engine traits and the TLS layer.
pub mod tls;

/// Storage abstraction for certificates, credentials and configuration.
///
/// Provides the resource store interface and a chunked, resumable loader.
pub mod storage;

/// Hashing and signing traits, URL-safe base64 and JWT creation.
pub mod crypto;

/// Random source trait.
pub mod rng;

/// Clock trait.
pub mod time;

/// MQTT packets, codec, topic matching and protocol logic.
pub mod mqtt;

/// Connection contexts and their layer chains.
pub mod connection;

/// The public client API.
pub mod client;

/// The combined board support package bound.
pub mod platform;

pub use client::{Client, ConnectOptions, ContextHandle, SubscriptionEvent, TimedTaskHandle};
pub use config::Config;
pub use error::State;
pub use platform::Platform;
