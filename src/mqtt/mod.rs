//! # MQTT 3.1.1 protocol layers
//!
//! Two layers of the connection stack live here:
//!
//! ```text
//!   client API ──▶ LogicLayer ──Packet──▶ CodecLayer ──frame──▶ TLS layer
//!                  (tasks,     ◀─Packet──  (serializer, ◀─bytes──
//!                  timeouts,               parser)
//!                  routing)
//! ```
//!
//! - [`codec`] turns typed [`Packet`]s into exactly sized frames and incrementally
//!   parses inbound bytes back into packets. Frames leave one at a time, in order.
//! - [`logic`] owns the outstanding operations (connect, publish, subscribe,
//!   keepalive, shutdown), matches acknowledgements to them by message id and
//!   routes inbound messages to subscriptions through [`topic::match_topics`].
//!
//! QoS 2 is not supported by the cloud service; publishing or subscribing with it
//! fails with [`State::NotSupported`](crate::error::State::NotSupported) and inbound
//! QoS 2 messages are dropped.
//!
//! ## Example
//!
//! ```rust
//! use libiotc::memory::ByteBuffer;
//! use libiotc::mqtt::codec::CodecLayer;
//! use libiotc::mqtt::{Packet, QoS};
//!
//! let mut codec = CodecLayer::new(1024);
//! let frame = codec
//!     .push(&Packet::Publish {
//!         topic: ByteBuffer::share_str("devices/dev-1/events"),
//!         payload: ByteBuffer::share(b"21.5"),
//!         qos: QoS::AtMostOnce,
//!         retain: false,
//!         dup: false,
//!         message_id: 0,
//!     })
//!     .unwrap()
//!     .unwrap();
//! assert_eq!(frame.as_slice()[0], 0x30);
//!
//! let mut inbound = ByteBuffer::share(&[0x20, 0x02, 0x00, 0x00]);
//! let packets = codec.pull(&mut inbound).unwrap();
//! assert_eq!(packets, [Packet::ConnAck { session_present: false, return_code: 0 }]);
//! ```

#![allow(missing_docs)]
#![deny(unsafe_code)]

/// Typed control packets
pub mod packet;

/// Packet serialization
pub mod serializer;

/// Incremental packet parsing
pub mod parser;

/// Codec layer task queue
pub mod codec;

/// Topic filter matching
pub mod topic;

/// Client state machine
pub mod logic;

pub use packet::{LastWill, Packet, PacketType, QoS, SubAckStatus};
pub use topic::match_topics;
