use alloc::vec::Vec;

use heapless::Vec as HVec;

use super::packet::{LastWill, Packet, QoS};
use crate::error::State;
use crate::memory::ByteBuffer;

/// Largest value the remaining-length field can express.
pub const MAX_REMAINING_LENGTH: usize = 268_435_455;

const PROTOCOL_NAME: &[u8] = b"MQTT";
const PROTOCOL_LEVEL: u8 = 4;

const CONNECT: u8 = 0x10;
const CONNACK: u8 = 0x20;
const PUBLISH: u8 = 0x30;
const PUBACK: u8 = 0x40;
const SUBSCRIBE: u8 = 0x82;
const SUBACK: u8 = 0x90;
const PINGREQ: u8 = 0xC0;
const PINGRESP: u8 = 0xD0;
const DISCONNECT: u8 = 0xE0;

const FLAG_USERNAME: u8 = 0x80;
const FLAG_PASSWORD: u8 = 0x40;
const FLAG_WILL_RETAIN: u8 = 0x20;
const FLAG_WILL: u8 = 0x04;
const FLAG_CLEAN_SESSION: u8 = 0x02;

/// Encode the remaining length field for an MQTT packet.
///
/// Seven bits per byte, least significant group first, the top bit flagging a
/// continuation byte. Four bytes cover [`MAX_REMAINING_LENGTH`].
pub fn encode_remaining_length(mut len: usize) -> Result<HVec<u8, 4>, State> {
    if len > MAX_REMAINING_LENGTH {
        return Err(State::MqttPayloadSizeTooLarge);
    }
    let mut out = HVec::new();
    loop {
        let mut byte = (len % 128) as u8;
        len /= 128;
        if len > 0 {
            byte |= 0x80;
        }
        out.push(byte).map_err(|_| State::MqttSerializer)?;
        if len == 0 {
            return Ok(out);
        }
    }
}

fn string_len(field: &ByteBuffer<'_>) -> Result<usize, State> {
    if field.len() > usize::from(u16::MAX) {
        return Err(State::MqttSerializer);
    }
    Ok(2 + field.len())
}

fn body_len(packet: &Packet<'_>) -> Result<usize, State> {
    let len = match packet {
        Packet::Connect { client_id, username, password, will, .. } => {
            let mut len = 2 + PROTOCOL_NAME.len() + 1 + 1 + 2;
            len += string_len(client_id)?;
            if let Some(LastWill { topic, message, .. }) = will {
                len += string_len(topic)? + string_len(message)?;
            }
            if let Some(username) = username {
                len += string_len(username)?;
            }
            if let Some(password) = password {
                len += string_len(password)?;
            }
            len
        }
        Packet::ConnAck { .. } => 2,
        Packet::Publish { topic, payload, qos, .. } => {
            let id = if *qos == QoS::AtMostOnce { 0 } else { 2 };
            string_len(topic)?
                .checked_add(id + payload.len())
                .ok_or(State::MqttPayloadSizeTooLarge)?
        }
        Packet::PubAck { .. } => 2,
        Packet::Subscribe { topic, .. } => 2 + string_len(topic)? + 1,
        Packet::SubAck { .. } => 3,
        Packet::PingReq | Packet::PingResp | Packet::Disconnect => 0,
    };
    if len > MAX_REMAINING_LENGTH {
        return Err(State::MqttPayloadSizeTooLarge);
    }
    Ok(len)
}

fn first_byte(packet: &Packet<'_>) -> u8 {
    match packet {
        Packet::Connect { .. } => CONNECT,
        Packet::ConnAck { .. } => CONNACK,
        Packet::Publish { qos, retain, dup, .. } => {
            PUBLISH | (u8::from(*dup) << 3) | (qos.bits() << 1) | u8::from(*retain)
        }
        Packet::PubAck { .. } => PUBACK,
        Packet::Subscribe { .. } => SUBSCRIBE,
        Packet::SubAck { .. } => SUBACK,
        Packet::PingReq => PINGREQ,
        Packet::PingResp => PINGRESP,
        Packet::Disconnect => DISCONNECT,
    }
}

/// Exact number of bytes [`serialize`] produces for `packet`.
pub fn serialized_len(packet: &Packet<'_>) -> Result<usize, State> {
    let body = body_len(packet)?;
    Ok(1 + encode_remaining_length(body)?.len() + body)
}

struct Writer {
    data: Vec<u8>,
}

impl Writer {
    fn u8(&mut self, value: u8) {
        self.data.push(value);
    }

    fn u16(&mut self, value: u16) {
        self.data.extend_from_slice(&value.to_be_bytes());
    }

    fn bytes(&mut self, value: &[u8]) {
        self.data.extend_from_slice(value);
    }

    fn string(&mut self, value: &[u8]) {
        self.u16(value.len() as u16);
        self.bytes(value);
    }
}

/// Serializes `packet` into an owned buffer of exactly [`serialized_len`] bytes.
///
/// Size checks run before anything is allocated, so an oversized packet fails with
/// `MqttPayloadSizeTooLarge` without touching the heap.
pub fn serialize(packet: &Packet<'_>) -> Result<ByteBuffer<'static>, State> {
    let body = body_len(packet)?;
    let remaining = encode_remaining_length(body)?;
    let total = 1 + remaining.len() + body;

    let mut data = Vec::new();
    data.try_reserve_exact(total).map_err(|_| State::OutOfMemory)?;
    let mut out = Writer { data };
    out.u8(first_byte(packet));
    out.bytes(&remaining);

    match packet {
        Packet::Connect { client_id, username, password, keepalive, clean_session, will } => {
            let mut flags = 0u8;
            if username.is_some() {
                flags |= FLAG_USERNAME;
            }
            if password.is_some() {
                flags |= FLAG_PASSWORD;
            }
            if let Some(will) = will {
                flags |= FLAG_WILL | (will.qos.bits() << 3);
                if will.retain {
                    flags |= FLAG_WILL_RETAIN;
                }
            }
            if *clean_session {
                flags |= FLAG_CLEAN_SESSION;
            }
            out.string(PROTOCOL_NAME);
            out.u8(PROTOCOL_LEVEL);
            out.u8(flags);
            out.u16(*keepalive);
            out.string(client_id.as_slice());
            if let Some(will) = will {
                out.string(will.topic.as_slice());
                out.string(will.message.as_slice());
            }
            if let Some(username) = username {
                out.string(username.as_slice());
            }
            if let Some(password) = password {
                out.string(password.as_slice());
            }
        }
        Packet::ConnAck { session_present, return_code } => {
            out.u8(u8::from(*session_present));
            out.u8(*return_code);
        }
        Packet::Publish { topic, payload, qos, message_id, .. } => {
            out.string(topic.as_slice());
            if *qos != QoS::AtMostOnce {
                out.u16(*message_id);
            }
            out.bytes(payload.as_slice());
        }
        Packet::PubAck { message_id } => out.u16(*message_id),
        Packet::Subscribe { message_id, topic, qos } => {
            out.u16(*message_id);
            out.string(topic.as_slice());
            out.u8(qos.bits());
        }
        Packet::SubAck { message_id, status } => {
            out.u16(*message_id);
            out.u8(status.code());
        }
        Packet::PingReq | Packet::PingResp | Packet::Disconnect => {}
    }

    if out.data.len() != total {
        return Err(State::MqttSerializer);
    }
    Ok(ByteBuffer::from_vec(out.data))
}
