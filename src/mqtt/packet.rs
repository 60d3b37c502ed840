use crate::error::State;
use crate::memory::ByteBuffer;

/// MQTT Quality of Service levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum QoS {
    /// At most once delivery
    AtMostOnce = 0,
    /// At least once delivery
    AtLeastOnce = 1,
    /// Exactly once delivery, refused by the cloud service
    ExactlyOnce = 2,
}

impl QoS {
    /// Decodes the two QoS bits of a header or SUBACK code.
    pub fn from_bits(bits: u8) -> Result<Self, State> {
        match bits {
            0 => Ok(QoS::AtMostOnce),
            1 => Ok(QoS::AtLeastOnce),
            2 => Ok(QoS::ExactlyOnce),
            _ => Err(State::MqttParser),
        }
    }

    pub fn bits(self) -> u8 {
        self as u8
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for QoS {
    fn format(&self, f: defmt::Formatter) {
        match self {
            QoS::AtMostOnce => defmt::write!(f, "AtMostOnce"),
            QoS::AtLeastOnce => defmt::write!(f, "AtLeastOnce"),
            QoS::ExactlyOnce => defmt::write!(f, "ExactlyOnce"),
        }
    }
}

/// Control packet types as carried in the high nibble of the first header byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    Connect = 1,
    ConnAck = 2,
    Publish = 3,
    PubAck = 4,
    PubRec = 5,
    PubRel = 6,
    PubComp = 7,
    Subscribe = 8,
    SubAck = 9,
    Unsubscribe = 10,
    UnsubAck = 11,
    PingReq = 12,
    PingResp = 13,
    Disconnect = 14,
}

impl PacketType {
    /// Decodes the high nibble of a first header byte.
    ///
    /// The reserved values 0 and 15 are malformed input; the QoS 2 handshake and
    /// unsubscribe types are well formed but not handled by this client.
    pub fn from_header(byte: u8) -> Result<Self, State> {
        match byte >> 4 {
            1 => Ok(PacketType::Connect),
            2 => Ok(PacketType::ConnAck),
            3 => Ok(PacketType::Publish),
            4 => Ok(PacketType::PubAck),
            5 => Ok(PacketType::PubRec),
            6 => Ok(PacketType::PubRel),
            7 => Ok(PacketType::PubComp),
            8 => Ok(PacketType::Subscribe),
            9 => Ok(PacketType::SubAck),
            10 => Ok(PacketType::Unsubscribe),
            11 => Ok(PacketType::UnsubAck),
            12 => Ok(PacketType::PingReq),
            13 => Ok(PacketType::PingResp),
            14 => Ok(PacketType::Disconnect),
            _ => Err(State::MqttParser),
        }
    }

    /// `true` for the types this client encodes and decodes.
    pub fn is_supported(self) -> bool {
        !matches!(
            self,
            PacketType::PubRec
                | PacketType::PubRel
                | PacketType::PubComp
                | PacketType::Unsubscribe
                | PacketType::UnsubAck
        )
    }
}

/// Message the broker publishes on the client's behalf after an unexpected
/// disconnect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastWill<'a> {
    pub topic: ByteBuffer<'a>,
    pub message: ByteBuffer<'a>,
    pub qos: QoS,
    pub retain: bool,
}

/// Broker's answer to a single-topic SUBSCRIBE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubAckStatus {
    Granted(QoS),
    Failure,
}

impl SubAckStatus {
    pub fn code(self) -> u8 {
        match self {
            SubAckStatus::Granted(qos) => qos.bits(),
            SubAckStatus::Failure => 0x80,
        }
    }

    pub fn from_code(code: u8) -> Result<Self, State> {
        match code {
            0x80 => Ok(SubAckStatus::Failure),
            bits => QoS::from_bits(bits).map(SubAckStatus::Granted),
        }
    }
}

/// A typed MQTT 3.1.1 control packet.
///
/// Every variable-length field is a [`ByteBuffer`]; outbound packets usually borrow
/// their fields from the connection data or the logic task that builds them, while
/// the parser hands out packets owning all of their fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet<'a> {
    Connect {
        client_id: ByteBuffer<'a>,
        username: Option<ByteBuffer<'a>>,
        password: Option<ByteBuffer<'a>>,
        keepalive: u16,
        clean_session: bool,
        will: Option<LastWill<'a>>,
    },
    ConnAck {
        session_present: bool,
        return_code: u8,
    },
    Publish {
        topic: ByteBuffer<'a>,
        payload: ByteBuffer<'a>,
        qos: QoS,
        retain: bool,
        dup: bool,
        message_id: u16,
    },
    PubAck {
        message_id: u16,
    },
    Subscribe {
        message_id: u16,
        topic: ByteBuffer<'a>,
        qos: QoS,
    },
    SubAck {
        message_id: u16,
        status: SubAckStatus,
    },
    PingReq,
    PingResp,
    Disconnect,
}

impl Packet<'_> {
    pub fn packet_type(&self) -> PacketType {
        match self {
            Packet::Connect { .. } => PacketType::Connect,
            Packet::ConnAck { .. } => PacketType::ConnAck,
            Packet::Publish { .. } => PacketType::Publish,
            Packet::PubAck { .. } => PacketType::PubAck,
            Packet::Subscribe { .. } => PacketType::Subscribe,
            Packet::SubAck { .. } => PacketType::SubAck,
            Packet::PingReq => PacketType::PingReq,
            Packet::PingResp => PacketType::PingResp,
            Packet::Disconnect => PacketType::Disconnect,
        }
    }

    /// Packet identifier, zero for packets that carry none.
    pub fn message_id(&self) -> u16 {
        match self {
            Packet::Publish { message_id, .. }
            | Packet::PubAck { message_id }
            | Packet::Subscribe { message_id, .. }
            | Packet::SubAck { message_id, .. } => *message_id,
            _ => 0,
        }
    }
}
