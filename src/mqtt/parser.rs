use alloc::vec::Vec;

use log::trace;

use super::packet::{LastWill, Packet, PacketType, QoS, SubAckStatus};
use super::serializer::MAX_REMAINING_LENGTH;
use crate::error::State;
use crate::memory::ByteBuffer;

#[derive(Debug)]
enum ParseState {
    FixedHeader,
    RemainingLength { header: u8, value: usize, multiplier: usize, count: u8 },
    Body { header: u8, body: Vec<u8>, expected: usize },
}

/// Incremental MQTT packet parser.
///
/// Input arrives in arbitrary slices; the parser remembers how far it got in the
/// fixed header, the remaining-length varint and the body between calls. A packet
/// is decoded only once all of its `remaining_length` bytes are buffered, so a
/// partial packet never leaves the parser.
#[derive(Debug)]
pub struct Parser {
    state: ParseState,
    max_remaining: usize,
}

impl Parser {
    /// Creates a parser refusing packets whose body exceeds `max_remaining` bytes.
    pub fn new(max_remaining: usize) -> Self {
        Self {
            state: ParseState::FixedHeader,
            max_remaining: max_remaining.min(MAX_REMAINING_LENGTH),
        }
    }

    /// `true` between packets.
    pub fn is_idle(&self) -> bool {
        matches!(self.state, ParseState::FixedHeader)
    }

    /// Drops a partially parsed packet.
    pub fn reset(&mut self) {
        self.state = ParseState::FixedHeader;
    }

    /// Consumes bytes from `input` until one packet is complete or the input is
    /// exhausted.
    ///
    /// Returns `Ok(None)` when more input is needed. The read cursor of `input`
    /// stops right after the returned packet, so the caller can loop for more.
    /// After an error the parser is reset.
    pub fn parse(&mut self, input: &mut ByteBuffer<'_>) -> Result<Option<Packet<'static>>, State> {
        let result = self.advance(input);
        if result.is_err() {
            self.reset();
        }
        result
    }

    fn advance(&mut self, input: &mut ByteBuffer<'_>) -> Result<Option<Packet<'static>>, State> {
        loop {
            match &mut self.state {
                ParseState::FixedHeader => {
                    let Some(&header) = input.remaining().first() else {
                        return Ok(None);
                    };
                    input.advance(1);
                    let kind = PacketType::from_header(header)?;
                    if !kind.is_supported() {
                        return Err(State::MqttMessageClassUnknown);
                    }
                    self.state = ParseState::RemainingLength {
                        header,
                        value: 0,
                        multiplier: 1,
                        count: 0,
                    };
                }
                ParseState::RemainingLength { header, value, multiplier, count } => {
                    let Some(&byte) = input.remaining().first() else {
                        return Ok(None);
                    };
                    input.advance(1);
                    *value += usize::from(byte & 0x7f) * *multiplier;
                    *multiplier *= 128;
                    *count += 1;
                    if byte & 0x80 != 0 {
                        if *count == 4 {
                            return Err(State::MqttParser);
                        }
                        continue;
                    }
                    let (header, expected) = (*header, *value);
                    if expected > self.max_remaining {
                        return Err(State::MqttPayloadSizeTooLarge);
                    }
                    let mut body = Vec::new();
                    body.try_reserve_exact(expected).map_err(|_| State::OutOfMemory)?;
                    self.state = ParseState::Body { header, body, expected };
                }
                ParseState::Body { header, body, expected } => {
                    let wanted = *expected - body.len();
                    let available = input.remaining();
                    let take = wanted.min(available.len());
                    body.extend_from_slice(&available[..take]);
                    input.advance(take);
                    if body.len() < *expected {
                        return Ok(None);
                    }
                    let header = *header;
                    let body = core::mem::take(body);
                    self.state = ParseState::FixedHeader;
                    let packet = decode(header, &body)?;
                    trace!("parsed {:?} ({} bytes)", packet.packet_type(), body.len());
                    return Ok(Some(packet));
                }
            }
        }
    }
}

struct Reader<'b> {
    data: &'b [u8],
}

impl<'b> Reader<'b> {
    fn u8(&mut self) -> Result<u8, State> {
        let (&first, rest) = self.data.split_first().ok_or(State::MqttParser)?;
        self.data = rest;
        Ok(first)
    }

    fn u16(&mut self) -> Result<u16, State> {
        Ok(u16::from_be_bytes([self.u8()?, self.u8()?]))
    }

    fn bytes(&mut self, len: usize) -> Result<&'b [u8], State> {
        if self.data.len() < len {
            return Err(State::MqttParser);
        }
        let (head, rest) = self.data.split_at(len);
        self.data = rest;
        Ok(head)
    }

    fn string(&mut self) -> Result<ByteBuffer<'static>, State> {
        let len = usize::from(self.u16()?);
        ByteBuffer::copy_from(self.bytes(len)?)
    }

    fn rest(&mut self) -> &'b [u8] {
        core::mem::take(&mut self.data)
    }

    fn finish(&self) -> Result<(), State> {
        if self.data.is_empty() { Ok(()) } else { Err(State::MqttParser) }
    }
}

fn decode(header: u8, body: &[u8]) -> Result<Packet<'static>, State> {
    let mut reader = Reader { data: body };
    let packet = match PacketType::from_header(header)? {
        PacketType::Connect => {
            if reader.bytes(6)? != b"\x00\x04MQTT" || reader.u8()? != 4 {
                return Err(State::MqttParser);
            }
            let flags = reader.u8()?;
            let keepalive = reader.u16()?;
            let client_id = reader.string()?;
            let will = if flags & 0x04 != 0 {
                Some(LastWill {
                    topic: reader.string()?,
                    message: reader.string()?,
                    qos: QoS::from_bits((flags >> 3) & 0x03)?,
                    retain: flags & 0x20 != 0,
                })
            } else {
                None
            };
            let username = if flags & 0x80 != 0 { Some(reader.string()?) } else { None };
            let password = if flags & 0x40 != 0 { Some(reader.string()?) } else { None };
            Packet::Connect {
                client_id,
                username,
                password,
                keepalive,
                clean_session: flags & 0x02 != 0,
                will,
            }
        }
        PacketType::ConnAck => Packet::ConnAck {
            session_present: reader.u8()? & 0x01 != 0,
            return_code: reader.u8()?,
        },
        PacketType::Publish => {
            let qos = QoS::from_bits((header >> 1) & 0x03)?;
            let topic = reader.string()?;
            let message_id = if qos == QoS::AtMostOnce { 0 } else { reader.u16()? };
            Packet::Publish {
                topic,
                payload: ByteBuffer::copy_from(reader.rest())?,
                qos,
                retain: header & 0x01 != 0,
                dup: header & 0x08 != 0,
                message_id,
            }
        }
        PacketType::PubAck => Packet::PubAck { message_id: reader.u16()? },
        PacketType::Subscribe => Packet::Subscribe {
            message_id: reader.u16()?,
            topic: reader.string()?,
            qos: QoS::from_bits(reader.u8()?)?,
        },
        PacketType::SubAck => Packet::SubAck {
            message_id: reader.u16()?,
            status: SubAckStatus::from_code(reader.u8()?)?,
        },
        PacketType::PingReq => Packet::PingReq,
        PacketType::PingResp => Packet::PingResp,
        PacketType::Disconnect => Packet::Disconnect,
        _ => return Err(State::MqttMessageClassUnknown),
    };
    reader.finish()?;
    Ok(packet)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_all(parser: &mut Parser, bytes: &[u8]) -> Result<Vec<Packet<'static>>, State> {
        let mut input = ByteBuffer::share(bytes);
        let mut out = Vec::new();
        while let Some(packet) = parser.parse(&mut input)? {
            out.push(packet);
        }
        Ok(out)
    }

    #[test]
    fn test_connack() {
        let mut parser = Parser::new(1024);
        let packets = parse_all(&mut parser, &[0x20, 0x02, 0x01, 0x05]).unwrap();
        assert_eq!(
            packets,
            [Packet::ConnAck { session_present: true, return_code: 5 }]
        );
    }

    #[test]
    fn test_byte_at_a_time() {
        let frame = [0x32, 0x08, 0x00, 0x03, b'a', b'/', b'b', 0x00, 0x2A, b'!'];
        let mut parser = Parser::new(1024);
        for (index, byte) in frame.iter().enumerate() {
            let result = parse_all(&mut parser, core::slice::from_ref(byte)).unwrap();
            if index + 1 < frame.len() {
                assert!(result.is_empty());
                assert!(!parser.is_idle());
            } else {
                assert_eq!(result.len(), 1);
                assert_eq!(result[0].message_id(), 42);
            }
        }
        assert!(parser.is_idle());
    }

    #[test]
    fn test_two_packets_in_one_read() {
        let mut parser = Parser::new(1024);
        let packets = parse_all(&mut parser, &[0xD0, 0x00, 0x40, 0x02, 0x00, 0x07]).unwrap();
        assert_eq!(packets, [Packet::PingResp, Packet::PubAck { message_id: 7 }]);
    }

    #[test]
    fn test_overlong_remaining_length() {
        let mut parser = Parser::new(MAX_REMAINING_LENGTH);
        assert_eq!(
            parse_all(&mut parser, &[0x30, 0xff, 0xff, 0xff, 0xff, 0x01]),
            Err(State::MqttParser)
        );
        assert!(parser.is_idle());
    }

    #[test]
    fn test_payload_too_large_before_body() {
        let mut parser = Parser::new(16);
        assert_eq!(
            parse_all(&mut parser, &[0x30, 0x80, 0x01]),
            Err(State::MqttPayloadSizeTooLarge)
        );
    }

    #[test]
    fn test_reserved_and_unsupported_types() {
        let mut parser = Parser::new(16);
        assert_eq!(parse_all(&mut parser, &[0x00, 0x00]), Err(State::MqttParser));
        assert_eq!(parse_all(&mut parser, &[0xF0, 0x00]), Err(State::MqttParser));
        assert_eq!(
            parse_all(&mut parser, &[0x50, 0x02, 0x00, 0x01]),
            Err(State::MqttMessageClassUnknown)
        );
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut parser = Parser::new(16);
        assert_eq!(
            parse_all(&mut parser, &[0x40, 0x03, 0x00, 0x01, 0x00]),
            Err(State::MqttParser)
        );
    }
}
