use alloc::collections::VecDeque;
use alloc::vec::Vec;

use log::{debug, trace};

use super::packet::{Packet, PacketType};
use super::parser::Parser;
use super::serializer;
use crate::error::State;
use crate::memory::ByteBuffer;

/// One outbound message owned by the codec.
///
/// The task keeps the message id and type for as long as the write is pending,
/// while the serialized frame itself may be handed to the layer below and later
/// reattached.
#[derive(Debug)]
pub struct CodecTask {
    msg_id: u16,
    msg_type: PacketType,
    msg: Option<ByteBuffer<'static>>,
}

impl CodecTask {
    /// Serializes `packet` into a new task holding the frame.
    pub fn make(packet: &Packet<'_>) -> Result<Self, State> {
        Ok(Self {
            msg_id: packet.message_id(),
            msg_type: packet.packet_type(),
            msg: Some(serializer::serialize(packet)?),
        })
    }

    pub fn msg_id(&self) -> u16 {
        self.msg_id
    }

    pub fn msg_type(&self) -> PacketType {
        self.msg_type
    }

    /// `true` while the frame is attached.
    pub fn has_msg(&self) -> bool {
        self.msg.is_some()
    }

    /// Detaches the frame so it can travel down the stack; the task metadata stays.
    pub fn activate(&mut self) -> Option<ByteBuffer<'static>> {
        self.msg.take()
    }

    /// Reattaches a frame.
    pub fn continue_with(&mut self, msg: ByteBuffer<'static>) {
        self.msg = Some(msg);
    }
}

/// Outcome of one outbound message, reported to the logic layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    pub msg_id: u16,
    pub msg_type: PacketType,
    /// `Written` once flushed to the socket, `FailedWriting` otherwise.
    pub state: State,
}

/// MQTT codec layer.
///
/// Outbound, packets are serialized into exactly sized frames and released to the
/// TLS layer strictly one at a time: the next frame leaves only after the previous
/// one was reported written. Inbound, bytes are fed to the incremental [`Parser`].
#[derive(Debug)]
pub struct CodecLayer {
    queue: VecDeque<CodecTask>,
    in_flight: Option<CodecTask>,
    parser: Parser,
}

impl CodecLayer {
    /// Creates a codec whose parser accepts bodies of up to `max_inbound` bytes.
    pub fn new(max_inbound: usize) -> Self {
        Self { queue: VecDeque::new(), in_flight: None, parser: Parser::new(max_inbound) }
    }

    /// Messages waiting behind the one in flight.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Serializes `packet` and queues it.
    ///
    /// Returns the frame to write when nothing else is in flight; otherwise the
    /// frame is released later by [`on_written`](Self::on_written).
    pub fn push(&mut self, packet: &Packet<'_>) -> Result<Option<ByteBuffer<'static>>, State> {
        let task = CodecTask::make(packet)?;
        trace!("codec queued {:?} id {}", task.msg_type, task.msg_id);
        self.queue.try_reserve(1).map_err(|_| State::OutOfMemory)?;
        self.queue.push_back(task);
        Ok(self.activate_next())
    }

    fn activate_next(&mut self) -> Option<ByteBuffer<'static>> {
        if self.in_flight.is_some() {
            return None;
        }
        let mut task = self.queue.pop_front()?;
        let frame = task.activate();
        self.in_flight = Some(task);
        frame
    }

    /// Finishes the message in flight with `state` and releases the next frame.
    pub fn on_written(&mut self, state: State) -> Result<(Completion, Option<ByteBuffer<'static>>), State> {
        let task = self.in_flight.take().ok_or(State::InternalError)?;
        let state = if state == State::Written { State::Written } else { State::FailedWriting };
        let completion = Completion { msg_id: task.msg_id, msg_type: task.msg_type, state };
        debug!("codec {:?} id {} {:?}", task.msg_type, task.msg_id, state);
        Ok((completion, self.activate_next()))
    }

    /// Parses every complete packet available in `input`.
    ///
    /// Bytes of a trailing partial packet are consumed and kept by the parser.
    pub fn pull(&mut self, input: &mut ByteBuffer<'_>) -> Result<Vec<Packet<'static>>, State> {
        let mut packets = Vec::new();
        while let Some(packet) = self.parser.parse(input)? {
            packets.try_reserve(1).map_err(|_| State::OutOfMemory)?;
            packets.push(packet);
        }
        Ok(packets)
    }

    /// Drops every queued message, reporting each as `FailedWriting`, in order.
    pub fn close(&mut self) -> Vec<Completion> {
        self.parser.reset();
        self.in_flight
            .take()
            .into_iter()
            .chain(self.queue.drain(..))
            .map(|task| Completion {
                msg_id: task.msg_id,
                msg_type: task.msg_type,
                state: State::FailedWriting,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mqtt::packet::QoS;

    fn publish(id: u16) -> Packet<'static> {
        Packet::Publish {
            topic: ByteBuffer::share_str("t"),
            payload: ByteBuffer::share(b"p"),
            qos: QoS::AtLeastOnce,
            retain: false,
            dup: false,
            message_id: id,
        }
    }

    #[test]
    fn test_task_detach_and_reattach() {
        let mut task = CodecTask::make(&Packet::PingReq).unwrap();
        let frame = task.activate().unwrap();
        assert!(!task.has_msg());
        assert_eq!(task.msg_type(), PacketType::PingReq);
        task.continue_with(frame);
        assert!(task.has_msg());
    }

    #[test]
    fn test_one_frame_in_flight() {
        let mut codec = CodecLayer::new(64);
        assert!(codec.push(&publish(1)).unwrap().is_some());
        assert!(codec.push(&publish(2)).unwrap().is_none());
        assert_eq!(codec.pending(), 1);

        let (done, next) = codec.on_written(State::Written).unwrap();
        assert_eq!(done.msg_id, 1);
        assert_eq!(done.state, State::Written);
        assert!(next.is_some());

        let (done, next) = codec.on_written(State::Written).unwrap();
        assert_eq!(done.msg_id, 2);
        assert!(next.is_none());
        assert!(!codec.is_busy());
    }

    #[test]
    fn test_close_fails_everything_in_order() {
        let mut codec = CodecLayer::new(64);
        codec.push(&publish(5)).unwrap();
        codec.push(&Packet::PingReq).unwrap();
        let failed = codec.close();
        assert_eq!(failed.len(), 2);
        assert_eq!(failed[0].msg_id, 5);
        assert_eq!(failed[1].msg_type, PacketType::PingReq);
        assert!(failed.iter().all(|c| c.state == State::FailedWriting));
        assert_eq!(codec.on_written(State::Written).err(), Some(State::InternalError));
    }
}
