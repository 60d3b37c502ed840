use alloc::collections::VecDeque;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::fmt;

use log::{debug, info, warn};

use super::codec::Completion;
use super::packet::{Packet, PacketType, QoS, SubAckStatus};
use super::topic::topic_matches;
use crate::client::ContextHandle;
use crate::error::State;
use crate::event::{Dispatcher, Event, TimeEventHandle};
use crate::memory::{Arena, ArenaKey, ByteBuffer};

/// Identifies a task of one [`LogicLayer`].
pub type TaskId = ArenaKey;

/// Opaque reference to a user callback kept by the client.
pub type CallbackId = ArenaKey;

const MAX_TASKS: usize = u16::MAX as usize;

/// Whether subscriptions and unacknowledged publishes outlive a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionType {
    /// Start every connection from scratch.
    #[default]
    Clean,
    /// Keep subscriptions and QoS 1 publishes across reconnects.
    Continue,
}

/// A PUBLISH received from the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundPublish {
    pub topic: ByteBuffer<'static>,
    pub payload: ByteBuffer<'static>,
    pub qos: QoS,
    pub retain: bool,
    pub dup: bool,
    pub message_id: u16,
}

/// Something the client has to tell a user callback about.
#[derive(Debug, Clone)]
pub enum Notification {
    /// The broker accepted the CONNECT.
    Connected { session_present: bool },
    /// A publish finished; `Ok` on success.
    Published { callback: CallbackId, state: State },
    /// Outcome of a subscribe.
    SubAck { callback: CallbackId, topic: ByteBuffer<'static>, qos: QoS, state: State },
    /// A message for a matching subscription.
    Message { callback: CallbackId, message: Rc<InboundPublish> },
    /// The logic layer no longer refers to `callback`.
    Released { callback: CallbackId },
}

/// Where outbound packets go, in the order they are sent.
pub trait PacketSink {
    fn send(&mut self, packet: &Packet<'_>) -> Result<(), State>;
}

/// What a logic layer operation may touch besides the layer itself.
pub struct LogicIo<'a> {
    pub dispatcher: &'a mut Dispatcher<Event>,
    pub sink: &'a mut dyn PacketSink,
}

impl fmt::Debug for LogicIo<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogicIo")
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
enum Scenario {
    Connect,
    Publish {
        topic: ByteBuffer<'static>,
        payload: ByteBuffer<'static>,
        qos: QoS,
        retain: bool,
        callback: Option<CallbackId>,
    },
    Subscribe {
        topic: ByteBuffer<'static>,
        qos: QoS,
        callback: CallbackId,
    },
    PubAck {
        message: Rc<InboundPublish>,
    },
    PingReq,
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Not handed to the codec yet, or carried over from a previous connection.
    Queued,
    /// Handed to the codec, waiting for the write to complete.
    Writing,
    /// Written, waiting for the broker's response.
    Awaiting,
}

#[derive(Debug)]
struct Task {
    message_id: u16,
    scenario: Scenario,
    phase: Phase,
    dup: bool,
    timeout: TimeEventHandle,
}

#[derive(Debug)]
struct Subscription {
    filter: ByteBuffer<'static>,
    qos: QoS,
    callback: CallbackId,
}

/// Timeouts of one connection, in seconds. Zero disables the timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LogicTimeouts {
    pub connection: u32,
    pub keepalive: u16,
}

/// The MQTT client state machine of one connection context.
///
/// Each public operation becomes a task in an arena. A task is handed to the codec
/// through the [`PacketSink`], reported back through [`on_written`](Self::on_written)
/// and, for operations that expect an answer, completed by
/// [`on_packet`](Self::on_packet) or [`on_timeout`](Self::on_timeout). User-facing
/// results are queued as [`Notification`]s; a request to tear the connection down
/// is left in [`take_close_request`](Self::take_close_request).
#[derive(Debug)]
pub struct LogicLayer {
    context: ContextHandle,
    tasks: Arena<Task>,
    writes: VecDeque<TaskId>,
    subscriptions: Vec<Subscription>,
    last_message_id: u16,
    connect_task: Option<TaskId>,
    keepalive_event: TimeEventHandle,
    timeouts: LogicTimeouts,
    session: SessionType,
    connected: bool,
    shutdown_requested: bool,
    notifications: VecDeque<Notification>,
    close_request: Option<State>,
}

impl LogicLayer {
    pub fn new(context: ContextHandle, timeouts: LogicTimeouts, session: SessionType) -> Self {
        Self {
            context,
            tasks: Arena::new(MAX_TASKS),
            writes: VecDeque::new(),
            subscriptions: Vec::new(),
            last_message_id: 0,
            connect_task: None,
            keepalive_event: TimeEventHandle::null(),
            timeouts,
            session,
            connected: false,
            shutdown_requested: false,
            notifications: VecDeque::new(),
            close_request: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn session(&self) -> SessionType {
        self.session
    }

    /// Applies the settings of a new connect call.
    pub fn configure(&mut self, timeouts: LogicTimeouts, session: SessionType) {
        self.timeouts = timeouts;
        self.session = session;
    }

    /// Number of live tasks.
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Number of registered subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Handle of the next keepalive event, null while no keepalive is armed.
    pub fn keepalive_event(&self) -> &TimeEventHandle {
        &self.keepalive_event
    }

    pub fn take_notifications(&mut self) -> VecDeque<Notification> {
        core::mem::take(&mut self.notifications)
    }

    /// State the connection should close with, if the logic layer asked for it.
    pub fn take_close_request(&mut self) -> Option<State> {
        self.close_request.take()
    }

    /// `true` once the layer asked for the connection to close.
    pub fn close_pending(&self) -> bool {
        self.close_request.is_some()
    }

    fn notify(&mut self, notification: Notification) {
        self.notifications.push_back(notification);
    }

    fn request_close(&mut self, state: State) {
        if self.close_request.is_none() {
            self.close_request = Some(state);
        }
    }

    fn next_message_id(&mut self) -> u16 {
        loop {
            self.last_message_id = self.last_message_id.wrapping_add(1);
            if self.last_message_id == 0 {
                continue;
            }
            let id = self.last_message_id;
            if !self.tasks.iter().any(|(_, task)| task.message_id == id) {
                return id;
            }
        }
    }

    fn schedule_timeout(&mut self, dispatcher: &mut Dispatcher<Event>, id: TaskId, delay: u64) -> Result<(), State> {
        let handle = dispatcher.execute_in(delay, Event::TaskTimeout(self.context, id))?;
        if let Some(task) = self.tasks.get_mut(id) {
            task.timeout = handle;
        }
        Ok(())
    }

    fn remove_task(&mut self, dispatcher: &mut Dispatcher<Event>, id: TaskId) -> Option<Task> {
        let mut task = self.tasks.remove(id)?;
        let _ = dispatcher.cancel(&mut task.timeout);
        Some(task)
    }

    fn send_task(&mut self, io: &mut LogicIo<'_>, id: TaskId, connect: Option<&Packet<'_>>) -> Result<(), State> {
        let task = self.tasks.get(id).ok_or(State::InternalError)?;
        match &task.scenario {
            Scenario::Connect => {
                let packet = connect.ok_or(State::InternalError)?;
                io.sink.send(packet)?;
            }
            Scenario::Publish { topic, payload, qos, retain, .. } => {
                io.sink.send(&Packet::Publish {
                    topic: ByteBuffer::share(topic.as_slice()),
                    payload: ByteBuffer::share(payload.as_slice()),
                    qos: *qos,
                    retain: *retain,
                    dup: task.dup,
                    message_id: task.message_id,
                })?;
            }
            Scenario::Subscribe { topic, qos, .. } => {
                io.sink.send(&Packet::Subscribe {
                    message_id: task.message_id,
                    topic: ByteBuffer::share(topic.as_slice()),
                    qos: *qos,
                })?;
            }
            Scenario::PubAck { message } => {
                io.sink.send(&Packet::PubAck { message_id: message.message_id })?;
            }
            Scenario::PingReq => io.sink.send(&Packet::PingReq)?,
            Scenario::Shutdown => io.sink.send(&Packet::Disconnect)?,
        }
        self.writes.try_reserve(1).map_err(|_| State::OutOfMemory)?;
        self.writes.push_back(id);
        if let Some(task) = self.tasks.get_mut(id) {
            task.phase = Phase::Writing;
        }
        Ok(())
    }

    fn add_task(&mut self, message_id: u16, scenario: Scenario) -> Result<TaskId, State> {
        self.tasks.insert(Task {
            message_id,
            scenario,
            phase: Phase::Queued,
            dup: false,
            timeout: TimeEventHandle::null(),
        })
    }

    /// Arms the connection timeout. It covers the whole connect: socket, TLS
    /// handshake and the wait for CONNACK.
    pub fn begin_connect(&mut self, dispatcher: &mut Dispatcher<Event>) -> Result<(), State> {
        if self.connect_task.is_some() {
            return Err(State::AlreadyInitialized);
        }
        let id = self.add_task(0, Scenario::Connect)?;
        self.connect_task = Some(id);
        if self.timeouts.connection > 0 {
            self.schedule_timeout(dispatcher, id, u64::from(self.timeouts.connection))?;
        }
        Ok(())
    }

    /// Sends the CONNECT once the transport is up.
    pub fn connect(&mut self, io: &mut LogicIo<'_>, packet: &Packet<'_>) -> Result<(), State> {
        let id = self.connect_task.ok_or(State::InternalError)?;
        debug!("sending CONNECT");
        self.send_task(io, id, Some(packet))
    }

    /// Queues a PUBLISH. QoS 0 tasks end once written, QoS 1 tasks once the
    /// PUBACK arrives.
    pub fn publish(
        &mut self,
        io: &mut LogicIo<'_>,
        topic: ByteBuffer<'static>,
        payload: ByteBuffer<'static>,
        qos: QoS,
        retain: bool,
        callback: Option<CallbackId>,
    ) -> Result<(), State> {
        if qos == QoS::ExactlyOnce {
            return Err(State::NotSupported);
        }
        let message_id = if qos == QoS::AtMostOnce { 0 } else { self.next_message_id() };
        let id = self.add_task(message_id, Scenario::Publish { topic, payload, qos, retain, callback })?;
        if let Err(state) = self.send_task(io, id, None) {
            self.tasks.remove(id);
            return Err(state);
        }
        Ok(())
    }

    /// Queues a SUBSCRIBE for a single topic filter.
    pub fn subscribe(
        &mut self,
        io: &mut LogicIo<'_>,
        topic: ByteBuffer<'static>,
        qos: QoS,
        callback: CallbackId,
    ) -> Result<(), State> {
        if qos == QoS::ExactlyOnce {
            return Err(State::NotSupported);
        }
        let message_id = self.next_message_id();
        let id = self.add_task(message_id, Scenario::Subscribe { topic, qos, callback })?;
        if let Err(state) = self.send_task(io, id, None) {
            self.tasks.remove(id);
            return Err(state);
        }
        Ok(())
    }

    /// Sends DISCONNECT. The connection closes with `Ok` once it is written.
    pub fn shutdown(&mut self, io: &mut LogicIo<'_>) -> Result<(), State> {
        if self.shutdown_requested {
            return Err(State::AlreadyInitialized);
        }
        self.shutdown_requested = true;
        let _ = io.dispatcher.cancel(&mut self.keepalive_event);
        let id = self.add_task(0, Scenario::Shutdown)?;
        info!("shutting down connection");
        self.send_task(io, id, None)
    }

    /// Keepalive interval elapsed without other traffic: ping the broker.
    pub fn on_keepalive(&mut self, io: &mut LogicIo<'_>) -> Result<(), State> {
        self.keepalive_event = TimeEventHandle::null();
        if !self.connected || self.shutdown_requested {
            return Ok(());
        }
        debug!("keepalive: sending PINGREQ");
        let id = self.add_task(0, Scenario::PingReq)?;
        self.send_task(io, id, None)
    }

    fn arm_keepalive(&mut self, dispatcher: &mut Dispatcher<Event>) -> Result<(), State> {
        if self.timeouts.keepalive == 0 || !self.connected || self.shutdown_requested {
            return Ok(());
        }
        let delay = u64::from(self.timeouts.keepalive);
        if dispatcher.is_scheduled(&self.keepalive_event) {
            dispatcher.restart(&self.keepalive_event, delay)
        } else {
            self.keepalive_event = dispatcher.execute_in(delay, Event::Keepalive(self.context))?;
            Ok(())
        }
    }

    fn ping_outstanding(&self) -> bool {
        self.tasks
            .iter()
            .any(|(_, task)| matches!(task.scenario, Scenario::PingReq))
    }

    /// Handles the codec's report on the oldest outstanding write.
    pub fn on_written(&mut self, io: &mut LogicIo<'_>, completion: Completion) -> Result<(), State> {
        let id = self.writes.pop_front().ok_or(State::InternalError)?;
        let Some(task) = self.tasks.get_mut(id) else {
            debug!("write completed for finished task {:?}", completion.msg_type);
            return Ok(());
        };
        if task.phase != Phase::Writing {
            return Ok(());
        }
        let written = completion.state == State::Written;
        if written && !self.ping_outstanding() {
            self.arm_keepalive(io.dispatcher)?;
        }
        let Some(task) = self.tasks.get_mut(id) else {
            return Err(State::InternalError);
        };

        if !written {
            task.phase = Phase::Queued;
            match task.scenario {
                Scenario::Publish { qos: QoS::AtMostOnce, callback, .. } => {
                    self.tasks.remove(id);
                    if let Some(callback) = callback {
                        self.notify(Notification::Published { callback, state: completion.state });
                    }
                }
                Scenario::PubAck { .. } | Scenario::PingReq | Scenario::Shutdown => {
                    self.remove_task(io.dispatcher, id);
                }
                _ => {}
            }
            return Ok(());
        }

        match &task.scenario {
            Scenario::Connect => task.phase = Phase::Awaiting,
            Scenario::Publish { qos: QoS::AtMostOnce, callback, .. } => {
                let callback = *callback;
                self.tasks.remove(id);
                if let Some(callback) = callback {
                    self.notify(Notification::Published { callback, state: State::Ok });
                }
            }
            Scenario::Publish { .. } | Scenario::Subscribe { .. } | Scenario::PingReq => {
                task.phase = Phase::Awaiting;
                if self.timeouts.keepalive > 0 {
                    self.schedule_timeout(io.dispatcher, id, u64::from(self.timeouts.keepalive))?;
                }
            }
            Scenario::PubAck { .. } => {
                if let Some(Task { scenario: Scenario::PubAck { message }, .. }) = self.tasks.remove(id) {
                    self.deliver(message);
                }
            }
            Scenario::Shutdown => {
                self.tasks.remove(id);
                self.request_close(State::Ok);
            }
        }
        Ok(())
    }

    fn deliver(&mut self, message: Rc<InboundPublish>) {
        let Some(topic) = message.topic.as_str() else {
            warn!("dropping message with a non UTF-8 topic");
            return;
        };
        let matching: Vec<CallbackId> = self
            .subscriptions
            .iter()
            .filter(|subscription| {
                subscription
                    .filter
                    .as_str()
                    .is_some_and(|filter| topic_matches(filter, topic))
            })
            .map(|subscription| subscription.callback)
            .collect();
        if matching.is_empty() {
            debug!("no subscription for topic {}", topic);
        }
        for callback in matching {
            self.notify(Notification::Message { callback, message: message.clone() });
        }
    }

    fn find_awaiting(&self, message_id: u16, kind: PacketType) -> Option<TaskId> {
        self.tasks
            .iter()
            .find(|(_, task)| {
                task.message_id == message_id
                    && matches!(
                        (&task.scenario, kind),
                        (Scenario::Publish { .. }, PacketType::PubAck)
                            | (Scenario::Subscribe { .. }, PacketType::SubAck)
                    )
                    && task.phase != Phase::Queued
            })
            .map(|(id, _)| id)
    }

    /// Handles a packet received from the broker.
    pub fn on_packet(&mut self, io: &mut LogicIo<'_>, packet: Packet<'static>) -> Result<(), State> {
        match packet {
            Packet::ConnAck { session_present, return_code } => {
                let id = self.connect_task.take().ok_or(State::MqttLogicWrongMessageReceived)?;
                self.remove_task(io.dispatcher, id);
                let state = match return_code {
                    0 => State::Ok,
                    1 => State::MqttUnacceptableProtocolVersion,
                    2 => State::MqttIdentifierRejected,
                    3 => State::MqttServerUnavailable,
                    4 => State::MqttBadUsernameOrPassword,
                    5 => State::MqttNotAuthorized,
                    _ => State::MqttConnectUnknownReturnCode,
                };
                if state != State::Ok {
                    warn!("broker refused CONNECT: {}", state);
                    self.request_close(state);
                    return Ok(());
                }
                info!("connected, session present: {}", session_present);
                self.connected = true;
                self.arm_keepalive(io.dispatcher)?;
                self.notify(Notification::Connected { session_present });
                self.resend_stored(io)
            }
            Packet::Publish { topic, payload, qos, retain, dup, message_id } => {
                let message = Rc::new(InboundPublish { topic, payload, qos, retain, dup, message_id });
                match qos {
                    QoS::AtMostOnce => {
                        self.deliver(message);
                        Ok(())
                    }
                    QoS::AtLeastOnce => {
                        let id = self.add_task(message_id, Scenario::PubAck { message })?;
                        self.send_task(io, id, None)
                    }
                    QoS::ExactlyOnce => {
                        warn!("dropping QoS 2 message {}", message_id);
                        Ok(())
                    }
                }
            }
            Packet::PubAck { message_id } => {
                let id = self
                    .find_awaiting(message_id, PacketType::PubAck)
                    .ok_or(State::MqttUnknownMessageId)?;
                if let Some(Task { scenario: Scenario::Publish { callback, .. }, .. }) =
                    self.remove_task(io.dispatcher, id)
                {
                    debug!("PUBACK for message {}", message_id);
                    if let Some(callback) = callback {
                        self.notify(Notification::Published { callback, state: State::Ok });
                    }
                }
                Ok(())
            }
            Packet::SubAck { message_id, status } => {
                let id = self
                    .find_awaiting(message_id, PacketType::SubAck)
                    .ok_or(State::MqttUnknownMessageId)?;
                let Some(Task { scenario: Scenario::Subscribe { topic, qos, callback }, .. }) =
                    self.remove_task(io.dispatcher, id)
                else {
                    return Err(State::InternalError);
                };
                match status {
                    SubAckStatus::Granted(granted) => {
                        self.subscriptions.try_reserve(1).map_err(|_| State::OutOfMemory)?;
                        let reported = topic.clone();
                        self.subscriptions.retain(|existing| existing.filter != topic);
                        self.subscriptions.push(Subscription { filter: topic, qos: granted, callback });
                        self.notify(Notification::SubAck {
                            callback,
                            topic: reported,
                            qos: granted,
                            state: State::MqttSubscriptionSuccessful,
                        });
                    }
                    SubAckStatus::Failure => {
                        warn!("subscription {} refused", message_id);
                        self.notify(Notification::SubAck {
                            callback,
                            topic,
                            qos,
                            state: State::MqttSubscriptionFailed,
                        });
                        self.notify(Notification::Released { callback });
                    }
                }
                Ok(())
            }
            Packet::PingResp => {
                let ping = self
                    .tasks
                    .iter()
                    .find(|(_, task)| matches!(task.scenario, Scenario::PingReq))
                    .map(|(id, _)| id);
                if let Some(id) = ping {
                    self.remove_task(io.dispatcher, id);
                }
                self.arm_keepalive(io.dispatcher)
            }
            other => {
                warn!("unexpected {:?} from broker", other.packet_type());
                Err(State::MqttLogicWrongMessageReceived)
            }
        }
    }

    fn resend_stored(&mut self, io: &mut LogicIo<'_>) -> Result<(), State> {
        let stored: Vec<TaskId> = self
            .tasks
            .iter()
            .filter(|(_, task)| {
                task.phase == Phase::Queued
                    && matches!(task.scenario, Scenario::Publish { .. } | Scenario::Subscribe { .. })
            })
            .map(|(id, _)| id)
            .collect();
        for id in stored {
            if let Some(task) = self.tasks.get_mut(id) {
                task.dup = matches!(task.scenario, Scenario::Publish { .. });
            }
            debug!("resending stored task");
            self.send_task(io, id, None)?;
        }
        Ok(())
    }

    /// Handles a fired task timeout.
    ///
    /// A timed out connect or ping closes the connection; a publish or subscribe
    /// still waiting for its acknowledgement is sent again.
    pub fn on_timeout(&mut self, io: &mut LogicIo<'_>, id: TaskId) -> Result<(), State> {
        let Some(task) = self.tasks.get_mut(id) else {
            return Ok(());
        };
        task.timeout = TimeEventHandle::null();
        match task.scenario {
            Scenario::Connect | Scenario::PingReq => {
                warn!("{} timed out", if matches!(task.scenario, Scenario::Connect) { "connect" } else { "ping" });
                self.request_close(State::Timeout);
                Ok(())
            }
            Scenario::Publish { .. } | Scenario::Subscribe { .. } if task.phase == Phase::Awaiting => {
                warn!("message {} not acknowledged, resending", task.message_id);
                task.dup = matches!(task.scenario, Scenario::Publish { .. });
                self.send_task(io, id, None)
            }
            _ => Ok(()),
        }
    }

    /// Tears the logic state down after the transport closed with `state`.
    ///
    /// With a continued session, subscriptions and QoS 1 operations are kept for the
    /// next connection. Otherwise every pending operation is failed with `state`,
    /// or `Timeout` for an intentional close, and every subscription is released.
    pub fn close(&mut self, dispatcher: &mut Dispatcher<Event>, state: State) {
        let _ = dispatcher.cancel(&mut self.keepalive_event);
        self.connected = false;
        self.shutdown_requested = false;
        self.connect_task = None;
        self.writes.clear();
        let failure = if state == State::Ok { State::Timeout } else { state };
        let keep = self.session == SessionType::Continue;

        for id in self.tasks.keys() {
            let Some(task) = self.tasks.get_mut(id) else {
                continue;
            };
            let _ = dispatcher.cancel(&mut task.timeout);
            task.phase = Phase::Queued;
            let durable = matches!(
                task.scenario,
                Scenario::Publish { qos: QoS::AtLeastOnce, .. } | Scenario::Subscribe { .. }
            );
            if keep && durable {
                continue;
            }
            match self.tasks.remove(id).map(|task| task.scenario) {
                Some(Scenario::Publish { callback: Some(callback), .. }) => {
                    self.notify(Notification::Published { callback, state: failure });
                }
                Some(Scenario::Subscribe { topic, qos, callback }) => {
                    self.notify(Notification::SubAck { callback, topic, qos, state: failure });
                    self.notify(Notification::Released { callback });
                }
                _ => {}
            }
        }

        if !keep {
            for subscription in core::mem::take(&mut self.subscriptions) {
                self.notify(Notification::Released { callback: subscription.callback });
            }
        }
        debug!("logic layer closed with {:?}, {} tasks kept", state, self.tasks.len());
    }

    /// Drops everything, releasing every callback still referenced.
    pub fn release_all(&mut self, dispatcher: &mut Dispatcher<Event>) {
        let session = self.session;
        self.session = SessionType::Clean;
        self.close(dispatcher, State::Ok);
        self.session = session;
        self.close_request = None;
    }
}
