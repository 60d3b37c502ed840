use alloc::collections::VecDeque;

use log::{debug, info, trace, warn};

use super::{ConnectionData, ConnectionState};
use crate::client::ContextHandle;
use crate::config::Config;
use crate::error::State;
use crate::event::{Dispatcher, Event};
use crate::layer::{Step, Suspend};
use crate::memory::ByteBuffer;
use crate::mqtt::codec::CodecLayer;
use crate::mqtt::logic::{CallbackId, LogicIo, LogicLayer, Notification, PacketSink, TaskId};
use crate::mqtt::{Packet, QoS};
use crate::network::{Connect, Interest, Readiness, SocketId};
use crate::platform::Platform;
use crate::tls::{TlsLayer, TlsProvider, TlsState};

type PlatformTls<P> = TlsLayer<<P as Connect>::Socket, <P as TlsProvider>::Session>;

/// Hands serialized frames from the codec to the slot in front of the TLS layer.
struct Outbound<'a> {
    codec: &'a mut CodecLayer,
    frame: &'a mut Option<ByteBuffer<'static>>,
}

impl PacketSink for Outbound<'_> {
    fn send(&mut self, packet: &Packet<'_>) -> Result<(), State> {
        if let Some(frame) = self.codec.push(packet)? {
            if self.frame.replace(frame).is_some() {
                return Err(State::InternalError);
            }
        }
        Ok(())
    }
}

/// Refuses every packet; used while a link is torn down.
struct Detached;

impl PacketSink for Detached {
    fn send(&mut self, _packet: &Packet<'_>) -> Result<(), State> {
        Err(State::SocketNoActiveConnection)
    }
}

struct Transport<P: Platform> {
    tls: PlatformTls<P>,
    codec: CodecLayer,
    /// Frame released by the codec and not yet taken by the TLS layer.
    frame: Option<ByteBuffer<'static>>,
    /// What the handshake last waited for.
    wait: Suspend,
}

impl<P: Platform> core::fmt::Debug for Transport<P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Transport")
            .field("tls", &self.tls.state())
            .field("codec", &self.codec)
            .field("frame", &self.frame.as_ref().map(ByteBuffer::len))
            .finish()
    }
}

/// One connection context: its data, its state and its layer chain.
///
/// Every method that drives the link returns `Err(state)` when the link has to be
/// closed with `state`; the owner then calls [`close`](Self::close). A close the
/// logic layer asks for without an error (a completed shutdown) is reported by
/// [`take_close_request`](Self::take_close_request).
pub struct Connection<P: Platform> {
    handle: ContextHandle,
    data: ConnectionData,
    state: ConnectionState,
    logic: LogicLayer,
    transport: Option<Transport<P>>,
}

impl<P: Platform> core::fmt::Debug for Connection<P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Connection")
            .field("handle", &self.handle)
            .field("host", &self.data.host)
            .field("port", &self.data.port)
            .field("state", &self.state)
            .field("transport", &self.transport)
            .finish_non_exhaustive()
    }
}

impl<P: Platform> Connection<P> {
    pub fn new(handle: ContextHandle, data: ConnectionData) -> Self {
        let logic = LogicLayer::new(handle, data.timeouts(), data.session);
        Self { handle, data, state: ConnectionState::Uninitialized, logic, transport: None }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn data(&self) -> &ConnectionData {
        &self.data
    }

    /// Replaces the connection data for the next [`open`](Self::open).
    pub fn set_data(&mut self, data: ConnectionData) {
        self.logic.configure(data.timeouts(), data.session);
        self.data = data;
    }

    /// Socket of the current link, once the TCP connect started.
    pub fn socket_id(&self) -> Option<SocketId> {
        self.transport.as_ref().and_then(|transport| transport.tls.socket_id())
    }

    pub fn logic(&self) -> &LogicLayer {
        &self.logic
    }

    pub fn take_notifications(&mut self) -> VecDeque<Notification> {
        self.logic.take_notifications()
    }

    pub fn take_close_request(&mut self) -> Option<State> {
        self.logic.take_close_request()
    }

    /// Starts a new link: fresh credentials, a new layer chain and the connection
    /// timeout. The first layer step runs from the event loop.
    pub fn open(&mut self, platform: &mut P, dispatcher: &mut Dispatcher<Event>, config: &Config) -> Result<(), State> {
        if matches!(self.state, ConnectionState::Connecting | ConnectionState::Connected) {
            return Err(State::AlreadyInitialized);
        }
        self.state = ConnectionState::Connecting;
        let issued_at = platform.unix_time();
        self.data.refresh_password(platform, issued_at)?;
        let tls = TlsLayer::new(
            &self.data.host,
            self.data.port,
            &config.ca_resource,
            config.io_buffer_size,
        )?;
        self.transport = Some(Transport {
            tls,
            codec: CodecLayer::new(config.max_inbound_packet),
            frame: None,
            wait: Suspend::Yield,
        });
        self.logic.begin_connect(dispatcher)?;
        info!("connecting to {}:{}", self.data.host, self.data.port);
        dispatcher.execute(Event::Resume(self.handle))
    }

    /// Drives the link without socket readiness: certificate loading, a retried
    /// handshake, or writing frames queued by the public API.
    pub fn resume(&mut self, platform: &mut P, dispatcher: &mut Dispatcher<Event>) -> Result<(), State> {
        let Some(transport) = self.transport.as_mut() else {
            return Ok(());
        };
        match transport.tls.state() {
            TlsState::Connected => {
                self.flush(dispatcher)?;
            }
            TlsState::Closing | TlsState::Closed => return Ok(()),
            _ => {
                let step = transport.tls.resume(platform)?;
                self.after_tls_step(step, dispatcher)?;
            }
        }
        self.register(dispatcher)
    }

    /// Handles what the poll observed on this context's socket.
    pub fn on_readiness(
        &mut self,
        platform: &mut P,
        dispatcher: &mut Dispatcher<Event>,
        readiness: Readiness,
    ) -> Result<(), State> {
        let Some(transport) = self.transport.as_mut() else {
            return Ok(());
        };
        let tls_state = transport.tls.state();
        if readiness.error {
            warn!("socket error reported while {:?}", tls_state);
            return Err(match tls_state {
                TlsState::Connecting => State::SocketConnection,
                _ => State::ConnectionResetByPeer,
            });
        }
        match tls_state {
            TlsState::Connecting if readiness.connect_finished || readiness.can_write => {
                let step = transport.tls.on_connected()?;
                self.after_tls_step(step, dispatcher)?;
            }
            TlsState::Handshaking if readiness.can_read || readiness.can_write => {
                let step = transport.tls.resume(platform)?;
                self.after_tls_step(step, dispatcher)?;
            }
            TlsState::Connected => {
                if readiness.can_write {
                    self.flush(dispatcher)?;
                }
                if readiness.can_read {
                    self.receive(dispatcher)?;
                }
            }
            _ => {}
        }
        self.register(dispatcher)
    }

    fn after_tls_step(&mut self, step: Step<()>, dispatcher: &mut Dispatcher<Event>) -> Result<(), State> {
        let transport = self.transport.as_mut().ok_or(State::InternalError)?;
        match step {
            Step::Suspended(Suspend::Yield) => dispatcher.execute(Event::Resume(self.handle)),
            Step::Suspended(reason) => {
                transport.wait = reason;
                Ok(())
            }
            Step::Done(()) => {
                debug!("transport ready, sending CONNECT");
                let packet = self.data.connect_packet();
                let mut sink = Outbound { codec: &mut transport.codec, frame: &mut transport.frame };
                let mut io = LogicIo { dispatcher: &mut *dispatcher, sink: &mut sink };
                self.logic.connect(&mut io, &packet)?;
                self.flush(dispatcher)?;
                let pending = self.transport.as_ref().map_or(0, |transport| transport.tls.pending());
                if pending > 0 {
                    trace!("{} bytes buffered during handshake", pending);
                    self.receive(dispatcher)?;
                }
                Ok(())
            }
        }
    }

    /// Writes queued frames until the socket stops taking data, reporting each
    /// completed write to the logic layer.
    fn flush(&mut self, dispatcher: &mut Dispatcher<Event>) -> Result<(), State> {
        let Some(transport) = self.transport.as_mut() else {
            return Ok(());
        };
        loop {
            if transport.tls.has_outbound() {
                match transport.tls.send()? {
                    Step::Suspended(reason) => {
                        transport.wait = reason;
                        break;
                    }
                    Step::Done(()) => {
                        let (completion, next) = transport.codec.on_written(State::Written)?;
                        if let Some(next) = next {
                            if transport.frame.replace(next).is_some() {
                                return Err(State::InternalError);
                            }
                        }
                        let mut sink = Outbound { codec: &mut transport.codec, frame: &mut transport.frame };
                        let mut io = LogicIo { dispatcher: &mut *dispatcher, sink: &mut sink };
                        self.logic.on_written(&mut io, completion)?;
                    }
                }
            } else if let Some(frame) = transport.frame.take() {
                transport.tls.push(frame)?;
            } else {
                break;
            }
        }
        self.update_state();
        Ok(())
    }

    /// Decodes everything readable and hands complete packets to the logic layer.
    fn receive(&mut self, dispatcher: &mut Dispatcher<Event>) -> Result<(), State> {
        loop {
            let transport = self.transport.as_mut().ok_or(State::InternalError)?;
            let capacity = transport.tls.decode_capacity();
            let Some(bytes) = transport.tls.receive()? else {
                break;
            };
            let full = bytes.len() == capacity;
            let mut input = ByteBuffer::share(bytes);
            let packets = transport.codec.pull(&mut input)?;
            for packet in packets {
                trace!("received {:?}", packet.packet_type());
                let mut sink = Outbound { codec: &mut transport.codec, frame: &mut transport.frame };
                let mut io = LogicIo { dispatcher: &mut *dispatcher, sink: &mut sink };
                self.logic.on_packet(&mut io, packet)?;
            }
            self.update_state();
            if self.logic.close_pending() {
                return Ok(());
            }
            let more = full || self.transport.as_ref().is_some_and(|transport| transport.tls.pending() > 0);
            if !more {
                break;
            }
        }
        self.flush(dispatcher)
    }

    fn update_state(&mut self) {
        if self.state == ConnectionState::Connecting && self.logic.is_connected() {
            self.state = ConnectionState::Connected;
        }
    }

    /// Registers the socket readiness the layer chain waits for.
    fn register(&self, dispatcher: &mut Dispatcher<Event>) -> Result<(), State> {
        let Some(transport) = self.transport.as_ref() else {
            return Ok(());
        };
        let Some(socket) = transport.tls.socket_id() else {
            return Ok(());
        };
        let interest = match transport.tls.state() {
            TlsState::Connecting => Interest::CONNECT,
            TlsState::Handshaking => transport.wait.interest(),
            TlsState::Connected => Interest {
                read: true,
                write: transport.tls.has_outbound() || transport.frame.is_some(),
                connect: false,
                error: true,
            },
            _ => Interest::NONE,
        };
        dispatcher.register(socket, interest)
    }

    /// Queues a PUBLISH; it is written from the event loop.
    pub fn publish(
        &mut self,
        dispatcher: &mut Dispatcher<Event>,
        topic: ByteBuffer<'static>,
        payload: ByteBuffer<'static>,
        qos: QoS,
        retain: bool,
        callback: Option<CallbackId>,
    ) -> Result<(), State> {
        let handle = self.handle;
        if self.state != ConnectionState::Connected {
            return Err(State::SocketNoActiveConnection);
        }
        let transport = self.transport.as_mut().ok_or(State::SocketNoActiveConnection)?;
        let mut sink = Outbound { codec: &mut transport.codec, frame: &mut transport.frame };
        let mut io = LogicIo { dispatcher: &mut *dispatcher, sink: &mut sink };
        self.logic.publish(&mut io, topic, payload, qos, retain, callback)?;
        dispatcher.execute(Event::Resume(handle))
    }

    /// Queues a SUBSCRIBE; it is written from the event loop.
    pub fn subscribe(
        &mut self,
        dispatcher: &mut Dispatcher<Event>,
        topic: ByteBuffer<'static>,
        qos: QoS,
        callback: CallbackId,
    ) -> Result<(), State> {
        let handle = self.handle;
        if self.state != ConnectionState::Connected {
            return Err(State::SocketNoActiveConnection);
        }
        let transport = self.transport.as_mut().ok_or(State::SocketNoActiveConnection)?;
        let mut sink = Outbound { codec: &mut transport.codec, frame: &mut transport.frame };
        let mut io = LogicIo { dispatcher: &mut *dispatcher, sink: &mut sink };
        self.logic.subscribe(&mut io, topic, qos, callback)?;
        dispatcher.execute(Event::Resume(handle))
    }

    /// Queues a DISCONNECT; the link closes with `Ok` once it is written.
    pub fn shutdown(&mut self, dispatcher: &mut Dispatcher<Event>) -> Result<(), State> {
        let handle = self.handle;
        if self.state != ConnectionState::Connected {
            return Err(State::SocketNoActiveConnection);
        }
        let transport = self.transport.as_mut().ok_or(State::SocketNoActiveConnection)?;
        let mut sink = Outbound { codec: &mut transport.codec, frame: &mut transport.frame };
        let mut io = LogicIo { dispatcher: &mut *dispatcher, sink: &mut sink };
        self.logic.shutdown(&mut io)?;
        self.state = ConnectionState::Closing;
        dispatcher.execute(Event::Resume(handle))
    }

    /// A task timeout fired.
    pub fn on_timeout(&mut self, dispatcher: &mut Dispatcher<Event>, task: TaskId) -> Result<(), State> {
        match self.transport.as_mut() {
            Some(transport) if transport.tls.state() == TlsState::Connected => {
                let mut sink = Outbound { codec: &mut transport.codec, frame: &mut transport.frame };
                let mut io = LogicIo { dispatcher: &mut *dispatcher, sink: &mut sink };
                self.logic.on_timeout(&mut io, task)?;
                self.flush(dispatcher)?;
                self.register(dispatcher)
            }
            _ => {
                let mut sink = Detached;
                let mut io = LogicIo { dispatcher, sink: &mut sink };
                self.logic.on_timeout(&mut io, task)
            }
        }
    }

    /// The keepalive interval elapsed.
    pub fn on_keepalive(&mut self, dispatcher: &mut Dispatcher<Event>) -> Result<(), State> {
        let Some(transport) = self.transport.as_mut() else {
            return Ok(());
        };
        let mut sink = Outbound { codec: &mut transport.codec, frame: &mut transport.frame };
        let mut io = LogicIo { dispatcher: &mut *dispatcher, sink: &mut sink };
        self.logic.on_keepalive(&mut io)?;
        self.flush(dispatcher)?;
        self.register(dispatcher)
    }

    /// Tears the link down with `state` and leaves the context `Closed`.
    ///
    /// Queued frames are failed, the logic layer settles its tasks according to
    /// the session type, and the TLS layer releases its session and socket.
    pub fn close(&mut self, platform: &mut P, dispatcher: &mut Dispatcher<Event>, state: State) {
        if matches!(self.state, ConnectionState::Closed | ConnectionState::Uninitialized) && self.transport.is_none() {
            return;
        }
        self.state = ConnectionState::Closing;
        if let Some(mut transport) = self.transport.take() {
            if let Some(socket) = transport.tls.socket_id() {
                dispatcher.unregister(socket);
            }
            let mut sink = Detached;
            for completion in transport.codec.close() {
                let mut io = LogicIo { dispatcher: &mut *dispatcher, sink: &mut sink };
                if let Err(error) = self.logic.on_written(&mut io, completion) {
                    warn!("failing unwritten frame on close: {}", error);
                }
            }
            if let Err(error) = transport.tls.close(platform) {
                warn!("closing TLS layer: {:?}", error);
            }
        }
        self.logic.close(dispatcher, state);
        self.state = ConnectionState::Closed;
        info!("connection closed: {}", state);
    }

    /// Releases every callback the logic layer still refers to.
    pub fn release(&mut self, dispatcher: &mut Dispatcher<Event>) {
        self.logic.release_all(dispatcher);
    }
}
