//! # Client
//!
//! [`Client`] is the process-wide context object: it owns the platform, the
//! event dispatcher, the shared backoff policy and the tables of connection
//! contexts, timed tasks and user callbacks. Every public operation of the
//! library is a method on it.
//!
//! ```text
//!                         ┌──────────────────── Client<P> ────────────────────┐
//!  create_context ──────▶ │ contexts     [Option<Context>; max_contexts]      │
//!  connect / publish ───▶ │   └─ Connection ─▶ logic ─▶ codec ─▶ TLS ─▶ IO    │
//!  schedule_timed_task ─▶ │ timed_tasks  Arena<TimedTask>                     │
//!                         │ callbacks    Arena<Callback> (publish, subscribe) │
//!                         │ backoff      shared reconnect penalty             │
//!  events_process_* ────▶ │ dispatcher   time events, ready queue, sockets    │
//!                         └───────────────────────────────────────────────────┘
//! ```
//!
//! Callbacks receive `&mut Client` and may call any method, including
//! [`Client::connect`] from a connection callback or
//! [`Client::cancel_timed_task`] from a task's own callback.
//!
//! ## Example
//!
//! ```rust,ignore
//! use libiotc::client::{Client, ConnectOptions};
//! use libiotc::config::Config;
//! use libiotc::crypto::PrivateKey;
//! use libiotc::mqtt::QoS;
//!
//! let mut client = Client::initialize(platform, Config::default())?;
//! let context = client.create_context()?;
//! client.connect(
//!     context,
//!     "my-project",
//!     "projects/my-project/locations/us-central1/registries/r/devices/d",
//!     &PrivateKey::pem(KEY_PEM),
//!     ConnectOptions::default(),
//!     |client, context, state| {
//!         if state == libiotc::State::Ok {
//!             let _ = client.publish(context, "/devices/d/events", "hello", QoS::AtMostOnce, None);
//!         }
//!     },
//! )?;
//! client.events_process_blocking();
//! ```

#![allow(missing_docs)]
#![deny(unsafe_code)]

mod dispatch;

use alloc::boxed::Box;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt;

use log::{debug, info, warn};

use crate::backoff::{Backoff, BackoffClass};
use crate::config::Config;
use crate::connection::{Connection, ConnectionData, ConnectionState, DEFAULT_USERNAME};
use crate::crypto::PrivateKey;
use crate::error::State;
use crate::event::{Dispatcher, Event, TimeEventHandle};
use crate::memory::{Arena, ArenaKey, ByteBuffer};
use crate::mqtt::logic::{CallbackId, Notification, SessionType};
use crate::mqtt::{LastWill, QoS};
use crate::platform::Platform;

/// Opaque reference to a connection context.
///
/// A handle stays valid until [`Client::delete_context`]; afterwards its slot may
/// be handed out again by [`Client::create_context`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextHandle(u32);

impl ContextHandle {
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Opaque reference to a scheduled timed task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimedTaskHandle(ArenaKey);

/// Connection state changes: `Ok` once connected, the closing state on disconnect.
pub type ConnectionCallback<P> = Box<dyn FnMut(&mut Client<P>, ContextHandle, State)>;

/// Outcome of one publish: `Ok` when written (QoS 0) or acknowledged (QoS 1).
pub type PublishCallback<P> = Box<dyn FnOnce(&mut Client<P>, ContextHandle, State)>;

/// Subscription acknowledgements and matching inbound messages.
pub type SubscriptionCallback<P> =
    Box<dyn FnMut(&mut Client<P>, ContextHandle, SubscriptionEvent<'_>, State)>;

/// A timed task firing.
pub type TimedTaskCallback<P> = Box<dyn FnMut(&mut Client<P>, TimedTaskHandle)>;

/// What a subscription callback is told about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionEvent<'a> {
    /// The broker answered the SUBSCRIBE. The callback state is
    /// `MqttSubscriptionSuccessful` or `MqttSubscriptionFailed`.
    SubAck { topic: &'a str, qos: QoS },
    /// A PUBLISH matching the subscription arrived.
    Message { topic: &'a str, payload: &'a [u8], qos: QoS, retain: bool, dup: bool },
}

/// Last will registered with the broker at connect time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Will {
    pub topic: String,
    pub message: String,
    pub qos: QoS,
    pub retain: bool,
}

/// Per-connection settings for [`Client::connect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Seconds allowed for socket connect, TLS handshake and CONNACK.
    pub connection_timeout: u32,
    /// MQTT keepalive interval in seconds, zero to disable.
    pub keepalive_timeout: u16,
    /// Lifetime of the generated JWT in seconds.
    pub jwt_expiration: u32,
    pub will: Option<Will>,
    pub session: SessionType,
    /// Reconnect after recoverable failures.
    pub auto_reconnect: bool,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            connection_timeout: 10,
            keepalive_timeout: 20,
            jwt_expiration: 3600,
            will: None,
            session: SessionType::Clean,
            auto_reconnect: true,
        }
    }
}

struct Context<P: Platform> {
    connection: Option<Connection<P>>,
    callback: Option<ConnectionCallback<P>>,
    /// Pending `Event::Connect`, null when no connect is scheduled.
    connect_event: TimeEventHandle,
    auto_reconnect: bool,
    /// Bumped by `connect` and `shutdown_connection`.
    epoch: u32,
    /// Number of user callbacks of this context currently running.
    callback_depth: u32,
    delete_requested: bool,
}

impl<P: Platform> Context<P> {
    fn new() -> Self {
        Self {
            connection: None,
            callback: None,
            connect_event: TimeEventHandle::null(),
            auto_reconnect: true,
            epoch: 0,
            callback_depth: 0,
            delete_requested: false,
        }
    }

    fn connection_state(&self) -> ConnectionState {
        self.connection.as_ref().map_or(ConnectionState::Uninitialized, Connection::state)
    }
}

enum Callback<P: Platform> {
    Publish(Option<PublishCallback<P>>),
    /// `None` while the callback runs.
    Subscription(Option<SubscriptionCallback<P>>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskState {
    Scheduled,
    Running,
    /// Cancelled from its own callback.
    Cancelled,
}

struct TimedTask<P: Platform> {
    context: ContextHandle,
    callback: Option<TimedTaskCallback<P>>,
    event: TimeEventHandle,
    repeat: bool,
    state: TaskState,
}

/// The library instance. See the [module documentation](self).
pub struct Client<P: Platform> {
    platform: P,
    config: Config,
    dispatcher: Dispatcher<Event>,
    backoff: Backoff,
    contexts: Vec<Option<Context<P>>>,
    timed_tasks: Arena<TimedTask<P>>,
    callbacks: Arena<Callback<P>>,
}

impl<P: Platform> fmt::Debug for Client<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .field("dispatcher", &self.dispatcher)
            .field("backoff", &self.backoff)
            .field("contexts", &self.contexts.iter().filter(|slot| slot.is_some()).count())
            .field("timed_tasks", &self.timed_tasks.len())
            .field("callbacks", &self.callbacks.len())
            .finish_non_exhaustive()
    }
}

impl<P: Platform> Client<P> {
    /// Creates the library instance around a board support package.
    ///
    /// Fails with `InvalidParameter` when `config` does not validate.
    pub fn initialize(platform: P, config: Config) -> Result<Self, State> {
        config.validate()?;
        let backoff = Backoff::new(&config.backoff_table, &config.decay_table)?;
        let mut contexts = Vec::new();
        contexts.resize_with(config.max_contexts, || None);
        info!("client initialized, {} contexts", config.max_contexts);
        Ok(Self {
            platform,
            dispatcher: Dispatcher::new(),
            backoff,
            contexts,
            timed_tasks: Arena::new(config.max_timed_tasks),
            callbacks: Arena::new(usize::MAX),
            config,
        })
    }

    /// Tears every context down without invoking callbacks and hands the
    /// platform back.
    pub fn shutdown(mut self) -> P {
        for index in 0..self.contexts.len() {
            self.discard_context(ContextHandle(index as u32));
        }
        let _ = self.backoff.cancel(&mut self.dispatcher);
        self.dispatcher.clear();
        self.platform
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    pub fn dispatcher(&self) -> &Dispatcher<Event> {
        &self.dispatcher
    }

    /// Allocates a connection context.
    ///
    /// Fails with `NoMoreResourceAvailable` once `max_contexts` exist.
    pub fn create_context(&mut self) -> Result<ContextHandle, State> {
        let index = self
            .contexts
            .iter()
            .position(Option::is_none)
            .ok_or(State::NoMoreResourceAvailable)?;
        self.contexts[index] = Some(Context::new());
        debug!("context {} created", index);
        Ok(ContextHandle(index as u32))
    }

    /// Frees a context, closing its connection without invoking its callback.
    ///
    /// From inside one of the context's own callbacks the deletion happens once
    /// the callback returns.
    pub fn delete_context(&mut self, handle: ContextHandle) -> Result<(), State> {
        let context = self.context_mut(handle)?;
        if context.callback_depth > 0 {
            context.delete_requested = true;
            return Ok(());
        }
        self.discard_context(handle);
        debug!("context {} deleted", handle.raw());
        Ok(())
    }

    pub fn is_context_connected(&self, handle: ContextHandle) -> bool {
        self.context(handle)
            .is_ok_and(|context| context.connection_state() == ConnectionState::Connected)
    }

    /// State of a context's connection, `Uninitialized` before the first connect.
    pub fn connection_state(&self, handle: ContextHandle) -> Result<ConnectionState, State> {
        self.context(handle).map(Context::connection_state)
    }

    /// The connection of a context, once it was asked to connect.
    pub fn connection(&self, handle: ContextHandle) -> Option<&Connection<P>> {
        self.context(handle).ok().and_then(|context| context.connection.as_ref())
    }

    /// Connects to the configured default endpoint. See [`connect_to`](Self::connect_to).
    pub fn connect<F>(
        &mut self,
        handle: ContextHandle,
        project_id: &str,
        device_path: &str,
        private_key: &PrivateKey,
        options: ConnectOptions,
        callback: F,
    ) -> Result<(), State>
    where
        F: FnMut(&mut Client<P>, ContextHandle, State) + 'static,
    {
        let host = self.config.default_host.clone();
        let port = self.config.default_port;
        self.connect_to(handle, &host, port, project_id, device_path, private_key, options, callback)
    }

    /// Schedules a connect to `host:port`.
    ///
    /// Parameters are checked synchronously; the connect itself starts from the
    /// event loop once the current backoff penalty has elapsed, and its outcome
    /// reaches `callback`.
    #[allow(clippy::too_many_arguments)]
    pub fn connect_to<F>(
        &mut self,
        handle: ContextHandle,
        host: &str,
        port: u16,
        project_id: &str,
        device_path: &str,
        private_key: &PrivateKey,
        options: ConnectOptions,
        callback: F,
    ) -> Result<(), State>
    where
        F: FnMut(&mut Client<P>, ContextHandle, State) + 'static,
    {
        self.context(handle)?;
        if host.is_empty() {
            return Err(State::NullHost);
        }
        if project_id.is_empty() {
            return Err(State::NullProjectId);
        }
        if device_path.is_empty() {
            return Err(State::NullDevicePath);
        }
        if private_key.is_empty() {
            return Err(State::NullKeyData);
        }
        let will = match options.will {
            Some(will) if will.topic.is_empty() && will.message.is_empty() => None,
            Some(will) if will.topic.is_empty() => return Err(State::NullWillTopic),
            Some(will) if will.message.is_empty() => return Err(State::NullWillMessage),
            Some(will) => Some(LastWill {
                topic: ByteBuffer::copy_from_str(&will.topic)?,
                message: ByteBuffer::copy_from_str(&will.message)?,
                qos: will.qos,
                retain: will.retain,
            }),
            None => None,
        };

        let data = ConnectionData {
            host: host.to_string(),
            port,
            client_id: device_path.to_string(),
            username: DEFAULT_USERNAME.to_string(),
            password: String::new(),
            project_id: project_id.to_string(),
            private_key: private_key.clone(),
            connection_timeout: options.connection_timeout,
            keepalive_timeout: options.keepalive_timeout,
            jwt_expiration: options.jwt_expiration,
            will,
            session: options.session,
        };

        let penalty = self.backoff.penalty(&mut self.platform);
        let Self { contexts, dispatcher, .. } = self;
        let context = contexts
            .get_mut(handle.index())
            .and_then(Option::as_mut)
            .ok_or(State::NullContext)?;
        if dispatcher.is_scheduled(&context.connect_event)
            || matches!(
                context.connection_state(),
                ConnectionState::Connecting | ConnectionState::Connected | ConnectionState::Closing
            )
        {
            return Err(State::AlreadyInitialized);
        }
        match context.connection.as_mut() {
            Some(connection) => connection.set_data(data),
            None => context.connection = Some(Connection::new(handle, data)),
        }
        context.connect_event = dispatcher.execute_in(penalty, Event::Connect(handle))?;
        context.callback = Some(Box::new(callback));
        context.auto_reconnect = options.auto_reconnect;
        context.epoch = context.epoch.wrapping_add(1);
        info!("context {} connecting to {}:{} in {}s", handle.raw(), host, port, penalty);
        Ok(())
    }

    /// Publishes a UTF-8 message. See [`publish_data`](Self::publish_data).
    pub fn publish(
        &mut self,
        handle: ContextHandle,
        topic: &str,
        message: &str,
        qos: QoS,
        callback: Option<PublishCallback<P>>,
    ) -> Result<(), State> {
        self.publish_data(handle, topic, message.as_bytes(), qos, callback)
    }

    /// Queues a PUBLISH on a connected context.
    ///
    /// `callback`, if any, receives `Ok` once a QoS 0 message is written or a QoS 1
    /// message is acknowledged, and the failure state otherwise. QoS 2 is
    /// `NotSupported`.
    pub fn publish_data(
        &mut self,
        handle: ContextHandle,
        topic: &str,
        payload: &[u8],
        qos: QoS,
        callback: Option<PublishCallback<P>>,
    ) -> Result<(), State> {
        if topic.is_empty() {
            return Err(State::InvalidParameter);
        }
        self.ensure_connected(handle)?;
        let topic = ByteBuffer::copy_from_str(topic)?;
        let payload = ByteBuffer::copy_from(payload)?;
        let callback = match callback {
            Some(callback) => Some(self.callbacks.insert(Callback::Publish(Some(callback)))?),
            None => None,
        };
        let result = match self.contexts.get_mut(handle.index()).and_then(Option::as_mut) {
            Some(Context { connection: Some(connection), .. }) => {
                connection.publish(&mut self.dispatcher, topic, payload, qos, false, callback)
            }
            _ => Err(State::SocketNoActiveConnection),
        };
        if result.is_err() {
            self.forget_callback(callback);
        }
        result
    }

    /// Queues a SUBSCRIBE on a connected context.
    ///
    /// `callback` first receives the SUBACK outcome and then, while the
    /// subscription lasts, every inbound message whose topic matches `topic`.
    pub fn subscribe<F>(
        &mut self,
        handle: ContextHandle,
        topic: &str,
        qos: QoS,
        callback: F,
    ) -> Result<(), State>
    where
        F: FnMut(&mut Client<P>, ContextHandle, SubscriptionEvent<'_>, State) + 'static,
    {
        if topic.is_empty() {
            return Err(State::InvalidParameter);
        }
        self.ensure_connected(handle)?;
        let topic = ByteBuffer::copy_from_str(topic)?;
        let id = self.callbacks.insert(Callback::Subscription(Some(Box::new(callback))))?;
        let result = match self.contexts.get_mut(handle.index()).and_then(Option::as_mut) {
            Some(Context { connection: Some(connection), .. }) => {
                connection.subscribe(&mut self.dispatcher, topic, qos, id)
            }
            _ => Err(State::SocketNoActiveConnection),
        };
        if result.is_err() {
            self.forget_callback(Some(id));
        }
        result
    }

    /// Disconnects gracefully, or cancels a connect that has not started yet.
    ///
    /// The connection callback receives `Ok` once DISCONNECT is written and the
    /// link is down.
    pub fn shutdown_connection(&mut self, handle: ContextHandle) -> Result<(), State> {
        let Self { contexts, dispatcher, .. } = self;
        let context = contexts
            .get_mut(handle.index())
            .and_then(Option::as_mut)
            .ok_or(State::NullContext)?;
        context.epoch = context.epoch.wrapping_add(1);
        if dispatcher.is_scheduled(&context.connect_event) {
            dispatcher.cancel(&mut context.connect_event)?;
            debug!("context {}: pending connect cancelled", handle.raw());
            return Ok(());
        }
        match context.connection.as_mut() {
            Some(connection) if connection.state() == ConnectionState::Connected => {
                connection.shutdown(dispatcher)
            }
            Some(connection) if connection.state() == ConnectionState::Closing => {
                Err(State::AlreadyInitialized)
            }
            _ => Err(State::SocketNoActiveConnection),
        }
    }

    /// Runs `callback` after `delay` seconds, and every `delay` seconds after that
    /// when `repeat` is set.
    pub fn schedule_timed_task<F>(
        &mut self,
        handle: ContextHandle,
        callback: F,
        delay: u64,
        repeat: bool,
    ) -> Result<TimedTaskHandle, State>
    where
        F: FnMut(&mut Client<P>, TimedTaskHandle) + 'static,
    {
        self.context(handle)?;
        let key = self.timed_tasks.insert(TimedTask {
            context: handle,
            callback: Some(Box::new(callback)),
            event: TimeEventHandle::null(),
            repeat,
            state: TaskState::Scheduled,
        })?;
        let task = TimedTaskHandle(key);
        let scheduled = if repeat {
            self.dispatcher.execute_every(delay, Event::TimedTask(task))
        } else {
            self.dispatcher.execute_in(delay, Event::TimedTask(task))
        };
        match scheduled {
            Ok(event) => {
                if let Some(entry) = self.timed_tasks.get_mut(key) {
                    entry.event = event;
                }
                Ok(task)
            }
            Err(state) => {
                self.timed_tasks.remove(key);
                Err(state)
            }
        }
    }

    /// Stops a timed task. Valid from inside the task's own callback; unknown or
    /// finished tasks are ignored.
    pub fn cancel_timed_task(&mut self, task: TimedTaskHandle) {
        let Some(entry) = self.timed_tasks.get_mut(task.0) else {
            return;
        };
        let _ = self.dispatcher.cancel(&mut entry.event);
        if entry.state == TaskState::Running {
            entry.state = TaskState::Cancelled;
        } else {
            self.timed_tasks.remove(task.0);
        }
    }

    /// Makes the event loop return; further ticks report `EventProcessStopped`.
    pub fn events_stop(&mut self) {
        info!("event processing stopped");
        self.dispatcher.stop();
    }

    /// Runs the event loop until [`events_stop`](Self::events_stop) is called or
    /// nothing is left to wait for.
    ///
    /// Returns `EventProcessStopped` when stopped, `Ok` when idle.
    pub fn events_process_blocking(&mut self) -> State {
        while self.dispatcher.is_running() {
            match self.iterate(true) {
                Ok(true) => {}
                Ok(false) => return State::Ok,
                Err(state) => {
                    warn!("event loop failed: {}", state);
                    self.dispatcher.stop();
                }
            }
        }
        State::EventProcessStopped
    }

    /// Runs one loop iteration without waiting on sockets.
    pub fn events_process_tick(&mut self) -> Result<(), State> {
        if !self.dispatcher.is_running() {
            return Err(State::EventProcessStopped);
        }
        self.iterate(false)?;
        if self.dispatcher.is_running() {
            Ok(())
        } else {
            Err(State::EventProcessStopped)
        }
    }

    fn context(&self, handle: ContextHandle) -> Result<&Context<P>, State> {
        self.contexts
            .get(handle.index())
            .and_then(Option::as_ref)
            .ok_or(State::NullContext)
    }

    fn context_mut(&mut self, handle: ContextHandle) -> Result<&mut Context<P>, State> {
        self.contexts
            .get_mut(handle.index())
            .and_then(Option::as_mut)
            .ok_or(State::NullContext)
    }

    /// Common preconditions of publish and subscribe.
    fn ensure_connected(&self, handle: ContextHandle) -> Result<(), State> {
        let context = self.context(handle)?;
        if self.backoff.class() != BackoffClass::None {
            return Err(State::BackoffTerminal);
        }
        if context.connection_state() != ConnectionState::Connected {
            return Err(State::SocketNoActiveConnection);
        }
        Ok(())
    }

    fn forget_callback(&mut self, callback: Option<CallbackId>) {
        if let Some(callback) = callback {
            self.callbacks.remove(callback);
        }
    }

    /// Removes a context with everything it owns, invoking nothing.
    fn discard_context(&mut self, handle: ContextHandle) {
        let Some(mut context) = self.contexts.get_mut(handle.index()).and_then(Option::take) else {
            return;
        };
        let _ = self.dispatcher.cancel(&mut context.connect_event);
        if let Some(connection) = context.connection.as_mut() {
            connection.close(&mut self.platform, &mut self.dispatcher, State::Ok);
            connection.release(&mut self.dispatcher);
            for notification in connection.take_notifications() {
                if let Notification::Released { callback } | Notification::Published { callback, .. } =
                    notification
                {
                    self.callbacks.remove(callback);
                }
            }
        }
        for key in self.timed_tasks.keys() {
            if self.timed_tasks.get(key).is_some_and(|task| task.context == handle) {
                if let Some(mut task) = self.timed_tasks.remove(key) {
                    let _ = self.dispatcher.cancel(&mut task.event);
                }
            }
        }
    }
}
