use log::{debug, error, info, trace, warn};

use super::{Callback, Client, ContextHandle, SubscriptionEvent, TaskState, TimedTaskHandle};
use crate::backoff::BackoffClass;
use crate::config::Config;
use crate::connection::Connection;
use crate::error::State;
use crate::event::{Dispatcher, Event, TimeEventHandle};
use crate::mqtt::logic::{CallbackId, Notification};
use crate::network::{PollEntry, PollState};
use crate::platform::Platform;

/// States after which the event loop cannot continue.
fn is_fatal(state: State) -> bool {
    matches!(state, State::OutOfMemory | State::InternalError | State::MqttUnknownMessageId)
}

impl<P: Platform> Client<P> {
    /// One loop iteration. `Ok(false)` means nothing was left to wait for.
    pub(super) fn iterate(&mut self, blocking: bool) -> Result<bool, State> {
        self.dispatcher.step(self.platform.now())?;
        self.drain();
        if !self.dispatcher.is_running() {
            return Ok(true);
        }

        let mut entries = self.dispatcher.poll_entries()?;
        let timeout = if blocking { self.dispatcher.timeout() } else { Some(0) };
        if entries.is_empty() && timeout.is_none() {
            return Ok(false);
        }
        match self.platform.poll(&mut entries, timeout) {
            PollState::Ok => {
                for entry in entries.iter().filter(|entry| entry.readiness.any()) {
                    self.on_readiness(entry);
                }
            }
            PollState::Timeout => {}
            PollState::Error => warn!("readiness poll failed"),
        }

        self.dispatcher.step(self.platform.now())?;
        self.drain();
        Ok(true)
    }

    fn drain(&mut self) {
        while self.dispatcher.is_running() {
            let Some(event) = self.dispatcher.next_ready() else {
                break;
            };
            self.handle_event(event);
        }
    }

    fn handle_event(&mut self, event: Event) {
        trace!("handling {:?}", event);
        match event {
            Event::Connect(handle) => {
                if let Ok(context) = self.context_mut(handle) {
                    context.connect_event = TimeEventHandle::null();
                }
                self.drive(handle, |connection, platform, dispatcher, config| {
                    connection.open(platform, dispatcher, config)
                });
            }
            Event::Resume(handle) => {
                self.drive(handle, |connection, platform, dispatcher, _| connection.resume(platform, dispatcher));
            }
            Event::TaskTimeout(handle, task) => {
                self.drive(handle, |connection, _, dispatcher, _| connection.on_timeout(dispatcher, task));
            }
            Event::Keepalive(handle) => {
                self.drive(handle, |connection, _, dispatcher, _| connection.on_keepalive(dispatcher));
            }
            Event::BackoffDecay => {
                if let Err(state) = self.backoff.decay(&mut self.dispatcher) {
                    error!("backoff decay failed: {}", state);
                    self.dispatcher.stop();
                }
            }
            Event::TimedTask(task) => self.run_timed_task(task),
        }
    }

    fn on_readiness(&mut self, entry: &PollEntry) {
        let owner = self.contexts.iter().position(|slot| {
            slot.as_ref()
                .and_then(|context| context.connection.as_ref())
                .and_then(Connection::socket_id)
                == Some(entry.socket)
        });
        let Some(index) = owner else {
            trace!("readiness for unknown socket {:?}", entry.socket);
            return;
        };
        let readiness = entry.readiness;
        self.drive(ContextHandle(index as u32), |connection, platform, dispatcher, _| {
            connection.on_readiness(platform, dispatcher, readiness)
        });
    }

    /// Runs one step of a context's connection and settles its outcome.
    fn drive<F>(&mut self, handle: ContextHandle, step: F)
    where
        F: FnOnce(&mut Connection<P>, &mut P, &mut Dispatcher<Event>, &Config) -> Result<(), State>,
    {
        let Self { contexts, platform, dispatcher, config, .. } = self;
        let Some(connection) = contexts
            .get_mut(handle.index())
            .and_then(Option::as_mut)
            .and_then(|context| context.connection.as_mut())
        else {
            return;
        };
        let result = step(connection, platform, dispatcher, config);
        self.settle(handle, result);
    }

    fn connection_mut(&mut self, handle: ContextHandle) -> Option<&mut Connection<P>> {
        self.context_mut(handle).ok().and_then(|context| context.connection.as_mut())
    }

    fn settle(&mut self, handle: ContextHandle, result: Result<(), State>) {
        match result {
            Err(state) => self.close_context(handle, state),
            Ok(()) => match self.connection_mut(handle).and_then(Connection::take_close_request) {
                Some(state) => self.close_context(handle, state),
                None => self.deliver(handle),
            },
        }
    }

    /// Closes a context's link with `state`, reports it and, when the failure is
    /// recoverable, schedules the reconnect.
    fn close_context(&mut self, handle: ContextHandle, state: State) {
        {
            let Self { contexts, platform, dispatcher, .. } = self;
            let Some(connection) = contexts
                .get_mut(handle.index())
                .and_then(Option::as_mut)
                .and_then(|context| context.connection.as_mut())
            else {
                return;
            };
            connection.close(platform, dispatcher, state);
            let _ = connection.take_close_request();
        }
        if is_fatal(state) {
            error!("context {} failed with {}, stopping event processing", handle.raw(), state);
            self.dispatcher.stop();
        }
        self.deliver(handle);

        let class = match self.backoff.update(state, &mut self.dispatcher) {
            Ok(class) => class,
            Err(error) => {
                warn!("backoff update failed: {}", error);
                self.backoff.class()
            }
        };
        let epoch = self.context(handle).map(|context| context.epoch);
        self.notify_connection(handle, state);

        let Ok(context) = self.context(handle) else {
            return;
        };
        if !context.auto_reconnect
            || class != BackoffClass::Recoverable
            || Ok(context.epoch) != epoch
            || !self.dispatcher.is_running()
        {
            return;
        }
        let penalty = self.backoff.penalty(&mut self.platform);
        match self.dispatcher.execute_in(penalty, Event::Connect(handle)) {
            Ok(event) => {
                if let Ok(context) = self.context_mut(handle) {
                    context.connect_event = event;
                }
                info!("context {} reconnecting in {}s", handle.raw(), penalty);
            }
            Err(error) => warn!("context {} cannot schedule reconnect: {}", handle.raw(), error),
        }
    }

    /// Hands every pending notification of a context to the user callbacks.
    fn deliver(&mut self, handle: ContextHandle) {
        loop {
            let Some(connection) = self.connection_mut(handle) else {
                return;
            };
            let batch = connection.take_notifications();
            if batch.is_empty() {
                return;
            }
            self.enter(handle);
            for notification in batch {
                self.notify(handle, notification);
            }
            self.leave(handle);
        }
    }

    fn notify(&mut self, handle: ContextHandle, notification: Notification) {
        match notification {
            Notification::Connected { session_present } => {
                info!("context {} connected, session present: {}", handle.raw(), session_present);
                if let Err(error) = self.backoff.update(State::Ok, &mut self.dispatcher) {
                    warn!("backoff update failed: {}", error);
                }
                self.notify_connection(handle, State::Ok);
            }
            Notification::Published { callback, state } => {
                if let Some(Callback::Publish(Some(callback))) = self.callbacks.remove(callback) {
                    callback(self, handle, state);
                }
            }
            Notification::SubAck { callback, topic, qos, state } => {
                let event = SubscriptionEvent::SubAck { topic: topic.as_str().unwrap_or_default(), qos };
                self.notify_subscription(handle, callback, event, state);
            }
            Notification::Message { callback, message } => {
                let event = SubscriptionEvent::Message {
                    topic: message.topic.as_str().unwrap_or_default(),
                    payload: message.payload.as_slice(),
                    qos: message.qos,
                    retain: message.retain,
                    dup: message.dup,
                };
                self.notify_subscription(handle, callback, event, State::Ok);
            }
            Notification::Released { callback } => {
                self.callbacks.remove(callback);
            }
        }
    }

    fn notify_connection(&mut self, handle: ContextHandle, state: State) {
        let Some(mut callback) = self.context_mut(handle).ok().and_then(|context| context.callback.take()) else {
            return;
        };
        self.enter(handle);
        callback(self, handle, state);
        if let Ok(context) = self.context_mut(handle) {
            if context.callback.is_none() {
                context.callback = Some(callback);
            }
        }
        self.leave(handle);
    }

    fn notify_subscription(
        &mut self,
        handle: ContextHandle,
        id: CallbackId,
        event: SubscriptionEvent<'_>,
        state: State,
    ) {
        let Some(Callback::Subscription(slot)) = self.callbacks.get_mut(id) else {
            return;
        };
        let Some(mut callback) = slot.take() else {
            return;
        };
        callback(self, handle, event, state);
        if let Some(Callback::Subscription(slot)) = self.callbacks.get_mut(id) {
            if slot.is_none() {
                *slot = Some(callback);
            }
        }
    }

    fn run_timed_task(&mut self, task: TimedTaskHandle) {
        let Some(entry) = self.timed_tasks.get_mut(task.0) else {
            return;
        };
        let Some(mut callback) = entry.callback.take() else {
            return;
        };
        entry.state = TaskState::Running;
        let context = entry.context;

        self.enter(context);
        callback(self, task);
        self.leave(context);

        let Some(entry) = self.timed_tasks.get_mut(task.0) else {
            return;
        };
        if entry.state == TaskState::Cancelled || !entry.repeat {
            self.timed_tasks.remove(task.0);
            debug!("timed task {:?} finished", task);
        } else {
            entry.state = TaskState::Scheduled;
            entry.callback = Some(callback);
        }
    }

    fn enter(&mut self, handle: ContextHandle) {
        if let Ok(context) = self.context_mut(handle) {
            context.callback_depth += 1;
        }
    }

    /// Leaves a user callback, performing a deletion it requested.
    fn leave(&mut self, handle: ContextHandle) {
        let Ok(context) = self.context_mut(handle) else {
            return;
        };
        context.callback_depth = context.callback_depth.saturating_sub(1);
        if context.callback_depth == 0 && context.delete_requested {
            self.discard_context(handle);
            debug!("context {} deleted", handle.raw());
        }
    }
}
