//! The native connection handle of the fake server.

use std::any::type_name;
use std::fmt;
use std::mem;
use std::sync::Arc;
use std::thread;

use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, trace};

use crate::fake::catalog::{
    Catalog, Key, STATE_IDLE, STATE_SUSPENDED, find, find_mut, position_by_name,
};
use crate::fake::server::ServerShared;
use crate::native::{
    CHANNELS_MAX, CardRecord, ChannelVolumesRecord, ClientRecord, INVALID_INDEX, IndexCallback,
    InfoCallback, ListEntry, ModuleRecord, NativeContext, Selector, ServerInfoCallback,
    SinkInputRecord, SinkRecord, SourceOutputRecord, SourceRecord, StateCallback,
    SuccessCallback,
};
use crate::{ContextFlags, ContextState, ErrorCode, LoopGuard, Operation};

const CLIENT_PROTOCOL_VERSION: u32 = 35;
const DEFAULT_SERVER: &str = "unix:/run/fake-server/native";

const SUCCESS: i32 = 1;
const FAILURE: i32 = 0;

struct ConnectionState {
    state: ContextState,
    last_error: ErrorCode,
    server: Option<String>,
    client_index: Option<u32>,
    callback: Option<StateCallback>,
}

impl fmt::Debug for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("state", &self.state)
            .field("last_error", &self.last_error)
            .field("server", &self.server)
            .field("client_index", &self.client_index)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

/// One simulated connection, shared between the handle and the replies queued for it.
#[derive(Debug)]
struct Connection {
    server: Arc<ServerShared>,
    name: String,
    state: Mutex<ConnectionState>,
}

impl Connection {
    fn current(&self) -> ContextState {
        self.state.lock().state
    }

    fn set_error(&self, code: ErrorCode) {
        self.state.lock().last_error = code;
    }

    /// Moves to `state` and tells the state callback about it, on the loop thread.
    fn transition(self: &Arc<Self>, guard: &mut LoopGuard<'_>, state: ContextState) {
        self.state.lock().state = state;
        trace!(name = %self.name, ?state, "fake connection state changed");

        if guard.in_loop_thread() {
            self.notify(guard, state);
        } else {
            let connection = Arc::clone(self);
            guard.defer(move |guard| connection.notify(guard, state));
        }
    }

    fn notify(&self, guard: &mut LoopGuard<'_>, state: ContextState) {
        let Some(mut callback) = self.state.lock().callback.take() else {
            return;
        };

        callback(guard, state);

        // The callback cannot replace itself, so an empty slot means nobody touched it.
        let mut inner = self.state.lock();
        if inner.callback.is_none() {
            inner.callback = Some(callback);
        }
    }

    /// Takes the connection through the handshake, one step per loop iteration.
    fn advance(self: Arc<Self>, guard: &mut LoopGuard<'_>) {
        let next = match self.current() {
            ContextState::Connecting => ContextState::Authorizing,
            ContextState::Authorizing => ContextState::SettingName,
            ContextState::SettingName => {
                let failure = self.server.faults.lock().connect_failure;

                if let Some(code) = failure {
                    self.set_error(code);
                    self.transition(guard, ContextState::Failed);
                    return;
                }

                let index = self.server.catalog.lock().add_client(&self.name);
                self.state.lock().client_index = Some(index);

                self.transition(guard, ContextState::Ready);
                return;
            }
            // Disconnected in the meantime.
            _ => return,
        };

        self.transition(guard, next);

        let server = Arc::clone(&self.server);
        server.schedule(guard, Box::new(move |guard| self.advance(guard)));
    }

    fn unregister_client(&self) {
        if let Some(index) = self.state.lock().client_index.take() {
            self.server.catalog.lock().remove_client(index);
        }
    }

    /// The connection breaks, as if the server went away.
    fn lose(self: &Arc<Self>, guard: &mut LoopGuard<'_>) {
        debug!(name = %self.name, "fake connection lost");

        self.unregister_client();
        self.set_error(ErrorCode::ConnectionTerminated);
        self.transition(guard, ContextState::Failed);
    }
}

/// What a reply needs to answer one request.
struct Reply {
    connection: Arc<Connection>,
    operation: Operation,
}

impl Reply {
    fn catalog(&self) -> MutexGuard<'_, Catalog> {
        self.connection.server.catalog.lock()
    }

    /// Delivers `records` followed by the end marker, unless the connection is lost on the way.
    fn deliver_list<R>(
        &self,
        guard: &mut LoopGuard<'_>,
        records: &[R],
        mut callback: InfoCallback<R>,
    ) {
        let interval = self.connection.server.faults.lock().record_interval;

        for (position, record) in records.iter().enumerate() {
            if let Some(interval) = interval.filter(|_| position > 0) {
                guard.unlocked(|| thread::sleep(interval));
            }

            if !self.connection.server.take_record_budget() {
                self.connection.lose(guard);
                self.operation.cancel();
                guard.signal(false);
                return;
            }

            callback(guard, ListEntry::Item(record));
        }

        callback(guard, ListEntry::End);
        self.operation.complete();
    }

    fn deliver_lookup<R>(
        &self,
        guard: &mut LoopGuard<'_>,
        record: Option<R>,
        mut callback: InfoCallback<R>,
    ) {
        match record {
            Some(record) => self.deliver_list(guard, &[record], callback),
            None => {
                self.connection.set_error(ErrorCode::NoEntity);
                callback(guard, ListEntry::Failed);
                self.operation.complete();
            }
        }
    }

    fn deliver_success(
        &self,
        guard: &mut LoopGuard<'_>,
        outcome: Result<(), ErrorCode>,
        callback: SuccessCallback,
    ) {
        match outcome {
            Ok(()) => callback(guard, SUCCESS),
            Err(code) => {
                self.connection.set_error(code);
                callback(guard, FAILURE);
            }
        }

        self.operation.complete();
    }

    /// Applies a mutation to the catalog, unless mutations have been told to fail.
    fn mutate(
        &self,
        change: impl FnOnce(&mut Catalog) -> Result<(), ErrorCode>,
    ) -> Result<(), ErrorCode> {
        if let Some(code) = self.connection.server.faults.lock().mutation_failure {
            return Err(code);
        }

        change(&mut *self.catalog())
    }
}

/// The native handle the fake server gives to each context.
#[derive(Debug)]
pub(crate) struct FakeContext {
    connection: Arc<Connection>,
}

impl FakeContext {
    pub(crate) fn new(server: Arc<ServerShared>, name: &str) -> Self {
        Self {
            connection: Arc::new(Connection {
                server,
                name: name.to_string(),
                state: Mutex::new(ConnectionState {
                    state: ContextState::Unconnected,
                    last_error: ErrorCode::Ok,
                    server: None,
                    client_index: None,
                    callback: None,
                }),
            }),
        }
    }

    /// Issues a request whose answer is produced by `answer` on the loop thread.
    ///
    /// A request on a connection that is not ready is refused, as is the request after
    /// [`FakeServer::reject_next_request()`][crate::fake::FakeServer::reject_next_request].
    fn issue<F>(
        &self,
        guard: &mut LoopGuard<'_>,
        request: &'static str,
        answer: F,
    ) -> Option<Operation>
    where
        F: FnOnce(&Reply, &mut LoopGuard<'_>) + Send + 'static,
    {
        let server = &self.connection.server;

        if self.connection.current() != ContextState::Ready {
            self.connection.set_error(ErrorCode::BadState);
            return None;
        }

        let (rejection, omit_result) = {
            let mut faults = server.faults.lock();
            let rejection = faults.reject_next.take();
            let omit_result = rejection.is_none() && mem::take(&mut faults.omit_next_result);
            (rejection, omit_result)
        };

        if let Some(code) = rejection {
            trace!(request, %code, "fake server refused request");
            self.connection.set_error(code);
            return None;
        }

        let operation = Operation::with_release_hook(server.track_operation());
        let reply = Reply {
            connection: Arc::clone(&self.connection),
            operation: operation.clone(),
        };

        trace!(request, "fake server accepted request");

        server.schedule(
            guard,
            Box::new(move |guard| {
                if !reply.operation.is_running() {
                    return;
                }

                if reply.connection.current() != ContextState::Ready {
                    reply.operation.cancel();
                    guard.signal(false);
                    return;
                }

                if omit_result {
                    reply.operation.complete();
                    guard.signal(false);
                    return;
                }

                answer(&reply, guard);
            }),
        );

        Some(operation)
    }

    fn list<R, S>(
        &self,
        guard: &mut LoopGuard<'_>,
        request: &'static str,
        select: S,
        callback: InfoCallback<R>,
    ) -> Option<Operation>
    where
        R: Send + 'static,
        S: FnOnce(&Catalog) -> Vec<R> + Send + 'static,
    {
        self.issue(guard, request, move |reply, guard| {
            let records = select(&reply.catalog());
            reply.deliver_list(guard, &records, callback);
        })
    }

    fn lookup<R, S>(
        &self,
        guard: &mut LoopGuard<'_>,
        request: &'static str,
        select: S,
        callback: InfoCallback<R>,
    ) -> Option<Operation>
    where
        R: Send + 'static,
        S: FnOnce(&Catalog) -> Option<R> + Send + 'static,
    {
        self.issue(guard, request, move |reply, guard| {
            let record = select(&reply.catalog());
            reply.deliver_lookup(guard, record, callback);
        })
    }

    fn mutation<C>(
        &self,
        guard: &mut LoopGuard<'_>,
        request: &'static str,
        change: C,
        callback: SuccessCallback,
    ) -> Option<Operation>
    where
        C: FnOnce(&mut Catalog) -> Result<(), ErrorCode> + Send + 'static,
    {
        self.issue(guard, request, move |reply, guard| {
            let outcome = reply.mutate(change);
            reply.deliver_success(guard, outcome, callback);
        })
    }
}

impl Drop for FakeContext {
    fn drop(&mut self) {
        self.connection.unregister_client();
        self.connection.server.record_context_released();
    }
}

fn check_volume(volume: &ChannelVolumesRecord) -> Result<(), ErrorCode> {
    if volume.channels == 0 || usize::from(volume.channels) > CHANNELS_MAX {
        return Err(ErrorCode::Invalid);
    }

    Ok(())
}

macro_rules! device_mutations {
    ($records:ident, $set_volume:ident, $set_mute:ident, $suspend:ident, $set_port:ident) => {
        fn $set_volume(
            &self,
            guard: &mut LoopGuard<'_>,
            device: Selector<'_>,
            volume: &ChannelVolumesRecord,
            callback: SuccessCallback,
        ) -> Option<Operation> {
            let key = Key::from(device);
            let volume = *volume;

            self.mutation(
                guard,
                stringify!($set_volume),
                move |catalog| {
                    check_volume(&volume)?;
                    let device = find_mut(&mut catalog.$records, &key)
                        .ok_or(ErrorCode::NoEntity)?;
                    device.volume = volume;
                    Ok(())
                },
                callback,
            )
        }

        fn $set_mute(
            &self,
            guard: &mut LoopGuard<'_>,
            device: Selector<'_>,
            mute: bool,
            callback: SuccessCallback,
        ) -> Option<Operation> {
            let key = Key::from(device);

            self.mutation(
                guard,
                stringify!($set_mute),
                move |catalog| {
                    let device = find_mut(&mut catalog.$records, &key)
                        .ok_or(ErrorCode::NoEntity)?;
                    device.mute = i32::from(mute);
                    Ok(())
                },
                callback,
            )
        }

        fn $suspend(
            &self,
            guard: &mut LoopGuard<'_>,
            device: Selector<'_>,
            suspend: bool,
            callback: SuccessCallback,
        ) -> Option<Operation> {
            let key = Key::from(device);

            self.mutation(
                guard,
                stringify!($suspend),
                move |catalog| {
                    let device = find_mut(&mut catalog.$records, &key)
                        .ok_or(ErrorCode::NoEntity)?;
                    device.state = if suspend { STATE_SUSPENDED } else { STATE_IDLE };
                    Ok(())
                },
                callback,
            )
        }

        fn $set_port(
            &self,
            guard: &mut LoopGuard<'_>,
            device: Selector<'_>,
            port: &str,
            callback: SuccessCallback,
        ) -> Option<Operation> {
            let key = Key::from(device);
            let port = port.to_string();

            self.mutation(
                guard,
                stringify!($set_port),
                move |catalog| {
                    let device = find_mut(&mut catalog.$records, &key)
                        .ok_or(ErrorCode::NoEntity)?;
                    let position = position_by_name(&device.ports, &port, |port| {
                        port.name.as_deref()
                    })
                    .ok_or(ErrorCode::NoEntity)?;
                    device.active_port = Some(position);
                    Ok(())
                },
                callback,
            )
        }
    };
}

impl NativeContext for FakeContext {
    fn state(&self, _guard: &LoopGuard<'_>) -> ContextState {
        self.connection.current()
    }

    fn last_error(&self, _guard: &LoopGuard<'_>) -> ErrorCode {
        self.connection.state.lock().last_error
    }

    fn set_state_callback(&self, _guard: &mut LoopGuard<'_>, callback: Option<StateCallback>) {
        self.connection.state.lock().callback = callback;
    }

    fn connect(
        &self,
        guard: &mut LoopGuard<'_>,
        server: Option<&str>,
        flags: ContextFlags,
    ) -> Result<(), ErrorCode> {
        {
            let mut inner = self.connection.state.lock();

            if inner.state != ContextState::Unconnected {
                inner.last_error = ErrorCode::BadState;
                return Err(ErrorCode::BadState);
            }

            if server.is_some_and(str::is_empty) {
                inner.last_error = ErrorCode::InvalidServer;
                return Err(ErrorCode::InvalidServer);
            }

            inner.server = Some(server.unwrap_or(DEFAULT_SERVER).to_string());
        }

        debug!(name = %self.connection.name, ?server, ?flags, "fake connection started");

        self.connection.transition(guard, ContextState::Connecting);

        let connection = Arc::clone(&self.connection);
        self.connection
            .server
            .schedule(guard, Box::new(move |guard| connection.advance(guard)));

        Ok(())
    }

    fn disconnect(&self, guard: &mut LoopGuard<'_>) {
        let state = self.connection.current();

        if state == ContextState::Unconnected || state.is_final() {
            return;
        }

        self.connection.unregister_client();
        self.connection.server.record_disconnect();
        self.connection.transition(guard, ContextState::Terminated);
    }

    fn server_name(&self, _guard: &LoopGuard<'_>) -> Option<String> {
        let inner = self.connection.state.lock();

        if inner.state == ContextState::Ready {
            inner.server.clone()
        } else {
            None
        }
    }

    fn protocol_version(&self, _guard: &LoopGuard<'_>) -> u32 {
        CLIENT_PROTOCOL_VERSION
    }

    fn server_protocol_version(&self, _guard: &LoopGuard<'_>) -> Option<u32> {
        (self.connection.current() == ContextState::Ready)
            .then_some(self.connection.server.server_protocol_version)
    }

    fn index(&self, _guard: &LoopGuard<'_>) -> Option<u32> {
        let inner = self.connection.state.lock();

        if inner.state == ContextState::Ready {
            inner.client_index
        } else {
            None
        }
    }

    fn get_server_info(
        &self,
        guard: &mut LoopGuard<'_>,
        callback: ServerInfoCallback,
    ) -> Option<Operation> {
        self.issue(guard, "get_server_info", move |reply, guard| {
            let record = reply.catalog().server.clone();
            callback(guard, Some(&record));
            reply.operation.complete();
        })
    }

    fn get_sink_info(
        &self,
        guard: &mut LoopGuard<'_>,
        sink: Selector<'_>,
        callback: InfoCallback<SinkRecord>,
    ) -> Option<Operation> {
        let key = Key::from(sink);

        self.lookup(
            guard,
            "get_sink_info",
            move |catalog| find(&catalog.sinks, &key).cloned(),
            callback,
        )
    }

    fn get_sink_info_list(
        &self,
        guard: &mut LoopGuard<'_>,
        callback: InfoCallback<SinkRecord>,
    ) -> Option<Operation> {
        self.list(
            guard,
            "get_sink_info_list",
            |catalog| catalog.sinks.clone(),
            callback,
        )
    }

    device_mutations!(
        sinks,
        set_sink_volume,
        set_sink_mute,
        suspend_sink,
        set_sink_port
    );

    fn get_source_info(
        &self,
        guard: &mut LoopGuard<'_>,
        source: Selector<'_>,
        callback: InfoCallback<SourceRecord>,
    ) -> Option<Operation> {
        let key = Key::from(source);

        self.lookup(
            guard,
            "get_source_info",
            move |catalog| find(&catalog.sources, &key).cloned(),
            callback,
        )
    }

    fn get_source_info_list(
        &self,
        guard: &mut LoopGuard<'_>,
        callback: InfoCallback<SourceRecord>,
    ) -> Option<Operation> {
        self.list(
            guard,
            "get_source_info_list",
            |catalog| catalog.sources.clone(),
            callback,
        )
    }

    device_mutations!(
        sources,
        set_source_volume,
        set_source_mute,
        suspend_source,
        set_source_port
    );

    fn get_sink_input_info(
        &self,
        guard: &mut LoopGuard<'_>,
        index: u32,
        callback: InfoCallback<SinkInputRecord>,
    ) -> Option<Operation> {
        self.lookup(
            guard,
            "get_sink_input_info",
            move |catalog| find(&catalog.sink_inputs, &Key::Index(index)).cloned(),
            callback,
        )
    }

    fn get_sink_input_info_list(
        &self,
        guard: &mut LoopGuard<'_>,
        callback: InfoCallback<SinkInputRecord>,
    ) -> Option<Operation> {
        self.list(
            guard,
            "get_sink_input_info_list",
            |catalog| catalog.sink_inputs.clone(),
            callback,
        )
    }

    fn get_source_output_info(
        &self,
        guard: &mut LoopGuard<'_>,
        index: u32,
        callback: InfoCallback<SourceOutputRecord>,
    ) -> Option<Operation> {
        self.lookup(
            guard,
            "get_source_output_info",
            move |catalog| find(&catalog.source_outputs, &Key::Index(index)).cloned(),
            callback,
        )
    }

    fn get_source_output_info_list(
        &self,
        guard: &mut LoopGuard<'_>,
        callback: InfoCallback<SourceOutputRecord>,
    ) -> Option<Operation> {
        self.list(
            guard,
            "get_source_output_info_list",
            |catalog| catalog.source_outputs.clone(),
            callback,
        )
    }

    fn get_module_info(
        &self,
        guard: &mut LoopGuard<'_>,
        index: u32,
        callback: InfoCallback<ModuleRecord>,
    ) -> Option<Operation> {
        self.lookup(
            guard,
            "get_module_info",
            move |catalog| find(&catalog.modules, &Key::Index(index)).cloned(),
            callback,
        )
    }

    fn get_module_info_list(
        &self,
        guard: &mut LoopGuard<'_>,
        callback: InfoCallback<ModuleRecord>,
    ) -> Option<Operation> {
        self.list(
            guard,
            "get_module_info_list",
            |catalog| catalog.modules.clone(),
            callback,
        )
    }

    fn load_module(
        &self,
        guard: &mut LoopGuard<'_>,
        name: &str,
        argument: &str,
        callback: IndexCallback,
    ) -> Option<Operation> {
        let name = name.to_string();
        let argument = argument.to_string();

        self.issue(guard, "load_module", move |reply, guard| {
            let mut index = INVALID_INDEX;

            let outcome = reply.mutate(|catalog| {
                // Every module the real server ships is called module-something.
                if !name.starts_with("module-") {
                    return Err(ErrorCode::ModInitFailed);
                }

                index = catalog.add_module(&name, &argument);
                Ok(())
            });

            if let Err(code) = outcome {
                reply.connection.set_error(code);
            }

            callback(guard, index);
            reply.operation.complete();
        })
    }

    fn unload_module(
        &self,
        guard: &mut LoopGuard<'_>,
        index: u32,
        callback: SuccessCallback,
    ) -> Option<Operation> {
        self.mutation(
            guard,
            "unload_module",
            move |catalog| {
                if catalog.remove_module(index) {
                    Ok(())
                } else {
                    Err(ErrorCode::NoEntity)
                }
            },
            callback,
        )
    }

    fn get_client_info(
        &self,
        guard: &mut LoopGuard<'_>,
        index: u32,
        callback: InfoCallback<ClientRecord>,
    ) -> Option<Operation> {
        self.lookup(
            guard,
            "get_client_info",
            move |catalog| find(&catalog.clients, &Key::Index(index)).cloned(),
            callback,
        )
    }

    fn get_client_info_list(
        &self,
        guard: &mut LoopGuard<'_>,
        callback: InfoCallback<ClientRecord>,
    ) -> Option<Operation> {
        self.list(
            guard,
            "get_client_info_list",
            |catalog| catalog.clients.clone(),
            callback,
        )
    }

    fn kill_client(
        &self,
        guard: &mut LoopGuard<'_>,
        index: u32,
        callback: SuccessCallback,
    ) -> Option<Operation> {
        self.mutation(
            guard,
            "kill_client",
            move |catalog| {
                if catalog.remove_client(index) {
                    Ok(())
                } else {
                    Err(ErrorCode::NoEntity)
                }
            },
            callback,
        )
    }

    fn get_card_info(
        &self,
        guard: &mut LoopGuard<'_>,
        card: Selector<'_>,
        callback: InfoCallback<CardRecord>,
    ) -> Option<Operation> {
        let key = Key::from(card);

        self.lookup(
            guard,
            "get_card_info",
            move |catalog| find(&catalog.cards, &key).cloned(),
            callback,
        )
    }

    fn get_card_info_list(
        &self,
        guard: &mut LoopGuard<'_>,
        callback: InfoCallback<CardRecord>,
    ) -> Option<Operation> {
        self.list(
            guard,
            "get_card_info_list",
            |catalog| catalog.cards.clone(),
            callback,
        )
    }

    fn set_card_profile(
        &self,
        guard: &mut LoopGuard<'_>,
        card: Selector<'_>,
        profile: &str,
        callback: SuccessCallback,
    ) -> Option<Operation> {
        let key = Key::from(card);
        let profile = profile.to_string();

        self.mutation(
            guard,
            "set_card_profile",
            move |catalog| {
                let card = find_mut(&mut catalog.cards, &key).ok_or(ErrorCode::NoEntity)?;
                let position = position_by_name(&card.profiles, &profile, |profile| {
                    profile.name.as_deref()
                })
                .ok_or(ErrorCode::NoEntity)?;
                card.active_profile = Some(position);
                Ok(())
            },
            callback,
        )
    }

    fn set_port_latency_offset(
        &self,
        guard: &mut LoopGuard<'_>,
        card: &str,
        port: &str,
        offset_usec: i64,
        callback: SuccessCallback,
    ) -> Option<Operation> {
        let key = Key::Name(card.to_string());
        let port = port.to_string();

        self.mutation(
            guard,
            "set_port_latency_offset",
            move |catalog| {
                let card = find_mut(&mut catalog.cards, &key).ok_or(ErrorCode::NoEntity)?;
                let position =
                    position_by_name(&card.ports, &port, |port| port.name.as_deref())
                        .ok_or(ErrorCode::NoEntity)?;
                let port = card.ports.get_mut(position).ok_or(ErrorCode::NoEntity)?;
                port.latency_offset = offset_usec;
                Ok(())
            },
            callback,
        )
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use testing::with_watchdog;

    use super::*;
    use crate::EventLoop;
    use crate::fake::FakeServer;
    use crate::native::Backend;

    fn connect(server: &FakeServer, event_loop: &EventLoop) -> Box<dyn NativeContext> {
        let mut guard = event_loop.lock();
        let native = server.new_context(&mut guard, "test");

        let ready = Arc::new(AtomicBool::new(false));
        let ready_clone = Arc::clone(&ready);
        native.set_state_callback(
            &mut guard,
            Some(Box::new(move |guard, state| {
                if state == ContextState::Ready {
                    ready_clone.store(true, Ordering::Relaxed);
                }
                guard.signal(false);
            })),
        );

        native
            .connect(&mut guard, None, ContextFlags::NONE)
            .unwrap();

        while !ready.load(Ordering::Relaxed) {
            guard.wait();
        }

        native.set_state_callback(&mut guard, None);
        drop(guard);
        native
    }

    #[cfg_attr(miri, ignore)]
    #[test]
    fn handshake_passes_through_intermediate_states() {
        with_watchdog(|| {
            let event_loop = EventLoop::new();
            let server = FakeServer::new();
            let mut guard = event_loop.lock();
            let native = server.new_context(&mut guard, "test");

            let seen = Arc::new(Mutex::new(Vec::new()));
            let seen_clone = Arc::clone(&seen);
            native.set_state_callback(
                &mut guard,
                Some(Box::new(move |guard, state| {
                    seen_clone.lock().push(state);
                    guard.signal(false);
                })),
            );

            native
                .connect(&mut guard, None, ContextFlags::NONE)
                .unwrap();

            while native.state(&guard) != ContextState::Ready {
                guard.wait();
            }

            assert_eq!(
                *seen.lock(),
                vec![
                    ContextState::Connecting,
                    ContextState::Authorizing,
                    ContextState::SettingName,
                    ContextState::Ready
                ]
            );
            assert_eq!(native.index(&guard), Some(0));
            assert_eq!(server.client_count(), 1);
        });
    }

    #[cfg_attr(miri, ignore)]
    #[test]
    fn request_on_unconnected_handle_is_refused() {
        with_watchdog(|| {
            let event_loop = EventLoop::new();
            let server = FakeServer::new();
            let mut guard = event_loop.lock();
            let native = server.new_context(&mut guard, "test");

            let operation = native.get_server_info(&mut guard, Box::new(|_, _| {}));

            assert!(operation.is_none());
            assert_eq!(native.last_error(&guard), ErrorCode::BadState);
            assert_eq!(server.operations_issued(), 0);
        });
    }

    #[cfg_attr(miri, ignore)]
    #[test]
    fn lost_connection_cancels_list_midway() {
        with_watchdog(|| {
            let event_loop = EventLoop::new();
            let server = FakeServer::builder().sink("a").sink("b").build();
            let native = connect(&server, &event_loop);

            server.disconnect_after_records(1);

            let mut guard = event_loop.lock();
            let items = Arc::new(AtomicUsize::new(0));
            let items_clone = Arc::clone(&items);
            let operation = native
                .get_sink_info_list(
                    &mut guard,
                    Box::new(move |guard, entry| {
                        if let ListEntry::Item(_) = entry {
                            items_clone.fetch_add(1, Ordering::Relaxed);
                        }
                        guard.signal(false);
                    }),
                )
                .unwrap();

            while operation.is_running() {
                guard.wait();
            }

            assert_eq!(operation.state(), crate::OperationState::Cancelled);
            assert_eq!(items.load(Ordering::Relaxed), 1);
            assert_eq!(native.state(&guard), ContextState::Failed);
            assert_eq!(native.last_error(&guard), ErrorCode::ConnectionTerminated);
            assert_eq!(server.client_count(), 0);
        });
    }

    #[cfg_attr(miri, ignore)]
    #[test]
    fn disconnect_counts_once() {
        with_watchdog(|| {
            let event_loop = EventLoop::new();
            let server = FakeServer::new();
            let native = connect(&server, &event_loop);

            let mut guard = event_loop.lock();
            native.disconnect(&mut guard);
            native.disconnect(&mut guard);

            assert_eq!(native.state(&guard), ContextState::Terminated);
            assert_eq!(server.disconnects(), 1);

            drop(native);
            assert_eq!(server.contexts_released(), 1);
        });
    }
}
