use std::fmt::Debug;

use crate::native::{
    CardRecord, ChannelVolumesRecord, ClientRecord, ModuleRecord, ServerRecord, SinkInputRecord,
    SinkRecord, SourceOutputRecord, SourceRecord,
};
use crate::{ContextFlags, ContextState, ErrorCode, LoopGuard, Operation};

/// Index value the native library uses for "no such object".
pub const INVALID_INDEX: u32 = u32::MAX;

/// Receives every connection state change. Runs on the loop thread.
pub type StateCallback = Box<dyn FnMut(&mut LoopGuard<'_>, ContextState) + Send>;

/// Receives the result of a server information request. `None` means the request failed.
///
/// The record is only valid for the duration of the call.
pub type ServerInfoCallback = Box<dyn FnOnce(&mut LoopGuard<'_>, Option<&ServerRecord>) + Send>;

/// Receives the entries of an introspection request, one call per entry.
///
/// Single-object lookups use the same shape as enumerations: one [`ListEntry::Item`] followed by
/// [`ListEntry::End`]. Records are only valid for the duration of the call.
pub type InfoCallback<R> = Box<dyn FnMut(&mut LoopGuard<'_>, ListEntry<'_, R>) + Send>;

/// Receives the success code of a mutation. `1` means success; anything else means failure,
/// with the cause available from [`NativeContext::last_error()`].
pub type SuccessCallback = Box<dyn FnOnce(&mut LoopGuard<'_>, i32) + Send>;

/// Receives the index of a newly created object, or [`INVALID_INDEX`] on failure.
pub type IndexCallback = Box<dyn FnOnce(&mut LoopGuard<'_>, u32) + Send>;

/// One delivery of an [`InfoCallback`].
#[derive(Debug)]
#[expect(
    clippy::exhaustive_enums,
    reason = "mirrors the three outcomes of the native list callback"
)]
pub enum ListEntry<'a, R> {
    /// A record. The reference is only valid during the callback.
    Item(&'a R),

    /// The end-of-sequence marker. No further deliveries follow.
    End,

    /// The request failed. No further deliveries follow.
    Failed,
}

/// Identifies a server object either by index or by name.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[expect(
    clippy::exhaustive_enums,
    reason = "the server only addresses objects by index or by name"
)]
pub enum Selector<'a> {
    /// The numeric index the server assigned to the object.
    Index(u32),

    /// The unique name of the object.
    Name(&'a str),
}

impl From<u32> for Selector<'_> {
    fn from(value: u32) -> Self {
        Self::Index(value)
    }
}

impl<'a> From<&'a str> for Selector<'a> {
    fn from(value: &'a str) -> Self {
        Self::Name(value)
    }
}

/// Creates native connection handles.
///
/// Implemented by the glue to the real client library, and by
/// [`FakeServer`][crate::fake::FakeServer] for testing.
pub trait Backend: Debug + Send + Sync + 'static {
    /// Creates a new, unconnected native connection handle whose client name is `name`.
    fn new_context(&self, guard: &mut LoopGuard<'_>, name: &str) -> Box<dyn NativeContext>;
}

/// One native connection handle.
///
/// Dropping the box releases the native handle. The owner must hold the loop lock while doing
/// so.
///
/// Request-issuing methods return `None` if the request could not be issued, in which case the
/// callback is never invoked and [`last_error()`][Self::last_error] explains why. Otherwise the
/// callback is invoked on the loop thread, and the returned [`Operation`] reaches a terminal
/// state after the final invocation (or is cancelled if that never happens).
pub trait NativeContext: Debug + Send + Sync + 'static {
    /// The current connection state.
    fn state(&self, guard: &LoopGuard<'_>) -> ContextState;

    /// The error recorded by the most recent failure on this connection.
    fn last_error(&self, guard: &LoopGuard<'_>) -> ErrorCode;

    /// Installs or clears the callback that observes connection state changes.
    fn set_state_callback(&self, guard: &mut LoopGuard<'_>, callback: Option<StateCallback>);

    /// Starts connecting to `server`, or to the default server if `None`.
    ///
    /// Returns the error if the attempt could not even be started.
    fn connect(
        &self,
        guard: &mut LoopGuard<'_>,
        server: Option<&str>,
        flags: ContextFlags,
    ) -> Result<(), ErrorCode>;

    /// Closes the connection. Harmless when not connected.
    fn disconnect(&self, guard: &mut LoopGuard<'_>);

    /// The name of the server the connection is attached to, if connected.
    fn server_name(&self, guard: &LoopGuard<'_>) -> Option<String>;

    /// The protocol version implemented by the client library.
    fn protocol_version(&self, guard: &LoopGuard<'_>) -> u32;

    /// The protocol version implemented by the connected server, if connected.
    fn server_protocol_version(&self, guard: &LoopGuard<'_>) -> Option<u32>;

    /// The index the server assigned to this client, if connected.
    fn index(&self, guard: &LoopGuard<'_>) -> Option<u32>;

    /// Requests information about the server.
    fn get_server_info(
        &self,
        guard: &mut LoopGuard<'_>,
        callback: ServerInfoCallback,
    ) -> Option<Operation>;

    /// Requests one sink. Delivers the record followed by the end marker.
    fn get_sink_info(
        &self,
        guard: &mut LoopGuard<'_>,
        sink: Selector<'_>,
        callback: InfoCallback<SinkRecord>,
    ) -> Option<Operation>;

    /// Requests every sink, in server order, followed by the end marker.
    fn get_sink_info_list(
        &self,
        guard: &mut LoopGuard<'_>,
        callback: InfoCallback<SinkRecord>,
    ) -> Option<Operation>;

    /// Sets the per-channel volume of a sink.
    fn set_sink_volume(
        &self,
        guard: &mut LoopGuard<'_>,
        sink: Selector<'_>,
        volume: &ChannelVolumesRecord,
        callback: SuccessCallback,
    ) -> Option<Operation>;

    /// Mutes or unmutes a sink.
    fn set_sink_mute(
        &self,
        guard: &mut LoopGuard<'_>,
        sink: Selector<'_>,
        mute: bool,
        callback: SuccessCallback,
    ) -> Option<Operation>;

    /// Suspends or resumes a sink.
    fn suspend_sink(
        &self,
        guard: &mut LoopGuard<'_>,
        sink: Selector<'_>,
        suspend: bool,
        callback: SuccessCallback,
    ) -> Option<Operation>;

    /// Switches the active port of a sink.
    fn set_sink_port(
        &self,
        guard: &mut LoopGuard<'_>,
        sink: Selector<'_>,
        port: &str,
        callback: SuccessCallback,
    ) -> Option<Operation>;

    /// Requests one source. Delivers the record followed by the end marker.
    fn get_source_info(
        &self,
        guard: &mut LoopGuard<'_>,
        source: Selector<'_>,
        callback: InfoCallback<SourceRecord>,
    ) -> Option<Operation>;

    /// Requests every source, in server order, followed by the end marker.
    fn get_source_info_list(
        &self,
        guard: &mut LoopGuard<'_>,
        callback: InfoCallback<SourceRecord>,
    ) -> Option<Operation>;

    /// Sets the per-channel volume of a source.
    fn set_source_volume(
        &self,
        guard: &mut LoopGuard<'_>,
        source: Selector<'_>,
        volume: &ChannelVolumesRecord,
        callback: SuccessCallback,
    ) -> Option<Operation>;

    /// Mutes or unmutes a source.
    fn set_source_mute(
        &self,
        guard: &mut LoopGuard<'_>,
        source: Selector<'_>,
        mute: bool,
        callback: SuccessCallback,
    ) -> Option<Operation>;

    /// Suspends or resumes a source.
    fn suspend_source(
        &self,
        guard: &mut LoopGuard<'_>,
        source: Selector<'_>,
        suspend: bool,
        callback: SuccessCallback,
    ) -> Option<Operation>;

    /// Switches the active port of a source.
    fn set_source_port(
        &self,
        guard: &mut LoopGuard<'_>,
        source: Selector<'_>,
        port: &str,
        callback: SuccessCallback,
    ) -> Option<Operation>;

    /// Requests one sink input. Delivers the record followed by the end marker.
    fn get_sink_input_info(
        &self,
        guard: &mut LoopGuard<'_>,
        index: u32,
        callback: InfoCallback<SinkInputRecord>,
    ) -> Option<Operation>;

    /// Requests every sink input, followed by the end marker.
    fn get_sink_input_info_list(
        &self,
        guard: &mut LoopGuard<'_>,
        callback: InfoCallback<SinkInputRecord>,
    ) -> Option<Operation>;

    /// Requests one source output. Delivers the record followed by the end marker.
    fn get_source_output_info(
        &self,
        guard: &mut LoopGuard<'_>,
        index: u32,
        callback: InfoCallback<SourceOutputRecord>,
    ) -> Option<Operation>;

    /// Requests every source output, followed by the end marker.
    fn get_source_output_info_list(
        &self,
        guard: &mut LoopGuard<'_>,
        callback: InfoCallback<SourceOutputRecord>,
    ) -> Option<Operation>;

    /// Requests one module. Delivers the record followed by the end marker.
    fn get_module_info(
        &self,
        guard: &mut LoopGuard<'_>,
        index: u32,
        callback: InfoCallback<ModuleRecord>,
    ) -> Option<Operation>;

    /// Requests every loaded module, followed by the end marker.
    fn get_module_info_list(
        &self,
        guard: &mut LoopGuard<'_>,
        callback: InfoCallback<ModuleRecord>,
    ) -> Option<Operation>;

    /// Loads a module and reports its index.
    fn load_module(
        &self,
        guard: &mut LoopGuard<'_>,
        name: &str,
        argument: &str,
        callback: IndexCallback,
    ) -> Option<Operation>;

    /// Unloads a module.
    fn unload_module(
        &self,
        guard: &mut LoopGuard<'_>,
        index: u32,
        callback: SuccessCallback,
    ) -> Option<Operation>;

    /// Requests one client. Delivers the record followed by the end marker.
    fn get_client_info(
        &self,
        guard: &mut LoopGuard<'_>,
        index: u32,
        callback: InfoCallback<ClientRecord>,
    ) -> Option<Operation>;

    /// Requests every connected client, followed by the end marker.
    fn get_client_info_list(
        &self,
        guard: &mut LoopGuard<'_>,
        callback: InfoCallback<ClientRecord>,
    ) -> Option<Operation>;

    /// Disconnects a client from the server.
    fn kill_client(
        &self,
        guard: &mut LoopGuard<'_>,
        index: u32,
        callback: SuccessCallback,
    ) -> Option<Operation>;

    /// Requests one card. Delivers the record followed by the end marker.
    fn get_card_info(
        &self,
        guard: &mut LoopGuard<'_>,
        card: Selector<'_>,
        callback: InfoCallback<CardRecord>,
    ) -> Option<Operation>;

    /// Requests every card, followed by the end marker.
    fn get_card_info_list(
        &self,
        guard: &mut LoopGuard<'_>,
        callback: InfoCallback<CardRecord>,
    ) -> Option<Operation>;

    /// Switches the active profile of a card.
    fn set_card_profile(
        &self,
        guard: &mut LoopGuard<'_>,
        card: Selector<'_>,
        profile: &str,
        callback: SuccessCallback,
    ) -> Option<Operation>;

    /// Sets the latency offset of a port on a card, in microseconds.
    fn set_port_latency_offset(
        &self,
        guard: &mut LoopGuard<'_>,
        card: &str,
        port: &str,
        offset_usec: i64,
        callback: SuccessCallback,
    ) -> Option<Operation>;
}
