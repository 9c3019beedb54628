use std::any::type_name;
use std::fmt;
use std::mem;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;

use crate::event_loop::Deferred;
use crate::fake::FakeServerBuilder;
use crate::fake::catalog::Catalog;
use crate::fake::native::FakeContext;
use crate::native::{Backend, NativeContext};
use crate::{ErrorCode, LoopGuard};

/// Misbehavior that the server has been told to exhibit.
#[derive(Debug, Default)]
pub(crate) struct Faults {
    /// The next request is refused with this code.
    pub(crate) reject_next: Option<ErrorCode>,

    /// Connection attempts end in `Failed` with this code.
    pub(crate) connect_failure: Option<ErrorCode>,

    /// The connection that delivers the next record after this many is lost instead.
    pub(crate) records_until_disconnect: Option<usize>,

    /// Mutations fail with this code.
    pub(crate) mutation_failure: Option<ErrorCode>,

    /// Replies are held back until resumed.
    pub(crate) stall: bool,

    /// The next request finishes without its callback ever running.
    pub(crate) omit_next_result: bool,

    /// Each list record after the first is held back this long, with the loop lock released.
    pub(crate) record_interval: Option<Duration>,
}

#[derive(Debug, Default)]
struct Counters {
    operations_issued: AtomicUsize,
    live_operations: AtomicUsize,
    peak_live_operations: AtomicUsize,
    disconnects: AtomicUsize,
    contexts_created: AtomicUsize,
    contexts_released: AtomicUsize,
}

pub(crate) struct ServerShared {
    pub(crate) catalog: Mutex<Catalog>,
    pub(crate) faults: Mutex<Faults>,
    pub(crate) server_protocol_version: u32,

    // Replies held back while stalled, in the order they were issued.
    stalled: Mutex<Vec<Deferred>>,

    counters: Counters,
}

impl ServerShared {
    pub(crate) fn new(catalog: Catalog, server_protocol_version: u32) -> Self {
        Self {
            catalog: Mutex::new(catalog),
            faults: Mutex::new(Faults::default()),
            server_protocol_version,
            stalled: Mutex::new(Vec::new()),
            counters: Counters::default(),
        }
    }

    /// Queues a reply on the loop thread, or holds it back if the server is stalled.
    pub(crate) fn schedule(&self, guard: &mut LoopGuard<'_>, reply: Deferred) {
        if self.faults.lock().stall {
            self.stalled.lock().push(reply);
            return;
        }

        guard.defer(reply);
    }

    /// Counts a new operation and returns the hook that uncounts it on release.
    pub(crate) fn track_operation(self: &Arc<Self>) -> impl FnOnce() + Send + 'static {
        self.counters
            .operations_issued
            .fetch_add(1, Ordering::Relaxed);

        let live = self
            .counters
            .live_operations
            .fetch_add(1, Ordering::Relaxed)
            .wrapping_add(1);

        self.counters
            .peak_live_operations
            .fetch_max(live, Ordering::Relaxed);

        let server = Arc::clone(self);
        move || {
            server
                .counters
                .live_operations
                .fetch_sub(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_disconnect(&self) {
        self.counters.disconnects.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_context_released(&self) {
        self.counters
            .contexts_released
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Consumes one record of the disconnect budget. Returns `false` if the connection must be
    /// lost instead of delivering the record.
    pub(crate) fn take_record_budget(&self) -> bool {
        let mut faults = self.faults.lock();

        match faults.records_until_disconnect {
            None => true,
            Some(0) => {
                faults.records_until_disconnect = None;
                false
            }
            Some(remaining) => {
                faults.records_until_disconnect = Some(remaining.saturating_sub(1));
                true
            }
        }
    }
}

impl fmt::Debug for ServerShared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("catalog", &self.catalog)
            .field("faults", &self.faults)
            .field("server_protocol_version", &self.server_protocol_version)
            .field("stalled", &self.stalled.lock().len())
            .field("counters", &self.counters)
            .finish()
    }
}

/// A simulated sound server.
///
/// Use [`FakeServer::builder()`] to configure the objects it reports, pass it (or a clone) to
/// [`Context::builder()`][crate::Context::builder], and use the remaining methods to inject
/// faults and to inspect what the bridge did.
#[derive(Clone, Debug)]
pub struct FakeServer {
    pub(crate) shared: Arc<ServerShared>,
}

impl FakeServer {
    /// Creates a server with default settings and no sinks or sources.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Creates a builder for configuring the server.
    #[must_use]
    pub fn builder() -> FakeServerBuilder {
        FakeServerBuilder::new()
    }

    pub(crate) fn from_shared(shared: ServerShared) -> Self {
        Self {
            shared: Arc::new(shared),
        }
    }

    /// Refuses the next request of any connection with `code`.
    ///
    /// The request is refused before it is issued, so no operation is created for it.
    pub fn reject_next_request(&self, code: ErrorCode) {
        self.shared.faults.lock().reject_next = Some(code);
    }

    /// Makes every later connection attempt end in the `Failed` state with `code`.
    pub fn fail_connections(&self, code: ErrorCode) {
        self.shared.faults.lock().connect_failure = Some(code);
    }

    /// Loses the connection after `records` more records have been delivered, in the middle of
    /// whatever operation is delivering at that point.
    pub fn disconnect_after_records(&self, records: usize) {
        self.shared.faults.lock().records_until_disconnect = Some(records);
    }

    /// Makes every later mutation fail with `code`.
    pub fn fail_mutations(&self, code: ErrorCode) {
        self.shared.faults.lock().mutation_failure = Some(code);
    }

    /// Holds back every reply (including connection progress) until
    /// [`resume()`][Self::resume] is called.
    pub fn stall(&self) {
        self.shared.faults.lock().stall = true;
    }

    /// Makes the next request finish without ever invoking its callback.
    ///
    /// This is a broken server: every request is supposed to be answered.
    pub fn omit_next_result(&self) {
        self.shared.faults.lock().omit_next_result = true;
    }

    /// Delivers list records one at a time, `interval` apart, like a server that is slow to
    /// enumerate its objects.
    pub fn pace_records(&self, interval: Duration) {
        self.shared.faults.lock().record_interval = Some(interval);
    }

    /// Ends a [`stall()`][Self::stall] and queues every held-back reply, in issue order.
    pub fn resume(&self, guard: &mut LoopGuard<'_>) {
        self.shared.faults.lock().stall = false;

        let stalled = mem::take(&mut *self.shared.stalled.lock());

        if !stalled.is_empty() {
            debug!(replies = stalled.len(), "resuming stalled fake server replies");
        }

        for reply in stalled {
            guard.defer(reply);
        }
    }

    /// Removes every injected fault except a stall, which needs [`resume()`][Self::resume].
    pub fn clear_faults(&self) {
        let mut faults = self.shared.faults.lock();
        let stall = faults.stall;

        *faults = Faults {
            stall,
            ..Faults::default()
        };
    }

    /// The number of operations issued so far, by every connection.
    #[must_use]
    pub fn operations_issued(&self) -> usize {
        self.shared
            .counters
            .operations_issued
            .load(Ordering::Relaxed)
    }

    /// The number of operations that have not yet been released by both sides.
    #[must_use]
    pub fn live_operations(&self) -> usize {
        self.shared.counters.live_operations.load(Ordering::Relaxed)
    }

    /// The highest number of operations that were live at the same time.
    #[must_use]
    pub fn peak_live_operations(&self) -> usize {
        self.shared
            .counters
            .peak_live_operations
            .load(Ordering::Relaxed)
    }

    /// The number of connections that were closed while connected or connecting.
    #[must_use]
    pub fn disconnects(&self) -> usize {
        self.shared.counters.disconnects.load(Ordering::Relaxed)
    }

    /// The number of native connection handles created so far.
    #[must_use]
    pub fn contexts_created(&self) -> usize {
        self.shared
            .counters
            .contexts_created
            .load(Ordering::Relaxed)
    }

    /// The number of native connection handles released so far.
    #[must_use]
    pub fn contexts_released(&self) -> usize {
        self.shared
            .counters
            .contexts_released
            .load(Ordering::Relaxed)
    }

    /// The number of clients the server currently reports, connected contexts included.
    #[must_use]
    pub fn client_count(&self) -> usize {
        self.shared.catalog.lock().clients.len()
    }
}

impl Default for FakeServer {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for FakeServer {
    fn new_context(&self, _guard: &mut LoopGuard<'_>, name: &str) -> Box<dyn NativeContext> {
        self.shared
            .counters
            .contexts_created
            .fetch_add(1, Ordering::Relaxed);

        Box::new(FakeContext::new(Arc::clone(&self.shared), name))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(FakeServer: Send, Sync, Clone);

    #[test]
    fn record_budget_runs_out() {
        let server = FakeServer::new();
        server.disconnect_after_records(2);

        assert!(server.shared.take_record_budget());
        assert!(server.shared.take_record_budget());
        assert!(!server.shared.take_record_budget());

        // The fault fires once.
        assert!(server.shared.take_record_budget());
    }

    #[test]
    fn operation_tracking_counts_live_and_peak() {
        let server = FakeServer::new();

        let first = server.shared.track_operation();
        let second = server.shared.track_operation();
        assert_eq!(server.live_operations(), 2);

        first();
        second();

        assert_eq!(server.live_operations(), 0);
        assert_eq!(server.peak_live_operations(), 2);
        assert_eq!(server.operations_issued(), 2);
    }

    #[test]
    fn clear_faults_keeps_stall() {
        let server = FakeServer::new();
        server.stall();
        server.fail_mutations(ErrorCode::Access);

        server.clear_faults();

        let faults = server.shared.faults.lock();
        assert!(faults.stall);
        assert!(faults.mutation_failure.is_none());
    }
}
