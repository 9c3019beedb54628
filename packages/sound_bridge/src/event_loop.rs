//! The dedicated event loop thread and the monitor that callers use to talk to it.

use std::any::{Any, type_name};
use std::collections::VecDeque;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Instant;

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{debug, error, trace};

const DEFAULT_THREAD_NAME: &str = "sound-bridge-loop";

/// Work queued for execution on the loop thread. It runs with the loop lock held.
pub(crate) type Deferred = Box<dyn FnOnce(&mut LoopGuard<'_>) + Send>;

struct LoopState {
    deferred: VecDeque<Deferred>,
    stopped: bool,

    // Set while a callback is parked inside `signal(true)` and the data it handed out is still
    // being read by a caller. Cleared by `accept()`.
    awaiting_accept: bool,
}

impl fmt::Debug for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("deferred", &self.deferred.len())
            .field("stopped", &self.stopped)
            .field("awaiting_accept", &self.awaiting_accept)
            .finish()
    }
}

#[derive(Debug)]
pub(crate) struct LoopShared {
    state: Mutex<LoopState>,

    // The loop thread idles on this until deferred work arrives or the loop is stopped.
    work: Condvar,

    // Callers block on this inside `wait()` until a callback signals.
    signal: Condvar,

    // A callback that signalled with `wait_for_accept` blocks on this until `accept()`.
    accept: Condvar,

    thread_id: OnceLock<ThreadId>,
}

impl LoopShared {
    fn new() -> Self {
        Self {
            state: Mutex::new(LoopState {
                deferred: VecDeque::new(),
                stopped: false,
                awaiting_accept: false,
            }),
            work: Condvar::new(),
            signal: Condvar::new(),
            accept: Condvar::new(),
            thread_id: OnceLock::new(),
        }
    }

    fn is_loop_thread(&self) -> bool {
        self.thread_id.get() == Some(&thread::current().id())
    }

    fn stop(&self) -> bool {
        let mut state = self.state.lock();

        if state.stopped {
            return false;
        }

        state.stopped = true;
        drop(state);

        self.work.notify_all();

        // Anyone blocked in `wait()` must get a chance to notice that nothing will ever arrive.
        self.signal.notify_all();

        true
    }
}

/// Owns the single thread that drives the native event source and runs completion callbacks.
///
/// Callers never touch the loop thread directly. They acquire the loop lock via
/// [`lock()`][Self::lock] (or a cloned [`LoopHandle`]), issue requests, and block in
/// [`LoopGuard::wait()`] until a callback running on the loop thread signals them.
///
/// # Lifetime
///
/// Dropping the `EventLoop` stops the loop thread and joins it. Queued work that has not started
/// is discarded. Callers that are blocked waiting on the loop are woken and observe that the
/// loop is stopped.
///
/// # Example
///
/// ```rust
/// use sound_bridge::EventLoop;
///
/// let event_loop = EventLoop::new();
///
/// let mut guard = event_loop.lock();
/// assert!(!guard.is_stopped());
/// drop(guard);
///
/// event_loop.stop();
/// ```
#[derive(Debug)]
pub struct EventLoop {
    handle: LoopHandle,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl EventLoop {
    /// Creates and starts an event loop with default settings.
    ///
    /// Use [`EventLoop::builder()`] for custom configuration.
    ///
    /// # Panics
    ///
    /// Panics if the operating system refuses to create the loop thread.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Creates a builder for configuring the event loop.
    #[must_use]
    pub fn builder() -> EventLoopBuilder {
        EventLoopBuilder::new()
    }

    /// Returns a cloneable handle that can be used to lock this loop from any thread.
    #[must_use]
    pub fn handle(&self) -> LoopHandle {
        self.handle.clone()
    }

    /// Acquires the loop lock. Equivalent to `self.handle().lock()`.
    ///
    /// # Panics
    ///
    /// Panics if called from the loop thread.
    pub fn lock(&self) -> LoopGuard<'_> {
        self.handle.lock()
    }

    /// Stops the loop thread and waits for it to exit.
    ///
    /// Calling this more than once is harmless.
    pub fn stop(&self) {
        if self.handle.shared.stop() {
            debug!("event loop stop requested");
        }

        let thread = self.thread.lock().take();

        if let Some(thread) = thread {
            if thread.thread().id() == thread::current().id() {
                // Stopping from inside a callback. The loop exits on its own once the
                // callback returns; joining ourselves would never finish.
                return;
            }

            if let Err(payload) = thread.join() {
                // Work items run inside a panic trap so the loop thread itself should never
                // panic. If it does, something is badly broken and we do not hide it.
                panic::resume_unwind(payload);
            }
        }
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for EventLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Builder for configuring an [`EventLoop`].
#[derive(Debug)]
pub struct EventLoopBuilder {
    thread_name: String,
}

impl EventLoopBuilder {
    fn new() -> Self {
        Self {
            thread_name: DEFAULT_THREAD_NAME.to_string(),
        }
    }

    /// Sets the name of the loop thread.
    ///
    /// Default is `sound-bridge-loop`.
    #[must_use]
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Starts the loop thread and returns the running loop.
    ///
    /// # Panics
    ///
    /// Panics if the operating system refuses to create the loop thread.
    #[must_use]
    pub fn build(self) -> EventLoop {
        let shared = Arc::new(LoopShared::new());
        let shared_clone = Arc::clone(&shared);

        let thread = thread::Builder::new()
            .name(self.thread_name.clone())
            .spawn(move || {
                debug!("event loop thread started");
                run_loop(&shared_clone);
                debug!("event loop thread exiting");
            })
            .expect("failed to spawn event loop thread: thread spawning failure is not supported");

        shared
            .thread_id
            .set(thread.thread().id())
            .expect("a freshly created loop cannot already have a thread id");

        trace!(thread_name = %self.thread_name, "event loop built");

        EventLoop {
            handle: LoopHandle { shared },
            thread: Mutex::new(Some(thread)),
        }
    }
}

fn run_loop(shared: &LoopShared) {
    let mut guard = LoopGuard {
        state: shared.state.lock(),
        shared,
    };

    loop {
        if guard.state.stopped {
            let abandoned = guard.state.deferred.len();

            if abandoned > 0 {
                debug!(abandoned, "discarding deferred work of stopped event loop");
            }

            guard.state.deferred.clear();
            break;
        }

        if let Some(work) = guard.state.deferred.pop_front() {
            // A panicking callback must not take the loop down with it, otherwise every caller
            // waiting on this loop would hang forever.
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| work(&mut guard))) {
                error!(
                    panic_message = %format_panic_payload(&*payload),
                    "event loop callback panicked"
                );
            }
            continue;
        }

        shared.work.wait(&mut guard.state);
    }
}

pub(crate) fn format_panic_payload(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// A cloneable reference to an [`EventLoop`] that can be used from any thread.
///
/// Holding a handle does not keep the loop thread alive. Once the owning [`EventLoop`] is
/// dropped, guards obtained from the handle report [`is_stopped()`][LoopGuard::is_stopped].
#[derive(Clone, Debug)]
pub struct LoopHandle {
    shared: Arc<LoopShared>,
}

impl LoopHandle {
    /// Acquires the loop lock, blocking until it is available.
    ///
    /// The lock is released when the returned guard is dropped. While the lock is held the loop
    /// thread cannot run callbacks, except while the holder is suspended in
    /// [`LoopGuard::wait()`].
    ///
    /// # Panics
    ///
    /// Panics if called from the loop thread. Callbacks already run with the lock held and
    /// receive their guard as a parameter.
    pub fn lock(&self) -> LoopGuard<'_> {
        assert!(
            !self.shared.is_loop_thread(),
            "the event loop lock cannot be acquired from the loop thread itself"
        );

        LoopGuard {
            state: self.shared.state.lock(),
            shared: &self.shared,
        }
    }

    /// Whether both handles refer to the same event loop.
    #[must_use]
    pub fn same_loop(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

/// Proof that the loop lock is held, and the means to wait, signal and accept under it.
///
/// Callers obtain a guard from [`LoopHandle::lock()`]. Callbacks running on the loop thread
/// receive the loop thread's guard as a parameter. Native entry points take `&mut LoopGuard`
/// so they cannot be called without the lock.
pub struct LoopGuard<'a> {
    state: MutexGuard<'a, LoopState>,
    shared: &'a LoopShared,
}

impl LoopGuard<'_> {
    /// Blocks until a callback signals, releasing the loop lock while blocked.
    ///
    /// The lock is held again when this returns. Wakeups are broadcast to every waiter and may
    /// be spurious, so callers must re-check their own completion condition in a loop.
    pub fn wait(&mut self) {
        self.shared.signal.wait(&mut self.state);
    }

    /// Like [`wait()`][Self::wait] but gives up at `deadline`.
    ///
    /// Returns `true` if the deadline passed without a signal.
    pub fn wait_until(&mut self, deadline: Instant) -> bool {
        self.shared
            .signal
            .wait_until(&mut self.state, deadline)
            .timed_out()
    }

    /// Wakes every thread blocked in [`wait()`][Self::wait].
    ///
    /// Intended for callbacks on the loop thread. When `wait_for_accept` is `true`, the call
    /// does not return until a caller has invoked [`accept()`][Self::accept]. The loop lock is
    /// released in the meantime, so data owned by the calling callback stays alive and unchanged
    /// while the woken caller reads it.
    pub fn signal(&mut self, wait_for_accept: bool) {
        debug_assert!(
            self.shared.is_loop_thread(),
            "signal() is only meaningful from callbacks running on the loop thread"
        );

        self.shared.signal.notify_all();

        if wait_for_accept {
            self.state.awaiting_accept = true;

            // No early exit on stop: the caller may still be reading data that lives in this
            // callback's frame. Only `accept()` ends the hand-off.
            while self.state.awaiting_accept {
                self.shared.accept.wait(&mut self.state);
            }
        }
    }

    /// Tells the loop that the caller has finished reading the data handed out by the most recent
    /// [`signal(true)`][Self::signal], allowing the callback to return and the native library to
    /// reclaim that data.
    ///
    /// # Panics
    ///
    /// Panics if no callback is waiting for an accept.
    pub fn accept(&mut self) {
        assert!(
            self.state.awaiting_accept,
            "accept() called while no callback is waiting for it"
        );

        self.state.awaiting_accept = false;
        self.shared.accept.notify_one();
    }

    /// Whether a callback is parked in [`signal(true)`][Self::signal] waiting for an accept.
    ///
    /// This is the signal payload: `true` means meaningful data was handed out and must be
    /// accepted, `false` means the last signal carried no data.
    #[must_use]
    pub fn is_accept_pending(&self) -> bool {
        self.state.awaiting_accept
    }

    /// Queues `work` to run on the loop thread with the loop lock held.
    ///
    /// This is the hook through which native backends deliver completions. The work runs after
    /// the current lock holder releases the lock (by dropping its guard or waiting).
    pub fn defer<F>(&mut self, work: F)
    where
        F: FnOnce(&mut LoopGuard<'_>) + Send + 'static,
    {
        self.state.deferred.push_back(Box::new(work));
        self.shared.work.notify_one();
    }

    /// Whether the loop has been stopped. A stopped loop never runs callbacks again.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.state.stopped
    }

    /// Whether the current thread is the loop thread.
    #[must_use]
    pub fn in_loop_thread(&self) -> bool {
        self.shared.is_loop_thread()
    }

    /// Runs `f` with the loop lock released, taking it again before returning.
    ///
    /// Callers blocked in [`wait()`][Self::wait] can observe their deadlines meanwhile.
    pub(crate) fn unlocked<R>(&mut self, f: impl FnOnce() -> R) -> R {
        MutexGuard::unlocked(&mut self.state, f)
    }
}

impl fmt::Debug for LoopGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("state", &*self.state)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    use static_assertions::{assert_impl_all, assert_not_impl_any};
    use testing::with_watchdog;

    use super::*;

    assert_impl_all!(EventLoop: Send, Sync);
    assert_impl_all!(LoopHandle: Send, Sync, Clone);
    assert_not_impl_any!(LoopGuard<'static>: Send);

    #[cfg_attr(miri, ignore)]
    #[test]
    fn deferred_work_runs_on_loop_thread() {
        with_watchdog(|| {
            let event_loop = EventLoop::new();
            let ran_on_loop = Arc::new(AtomicBool::new(false));
            let done = Arc::new(AtomicBool::new(false));

            let mut guard = event_loop.lock();

            let ran_on_loop_clone = Arc::clone(&ran_on_loop);
            let done_clone = Arc::clone(&done);
            guard.defer(move |guard| {
                ran_on_loop_clone.store(guard.in_loop_thread(), Ordering::Relaxed);
                done_clone.store(true, Ordering::Relaxed);
                guard.signal(false);
            });

            while !done.load(Ordering::Relaxed) {
                guard.wait();
            }

            assert!(ran_on_loop.load(Ordering::Relaxed));
            assert!(!guard.in_loop_thread());
        });
    }

    #[cfg_attr(miri, ignore)]
    #[test]
    fn signal_with_accept_keeps_callback_parked_until_accept() {
        with_watchdog(|| {
            let event_loop = EventLoop::new();
            let callback_returned = Arc::new(AtomicBool::new(false));
            let data_ready = Arc::new(AtomicBool::new(false));

            let mut guard = event_loop.lock();

            let callback_returned_clone = Arc::clone(&callback_returned);
            let data_ready_clone = Arc::clone(&data_ready);
            guard.defer(move |guard| {
                data_ready_clone.store(true, Ordering::Relaxed);
                guard.signal(true);
                callback_returned_clone.store(true, Ordering::Relaxed);
            });

            while !data_ready.load(Ordering::Relaxed) {
                guard.wait();
            }

            // We hold the lock, so the callback cannot have returned yet.
            assert!(guard.is_accept_pending());
            assert!(!callback_returned.load(Ordering::Relaxed));

            guard.accept();
            assert!(!guard.is_accept_pending());

            // Give the loop thread a chance to finish the callback.
            drop(guard);

            while !callback_returned.load(Ordering::Relaxed) {
                thread::yield_now();
            }
        });
    }

    #[cfg_attr(miri, ignore)]
    #[test]
    fn wait_until_times_out_without_signal() {
        with_watchdog(|| {
            let event_loop = EventLoop::new();
            let mut guard = event_loop.lock();

            let timed_out = guard.wait_until(Instant::now() + Duration::from_millis(20));

            assert!(timed_out);
        });
    }

    #[cfg_attr(miri, ignore)]
    #[test]
    fn stop_wakes_waiters() {
        with_watchdog(|| {
            let event_loop = Arc::new(EventLoop::new());
            let handle = event_loop.handle();
            let waiting = Arc::new(AtomicBool::new(false));

            let waiting_clone = Arc::clone(&waiting);
            let waiter = thread::spawn(move || {
                let mut guard = handle.lock();
                waiting_clone.store(true, Ordering::Relaxed);

                while !guard.is_stopped() {
                    guard.wait();
                }
            });

            while !waiting.load(Ordering::Relaxed) {
                thread::yield_now();
            }

            event_loop.stop();
            waiter.join().unwrap();
        });
    }

    #[cfg_attr(miri, ignore)]
    #[test]
    fn stop_is_idempotent() {
        let event_loop = EventLoop::new();

        event_loop.stop();
        event_loop.stop();

        assert!(event_loop.lock().is_stopped());
    }

    #[cfg_attr(miri, ignore)]
    #[test]
    fn panicking_callback_does_not_kill_loop() {
        with_watchdog(|| {
            let event_loop = EventLoop::new();
            let survived = Arc::new(AtomicBool::new(false));

            let mut guard = event_loop.lock();
            guard.defer(|_| panic!("callback failure"));

            let survived_clone = Arc::clone(&survived);
            guard.defer(move |guard| {
                survived_clone.store(true, Ordering::Relaxed);
                guard.signal(false);
            });

            while !survived.load(Ordering::Relaxed) {
                guard.wait();
            }
        });
    }

    #[cfg_attr(miri, ignore)]
    #[test]
    fn deferred_work_runs_in_queue_order() {
        with_watchdog(|| {
            let event_loop = EventLoop::new();
            let order = Arc::new(Mutex::new(Vec::new()));
            let finished = Arc::new(AtomicUsize::new(0));

            let mut guard = event_loop.lock();

            for i in 0..5 {
                let order = Arc::clone(&order);
                let finished = Arc::clone(&finished);
                guard.defer(move |guard| {
                    order.lock().push(i);
                    finished.fetch_add(1, Ordering::Relaxed);
                    guard.signal(false);
                });
            }

            while finished.load(Ordering::Relaxed) < 5 {
                guard.wait();
            }

            assert_eq!(*order.lock(), vec![0, 1, 2, 3, 4]);
        });
    }

    #[cfg_attr(miri, ignore)]
    #[test]
    #[should_panic]
    fn accept_without_pending_callback_panics() {
        let event_loop = EventLoop::new();
        let mut guard = event_loop.lock();

        guard.accept();
    }

    #[test]
    fn panic_payload_is_formatted() {
        assert_eq!(format_panic_payload(&"static message"), "static message");
        assert_eq!(format_panic_payload(&"owned".to_string()), "owned");
        assert_eq!(format_panic_payload(&42_u8), "unknown panic payload");
    }

    #[cfg_attr(miri, ignore)]
    #[test]
    fn unlocked_callback_lets_waiters_run() {
        with_watchdog(|| {
            let event_loop = EventLoop::new();
            let released = Arc::new(AtomicBool::new(false));

            let mut guard = event_loop.lock();

            let released_clone = Arc::clone(&released);
            guard.defer(move |guard| {
                guard.unlocked(|| {
                    while !released_clone.load(Ordering::Relaxed) {
                        thread::sleep(Duration::from_millis(1));
                    }
                });
                guard.signal(false);
            });

            // The callback is inside `unlocked()`, so this thread can take the lock back.
            drop(guard);
            thread::sleep(Duration::from_millis(10));
            let mut guard = event_loop.lock();
            released.store(true, Ordering::Relaxed);

            guard.wait();
        });
    }

    #[cfg_attr(miri, ignore)]
    #[test]
    fn handles_refer_to_same_loop() {
        let event_loop = EventLoop::new();
        let other = EventLoop::new();

        assert!(event_loop.handle().same_loop(&event_loop.handle()));
        assert!(!event_loop.handle().same_loop(&other.handle()));
    }
}
