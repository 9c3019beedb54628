//! Handles for in-flight asynchronous requests.

use std::any::type_name;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use parking_lot::Mutex;

const RUNNING: u8 = 0;
const DONE: u8 = 1;
const CANCELLED: u8 = 2;

/// The state of an [`Operation`].
///
/// An operation starts out `Running` and moves to exactly one terminal state, where it stays.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum OperationState {
    /// The operation has been issued and its final callback has not yet run.
    Running,

    /// The final callback has run (for list operations: the end marker was delivered).
    Done,

    /// The operation was abandoned by the native side, typically because the connection was
    /// lost. No further callbacks will run for it.
    Cancelled,
}

type ReleaseHook = Box<dyn FnOnce() + Send>;

struct OperationShared {
    state: AtomicU8,
    release_hook: Mutex<Option<ReleaseHook>>,
}

impl Drop for OperationShared {
    fn drop(&mut self) {
        if let Some(hook) = self.release_hook.get_mut().take() {
            hook();
        }
    }
}

/// A reference-counted handle to one in-flight request.
///
/// Every request-issuing native call returns an `Operation`. The native side keeps one clone to
/// drive state transitions; the caller keeps another and releases it exactly once by dropping it
/// (or calling [`release()`][Self::release]), whatever path the caller takes. When the last
/// clone is gone, the release hook registered by the native side runs.
///
/// State transitions are expected to happen on the loop thread with the loop lock held, so a
/// caller that checks the state under the same lock never races a transition.
#[derive(Clone)]
pub struct Operation {
    shared: Arc<OperationShared>,
}

impl Operation {
    /// Creates a new operation in the `Running` state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Arc::new(OperationShared {
                state: AtomicU8::new(RUNNING),
                release_hook: Mutex::new(None),
            }),
        }
    }

    /// Creates a new operation whose `hook` runs once, when the last clone is released.
    ///
    /// Native backends use this to pair the handle with the native reference release.
    #[must_use]
    pub fn with_release_hook<F>(hook: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let operation = Self::new();
        *operation.shared.release_hook.lock() = Some(Box::new(hook));
        operation
    }

    /// The current state of the operation.
    #[must_use]
    pub fn state(&self) -> OperationState {
        match self.shared.state.load(Ordering::Acquire) {
            RUNNING => OperationState::Running,
            DONE => OperationState::Done,
            _ => OperationState::Cancelled,
        }
    }

    /// Whether the operation is still `Running`.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state() == OperationState::Running
    }

    /// Moves a running operation to `Done`.
    ///
    /// Returns `false` if the operation had already reached a terminal state, which is left
    /// unchanged.
    pub fn complete(&self) -> bool {
        self.transition(DONE)
    }

    /// Moves a running operation to `Cancelled`.
    ///
    /// Returns `false` if the operation had already reached a terminal state, which is left
    /// unchanged. The caller is responsible for signalling the event loop afterwards so that a
    /// waiter re-checks the state.
    pub fn cancel(&self) -> bool {
        self.transition(CANCELLED)
    }

    /// Releases this reference to the operation.
    ///
    /// Equivalent to dropping it; spelled out where the release point matters to the reader.
    pub fn release(self) {
        drop(self);
    }

    fn transition(&self, target: u8) -> bool {
        self.shared
            .state
            .compare_exchange(RUNNING, target, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl Default for Operation {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("state", &self.state())
            .field("references", &Arc::strong_count(&self.shared))
            .finish()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(Operation: Send, Sync, Clone);

    #[test]
    fn starts_running() {
        let operation = Operation::new();

        assert_eq!(operation.state(), OperationState::Running);
        assert!(operation.is_running());
    }

    #[test]
    fn complete_moves_to_done() {
        let operation = Operation::new();

        assert!(operation.complete());
        assert_eq!(operation.state(), OperationState::Done);
    }

    #[test]
    fn terminal_state_is_sticky() {
        let operation = Operation::new();

        assert!(operation.cancel());
        assert!(!operation.complete());
        assert!(!operation.cancel());
        assert_eq!(operation.state(), OperationState::Cancelled);
    }

    #[test]
    fn state_is_shared_between_clones() {
        let caller_side = Operation::new();
        let native_side = caller_side.clone();

        native_side.complete();

        assert_eq!(caller_side.state(), OperationState::Done);
    }

    #[test]
    fn release_hook_runs_once_after_last_clone() {
        let released = Arc::new(AtomicUsize::new(0));

        let released_clone = Arc::clone(&released);
        let caller_side = Operation::with_release_hook(move || {
            released_clone.fetch_add(1, Ordering::Relaxed);
        });
        let native_side = caller_side.clone();

        caller_side.release();
        assert_eq!(released.load(Ordering::Relaxed), 0);

        drop(native_side);
        assert_eq!(released.load(Ordering::Relaxed), 1);
    }
}
