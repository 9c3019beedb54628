//! The hand-off point between one callback invocation and the caller waiting for it.

use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::ptr::NonNull;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::LoopGuard;

/// What a callback has deposited into a [`ResultSlot`].
#[derive(Debug)]
pub(crate) enum Completion<T> {
    /// Nothing has arrived yet, or the previous delivery was already taken.
    Pending,

    /// A result is ready for the caller.
    Ready(T),

    /// The end-of-sequence marker of a list arrived.
    EndOfSequence,

    /// The native side reported that the request failed.
    Failed,
}

impl<T> Completion<T> {
    pub(crate) fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

#[derive(Debug)]
struct SlotState<T> {
    completion: Completion<T>,

    // Set when the caller gave up waiting. Later deliveries are dropped on the floor and the
    // callback does not park waiting for an accept that would never come.
    abandoned: bool,
}

/// A fresh, call-scoped location where a callback deposits one result for one waiting caller.
///
/// One slot exists per bridged call. The callback closure owns one `Arc` to it and the waiting
/// caller owns another, so concurrent calls never alias. All access happens with the loop lock
/// held; the inner mutex only exists to make the slot shareable with the callback closure.
#[derive(Debug)]
pub(crate) struct ResultSlot<T> {
    state: Mutex<SlotState<T>>,
}

impl<T> ResultSlot<T> {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(SlotState {
                completion: Completion::Pending,
                abandoned: false,
            }),
        })
    }

    /// Callback side: stores `completion` and wakes the waiting caller.
    ///
    /// With `wait_for_accept`, the call returns only after the caller has accepted, keeping any
    /// data borrowed by the callback alive while the caller reads it.
    pub(crate) fn deposit(
        &self,
        guard: &mut LoopGuard<'_>,
        completion: Completion<T>,
        wait_for_accept: bool,
    ) {
        {
            let mut state = self.state.lock();

            if state.abandoned {
                return;
            }

            state.completion = completion;
        }

        guard.signal(wait_for_accept);
    }

    /// Caller side: takes whatever has been deposited, leaving the slot `Pending` for the next
    /// delivery of a list.
    pub(crate) fn take(&self) -> Completion<T> {
        mem::replace(&mut self.state.lock().completion, Completion::Pending)
    }

    pub(crate) fn is_pending(&self) -> bool {
        self.state.lock().completion.is_pending()
    }

    /// Caller side: stops accepting deliveries. Anything already deposited is discarded.
    pub(crate) fn abandon(&self) {
        let mut state = self.state.lock();
        state.abandoned = true;
        state.completion = Completion::Pending;
    }
}

impl<R> ResultSlot<RecordPtr<R>> {
    /// Callback side: hands `record` to the waiting caller and parks until the caller has read
    /// it and accepted.
    pub(crate) fn deliver_record(&self, guard: &mut LoopGuard<'_>, record: &R) {
        self.deposit(
            guard,
            Completion::Ready(RecordPtr {
                record: NonNull::from(record),
            }),
            true,
        );
    }
}

/// Points at a native record owned by a callback that is parked in `signal(true)`.
///
/// Only [`ResultSlot::deliver_record()`] creates these, and the only way to dereference one is
/// through a [`RecordRead`], which consumes it and accepts when dropped.
pub(crate) struct RecordPtr<R> {
    record: NonNull<R>,
}

// SAFETY: The pointer is only dereferenced by the waiting caller while the callback that owns the
// record is parked. The record itself is only read (never mutated) from the other thread, so it
// is enough for the record to be Sync.
unsafe impl<R: Sync> Send for RecordPtr<R> {}

impl<R> fmt::Debug for RecordPtr<R> {
    #[cfg_attr(test, mutants::skip)] // No API contract.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordPtr")
            .field("record", &self.record)
            .finish()
    }
}

/// A scoped read of a record handed out by a parked callback.
///
/// Holds the loop guard mutably for its whole lifetime, so the caller cannot `wait()` (and thus
/// cannot let the loop reclaim the record) while the read is alive. Dropping the read accepts,
/// including when the conversion panics.
pub(crate) struct RecordRead<'g, 'l, R> {
    guard: &'g mut LoopGuard<'l>,
    record: NonNull<R>,
    _record: PhantomData<&'g R>,
}

impl<'g, 'l, R> RecordRead<'g, 'l, R> {
    /// `record` must have been taken from a slot in the same caller's wait loop, without any
    /// `wait()` in between.
    pub(crate) fn new(guard: &'g mut LoopGuard<'l>, record: RecordPtr<R>) -> Self {
        debug_assert!(
            guard.is_accept_pending(),
            "a record can only be read while its callback is parked"
        );

        Self {
            guard,
            record: record.record,
            _record: PhantomData,
        }
    }

    pub(crate) fn record(&self) -> &R {
        // SAFETY: The callback that owns the record is parked in `signal(true)` until we accept,
        // and we cannot accept before `self` is dropped, which ends every borrow we hand out.
        unsafe { self.record.as_ref() }
    }
}

impl<R> Drop for RecordRead<'_, '_, R> {
    fn drop(&mut self) {
        self.guard.accept();
    }
}

impl<R> fmt::Debug for RecordRead<'_, '_, R> {
    #[cfg_attr(test, mutants::skip)] // No API contract.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordRead")
            .field("record", &self.record)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::panic::{self, AssertUnwindSafe};
    use std::sync::atomic::{AtomicBool, Ordering};

    use static_assertions::assert_impl_all;
    use testing::with_watchdog;

    use super::*;
    use crate::EventLoop;

    assert_impl_all!(ResultSlot<u32>: Send, Sync);
    assert_impl_all!(RecordPtr<String>: Send);

    #[cfg_attr(miri, ignore)]
    #[test]
    fn scalar_deposit_reaches_caller() {
        with_watchdog(|| {
            let event_loop = EventLoop::new();
            let slot = ResultSlot::<i32>::new();

            let mut guard = event_loop.lock();

            let slot_clone = Arc::clone(&slot);
            guard.defer(move |guard| {
                slot_clone.deposit(guard, Completion::Ready(1), false);
            });

            while slot.is_pending() {
                guard.wait();
            }

            assert!(matches!(slot.take(), Completion::Ready(1)));
            assert!(slot.is_pending());
        });
    }

    #[cfg_attr(miri, ignore)]
    #[test]
    fn record_stays_alive_until_read_is_dropped() {
        with_watchdog(|| {
            let event_loop = EventLoop::new();
            let slot = ResultSlot::<RecordPtr<String>>::new();
            let callback_returned = Arc::new(AtomicBool::new(false));

            let mut guard = event_loop.lock();

            let slot_clone = Arc::clone(&slot);
            let callback_returned_clone = Arc::clone(&callback_returned);
            guard.defer(move |guard| {
                let record = "front speakers".to_string();
                slot_clone.deliver_record(guard, &record);
                callback_returned_clone.store(true, Ordering::Relaxed);
            });

            while slot.is_pending() {
                guard.wait();
            }

            let Completion::Ready(record) = slot.take() else {
                panic!("expected a record");
            };

            let copy = {
                let read = RecordRead::new(&mut guard, record);
                assert!(!callback_returned.load(Ordering::Relaxed));
                read.record().clone()
            };

            assert_eq!(copy, "front speakers");
            assert!(!guard.is_accept_pending());
        });
    }

    #[cfg_attr(miri, ignore)]
    #[test]
    fn panicking_conversion_still_accepts() {
        with_watchdog(|| {
            let event_loop = EventLoop::new();
            let slot = ResultSlot::<RecordPtr<u64>>::new();

            let mut guard = event_loop.lock();

            let slot_clone = Arc::clone(&slot);
            guard.defer(move |guard| {
                slot_clone.deliver_record(guard, &7);
            });

            while slot.is_pending() {
                guard.wait();
            }

            let Completion::Ready(record) = slot.take() else {
                panic!("expected a record");
            };

            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                let read = RecordRead::new(&mut guard, record);
                assert_eq!(*read.record(), 7);
                panic!("conversion failure");
            }));

            assert!(result.is_err());
            assert!(!guard.is_accept_pending());
        });
    }

    #[cfg_attr(miri, ignore)]
    #[test]
    fn abandoned_slot_ignores_late_delivery() {
        with_watchdog(|| {
            let event_loop = EventLoop::new();
            let slot = ResultSlot::<RecordPtr<u64>>::new();
            let callback_returned = Arc::new(AtomicBool::new(false));

            slot.abandon();

            let mut guard = event_loop.lock();

            let slot_clone = Arc::clone(&slot);
            let callback_returned_clone = Arc::clone(&callback_returned);
            guard.defer(move |guard| {
                // Would park forever if the abandoned slot still waited for an accept.
                slot_clone.deliver_record(guard, &7);
                callback_returned_clone.store(true, Ordering::Relaxed);
                guard.signal(false);
            });

            while !callback_returned.load(Ordering::Relaxed) {
                guard.wait();
            }

            assert!(slot.is_pending());
            assert!(!guard.is_accept_pending());
        });
    }
}
