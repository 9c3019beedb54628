//! The generic blocking bridge: issue a native request, wait for its callback, read the result,
//! accept, release.
//!
//! One template exists per callback shape. Every [`Context`][crate::Context] operation is a thin
//! wrapper that picks a template and supplies the native entry point to call.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, trace, warn};

use crate::metrics::{
    LIST_LENGTH, OPERATION_DURATION_MS, OPERATIONS_ISSUED, OPERATIONS_REJECTED,
    WAITS_PER_OPERATION,
};
use crate::native::{
    INVALID_INDEX, IndexCallback, InfoCallback, ListEntry, NativeContext, ServerInfoCallback,
    ServerRecord, SuccessCallback,
};
use crate::slot::{Completion, RecordPtr, RecordRead, ResultSlot};
use crate::{Error, ErrorCode, LoopGuard, Operation, OperationState, Result};

/// Success code reported by the native library for a successful mutation.
const SUCCESS: i32 = 1;

/// A completed delivery, as seen by the waiting caller.
enum Delivery<T> {
    Ready(T),
    End,
    Failed,
}

/// Exclusive access to one native connection for the duration of one operation.
///
/// A session exists only while both the context lock and the loop lock are held, which is what
/// serializes operations per context and keeps the loop thread out while the caller is not
/// waiting.
#[derive(Debug)]
pub(crate) struct Session<'s, 'l> {
    native: &'s dyn NativeContext,
    guard: &'s mut LoopGuard<'l>,
    operation: &'static str,
    timeout: Option<Duration>,
    // Set when the operation is issued and shared by every wait of that operation.
    deadline: Option<Instant>,
    timed_out: bool,
}

impl<'s, 'l> Session<'s, 'l> {
    pub(crate) fn new(
        native: &'s dyn NativeContext,
        guard: &'s mut LoopGuard<'l>,
        operation: &'static str,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            native,
            guard,
            operation,
            timeout,
            deadline: None,
            timed_out: false,
        }
    }

    /// Whether an operation in this session gave up waiting. The context must not be used for
    /// further operations afterwards because a late callback may still arrive.
    pub(crate) fn timed_out(&self) -> bool {
        self.timed_out
    }

    /// Fetches the server information record.
    pub(crate) fn fetch_server_record<V>(
        &mut self,
        issue: impl FnOnce(
            &dyn NativeContext,
            &mut LoopGuard<'l>,
            ServerInfoCallback,
        ) -> Option<Operation>,
    ) -> Result<V>
    where
        V: for<'r> From<&'r ServerRecord>,
    {
        let started = Instant::now();
        let slot = ResultSlot::<RecordPtr<ServerRecord>>::new();

        let callback: ServerInfoCallback = {
            let slot = Arc::clone(&slot);
            Box::new(move |guard, record| match record {
                Some(record) => slot.deliver_record(guard, record),
                None => slot.deposit(guard, Completion::Failed, false),
            })
        };

        let operation = self.issue(|native, guard| issue(native, guard, callback))?;
        let mut waits = 0;

        let result = match self.await_delivery(&operation, &slot, &mut waits)? {
            Delivery::Ready(record) => Ok(V::from(RecordRead::new(self.guard, record).record())),
            Delivery::End | Delivery::Failed => Err(self.operation_failed()),
        };

        self.finish(operation, started, waits);
        result
    }

    /// Fetches a single record through the list callback shape.
    ///
    /// A lookup that finds nothing is `Ok(None)`. After the record, the trailing end marker of
    /// the same operation is drained so that the native bookkeeping for this operation is
    /// complete before the next operation on the context starts. The request is issued once.
    pub(crate) fn fetch_record<R, V>(
        &mut self,
        issue: impl FnOnce(
            &dyn NativeContext,
            &mut LoopGuard<'l>,
            InfoCallback<R>,
        ) -> Option<Operation>,
    ) -> Result<Option<V>>
    where
        R: Sync + 'static,
        V: for<'r> From<&'r R>,
    {
        let started = Instant::now();
        let slot = ResultSlot::<RecordPtr<R>>::new();
        let callback = info_callback(&slot);

        let operation = self.issue(|native, guard| issue(native, guard, callback))?;
        let mut waits = 0;

        let value = match self.await_delivery(&operation, &slot, &mut waits)? {
            Delivery::Ready(record) => V::from(RecordRead::new(self.guard, record).record()),
            Delivery::End => {
                self.finish(operation, started, waits);
                return Ok(None);
            }
            Delivery::Failed => {
                let code = self.native.last_error(self.guard);
                self.finish(operation, started, waits);

                return if code == ErrorCode::NoEntity {
                    Ok(None)
                } else {
                    Err(Error::OperationFailed { code })
                };
            }
        };

        self.drain_end(&operation, &slot, &mut waits)?;

        self.finish(operation, started, waits);
        Ok(Some(value))
    }

    /// Fetches every record of a list, in delivery order.
    ///
    /// Any failure before the end marker is an error; a truncated list is never returned.
    pub(crate) fn fetch_list<R, V>(
        &mut self,
        issue: impl FnOnce(
            &dyn NativeContext,
            &mut LoopGuard<'l>,
            InfoCallback<R>,
        ) -> Option<Operation>,
    ) -> Result<Vec<V>>
    where
        R: Sync + 'static,
        V: for<'r> From<&'r R>,
    {
        let started = Instant::now();
        let slot = ResultSlot::<RecordPtr<R>>::new();
        let callback = info_callback(&slot);

        let operation = self.issue(|native, guard| issue(native, guard, callback))?;
        let mut waits = 0;
        let mut values = Vec::new();

        loop {
            match self.await_delivery(&operation, &slot, &mut waits)? {
                Delivery::Ready(record) => {
                    values.push(V::from(RecordRead::new(self.guard, record).record()));
                }
                Delivery::End => break,
                Delivery::Failed => {
                    let error = self.operation_failed();
                    debug!(
                        operation = self.operation,
                        received = values.len(),
                        "list enumeration failed midway"
                    );
                    self.finish(operation, started, waits);
                    return Err(error);
                }
            }
        }

        LIST_LENGTH.with(|event| event.observe(values.len()));

        self.finish(operation, started, waits);
        Ok(values)
    }

    /// Runs a mutation that reports a success code.
    pub(crate) fn mutate(
        &mut self,
        issue: impl FnOnce(
            &dyn NativeContext,
            &mut LoopGuard<'l>,
            SuccessCallback,
        ) -> Option<Operation>,
    ) -> Result<()> {
        let started = Instant::now();
        let slot = ResultSlot::<i32>::new();

        let callback: SuccessCallback = {
            let slot = Arc::clone(&slot);
            Box::new(move |guard, success| {
                slot.deposit(guard, Completion::Ready(success), false);
            })
        };

        let operation = self.issue(|native, guard| issue(native, guard, callback))?;
        let mut waits = 0;

        let result = match self.await_delivery(&operation, &slot, &mut waits)? {
            Delivery::Ready(SUCCESS) => Ok(()),
            Delivery::Ready(_) | Delivery::End | Delivery::Failed => Err(self.operation_failed()),
        };

        self.finish(operation, started, waits);
        result
    }

    /// Runs a mutation that reports the index of a created object.
    pub(crate) fn fetch_index(
        &mut self,
        issue: impl FnOnce(
            &dyn NativeContext,
            &mut LoopGuard<'l>,
            IndexCallback,
        ) -> Option<Operation>,
    ) -> Result<u32> {
        let started = Instant::now();
        let slot = ResultSlot::<u32>::new();

        let callback: IndexCallback = {
            let slot = Arc::clone(&slot);
            Box::new(move |guard, index| {
                slot.deposit(guard, Completion::Ready(index), false);
            })
        };

        let operation = self.issue(|native, guard| issue(native, guard, callback))?;
        let mut waits = 0;

        let result = match self.await_delivery(&operation, &slot, &mut waits)? {
            Delivery::Ready(index) if index != INVALID_INDEX => Ok(index),
            Delivery::Ready(_) | Delivery::End | Delivery::Failed => Err(self.operation_failed()),
        };

        self.finish(operation, started, waits);
        result
    }

    fn issue(
        &mut self,
        issue: impl FnOnce(&dyn NativeContext, &mut LoopGuard<'l>) -> Option<Operation>,
    ) -> Result<Operation> {
        OPERATIONS_ISSUED.with(nm::Event::observe_once);

        // A timeout too large to represent is no timeout at all.
        self.deadline = self
            .timeout
            .and_then(|timeout| Instant::now().checked_add(timeout));

        if let Some(operation) = issue(self.native, self.guard) {
            trace!(operation = self.operation, "operation issued");
            return Ok(operation);
        }

        // No operation means no callback will ever run, so there is nothing to wait for.
        OPERATIONS_REJECTED.with(nm::Event::observe_once);
        let code = self.native.last_error(self.guard);
        debug!(operation = self.operation, %code, "operation rejected");

        Err(Error::OperationRejected { code })
    }

    /// Waits until the slot holds a delivery, or until it is certain that none will come.
    ///
    /// The wait is only re-entered while the operation is still running and the slot is still
    /// pending. A callback that has already run and a callback that will never run both end the
    /// loop. Every wait of one operation counts against the same deadline, so a server that
    /// trickles list records cannot stretch the operation past its timeout.
    fn await_delivery<T>(
        &mut self,
        operation: &Operation,
        slot: &ResultSlot<T>,
        waits: &mut usize,
    ) -> Result<Delivery<T>> {
        loop {
            match slot.take() {
                Completion::Ready(value) => return Ok(Delivery::Ready(value)),
                Completion::EndOfSequence => return Ok(Delivery::End),
                Completion::Failed => return Ok(Delivery::Failed),
                Completion::Pending => {}
            }

            match operation.state() {
                OperationState::Running => {}
                OperationState::Cancelled => {
                    slot.abandon();
                    debug!(operation = self.operation, "operation cancelled");
                    return Err(Error::OperationCancelled);
                }
                OperationState::Done => {
                    slot.abandon();
                    error!(
                        operation = self.operation,
                        "operation completed without delivering a result"
                    );
                    return Err(Error::ProtocolViolation {
                        operation: self.operation,
                    });
                }
            }

            if self.guard.is_stopped() {
                slot.abandon();
                debug!(operation = self.operation, "event loop stopped during operation");
                return Err(Error::LoopStopped);
            }

            *waits = waits.saturating_add(1);

            match self.deadline {
                None => self.guard.wait(),
                Some(deadline) => {
                    // A delivery may have raced the deadline; only give up if there is none.
                    let timed_out = self.guard.wait_until(deadline);

                    if timed_out && slot.is_pending() && operation.is_running() {
                        slot.abandon();
                        self.timed_out = true;
                        warn!(
                            operation = self.operation,
                            timeout = ?self.timeout,
                            "operation timed out, abandoning context"
                        );
                        return Err(Error::TimedOut);
                    }
                }
            }
        }
    }

    /// Waits for the end marker that follows the record of a single-record lookup.
    fn drain_end<R>(
        &mut self,
        operation: &Operation,
        slot: &ResultSlot<RecordPtr<R>>,
        waits: &mut usize,
    ) -> Result<()> {
        loop {
            match self.await_delivery(operation, slot, waits) {
                Ok(Delivery::End) => return Ok(()),
                Ok(Delivery::Ready(record)) => {
                    // More than one match is not expected; accept and keep draining.
                    drop(RecordRead::new(self.guard, record));
                    warn!(
                        operation = self.operation,
                        "lookup delivered more than one record"
                    );
                }
                Ok(Delivery::Failed) | Err(Error::OperationCancelled) => {
                    // The record is already in hand and no further callback will run for this
                    // operation, so the next operation is not affected.
                    debug!(
                        operation = self.operation,
                        "lookup ended without an end marker"
                    );
                    return Ok(());
                }
                Err(error) => return Err(error),
            }
        }
    }

    fn operation_failed(&self) -> Error {
        let code = self.native.last_error(self.guard);
        debug!(operation = self.operation, %code, "operation failed");

        Error::OperationFailed { code }
    }

    fn finish(&self, operation: Operation, started: Instant, waits: usize) {
        operation.release();

        OPERATION_DURATION_MS.with(|event| event.observe_millis(started.elapsed()));
        WAITS_PER_OPERATION.with(|event| event.observe(waits));

        trace!(operation = self.operation, waits, "operation finished");
    }
}

fn info_callback<R>(slot: &Arc<ResultSlot<RecordPtr<R>>>) -> InfoCallback<R>
where
    R: Sync + 'static,
{
    let slot = Arc::clone(slot);

    Box::new(move |guard, entry| match entry {
        ListEntry::Item(record) => slot.deliver_record(guard, record),
        ListEntry::End => slot.deposit(guard, Completion::EndOfSequence, false),
        ListEntry::Failed => slot.deposit(guard, Completion::Failed, false),
    })
}
