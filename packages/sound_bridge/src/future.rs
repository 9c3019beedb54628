//! Awaitable wrappers around the blocking operations.

use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::task::{self, Poll};
use std::thread;

use tracing::warn;

use crate::event_loop::format_panic_payload;

type Outcome<T> = thread::Result<T>;

/// The result of a blocking operation running on a helper thread, as a future.
///
/// Awaiting it returns the closure's return value. If the closure panicked, awaiting re-throws
/// the panic. If the future is dropped without being awaited, the operation still runs to
/// completion and a panic, if any, is logged and discarded.
///
/// # Panics
///
/// Awaiting panics if the operation panicked, or if it is polled again after completion.
#[derive(Debug)]
pub struct OperationFuture<T>
where
    T: Send + 'static,
{
    receiver: Option<oneshot::Receiver<Outcome<T>>>,
}

impl<T> OperationFuture<T>
where
    T: Send + 'static,
{
    /// Runs `operation` on a new thread named `thread_name` and returns a future for its result.
    ///
    /// The thread is not reused. It exits once `operation` returns.
    pub(crate) fn spawn<F>(thread_name: String, operation: F) -> Self
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let (sender, receiver) = oneshot::channel();

        thread::Builder::new()
            .name(thread_name)
            .spawn(move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(operation));

                // The receiver is gone if nobody cares about the result any more.
                drop(sender.send(outcome));
            })
            .expect("failed to spawn operation thread: thread spawning failure is not supported");

        Self {
            receiver: Some(receiver),
        }
    }
}

impl<T> Future for OperationFuture<T>
where
    T: Send + 'static,
{
    type Output = T;

    fn poll(mut self: Pin<&mut Self>, cx: &mut task::Context<'_>) -> Poll<Self::Output> {
        let receiver = self
            .receiver
            .as_mut()
            .expect("OperationFuture polled after completion");

        match Pin::new(receiver).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(result) => {
                self.receiver = None;

                match result {
                    Ok(Ok(value)) => Poll::Ready(value),
                    Ok(Err(payload)) => panic::resume_unwind(payload),
                    Err(_disconnected) => {
                        // The thread catches every panic and always sends, so this only happens
                        // if the thread was killed from the outside.
                        panic!("operation thread exited without reporting a result");
                    }
                }
            }
        }
    }
}

impl<T> Drop for OperationFuture<T>
where
    T: Send + 'static,
{
    fn drop(&mut self) {
        let Some(receiver) = self.receiver.take() else {
            return;
        };

        // Still running or finished successfully: nothing worth reporting.
        if let Ok(Err(payload)) = receiver.try_recv() {
            warn!(
                panic_message = %format_panic_payload(&*payload),
                "operation panicked but its future was dropped without being awaited"
            );
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use futures::executor::block_on;
    use static_assertions::assert_impl_all;
    use testing::with_watchdog;

    use super::*;

    assert_impl_all!(OperationFuture<u32>: Send, Unpin);

    #[cfg_attr(miri, ignore)]
    #[test]
    fn resolves_to_operation_result() {
        with_watchdog(|| {
            let future = OperationFuture::spawn("test-operation".to_string(), || 42);

            assert_eq!(block_on(future), 42);
        });
    }

    #[cfg_attr(miri, ignore)]
    #[test]
    fn each_operation_gets_its_own_named_thread() {
        with_watchdog(|| {
            let current = || {
                let thread = thread::current();
                (thread.id(), thread.name().map(str::to_string))
            };

            let first = block_on(OperationFuture::spawn("mixer-operation".to_string(), current));
            let second = block_on(OperationFuture::spawn("mixer-operation".to_string(), current));

            assert_eq!(first.1.as_deref(), Some("mixer-operation"));
            assert_ne!(first.0, second.0);
            assert_ne!(first.0, thread::current().id());
        });
    }

    #[cfg_attr(miri, ignore)]
    #[test]
    fn operation_panic_is_rethrown_on_await() {
        with_watchdog(|| {
            let future = OperationFuture::spawn("test-operation".to_string(), || -> u32 {
                panic!("operation failure");
            });

            let result = panic::catch_unwind(AssertUnwindSafe(|| block_on(future)));

            assert!(result.is_err());
        });
    }

    #[cfg_attr(miri, ignore)]
    #[test]
    fn dropping_unawaited_future_is_harmless() {
        with_watchdog(|| {
            let future = OperationFuture::spawn("test-operation".to_string(), || -> u32 {
                panic!("nobody is listening");
            });

            drop(future);
        });
    }
}
