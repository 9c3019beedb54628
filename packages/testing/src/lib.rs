#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(coverage_nightly, coverage(off))] // This is all test code, no need to test it.

//! Private helpers for testing `sound_bridge`.

use std::panic;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

/// Runs `test_fn` on a separate thread and panics if it does not finish within the timeout.
///
/// A bridge that is stuck in a loop wait shows up as a test that never returns, which is far
/// harder to diagnose than a panic naming the hang.
///
/// The timeout is 10 seconds, or 60 seconds under Miri.
///
/// Set `MUTATION_TESTING=1` to run the test directly instead, so that mutations which introduce
/// hangs are detected as such.
///
/// # Panics
///
/// Panics if the test exceeds the timeout, and re-raises any panic of the test itself.
///
/// # Example
///
/// ```rust
/// use testing::with_watchdog;
///
/// let answer = with_watchdog(|| 2 + 2);
/// assert_eq!(answer, 4);
/// ```
pub fn with_watchdog<F, R>(test_fn: F) -> R
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    if std::env::var("MUTATION_TESTING").as_deref() == Ok("1") {
        return test_fn();
    }

    let (tx, rx) = mpsc::channel();

    let test_thread = thread::spawn(move || {
        // If the receiver is gone, the watchdog already fired.
        drop(tx.send(test_fn()));
    });

    let timeout = watchdog_timeout();

    match rx.recv_timeout(timeout) {
        Ok(result) => {
            test_thread
                .join()
                .expect("test thread delivered its result so it cannot have panicked");
            result
        }
        Err(mpsc::RecvTimeoutError::Timeout) => {
            panic!("test exceeded {timeout:?}: the bridge is probably hung waiting on its loop");
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => match test_thread.join() {
            Ok(()) => panic!("test thread exited without delivering a result"),
            Err(payload) => panic::resume_unwind(payload),
        },
    }
}

/// Polls `condition` until it holds.
///
/// For effects that complete on the event loop thread after the caller has already returned,
/// such as a late reply releasing its operation. Call from inside [`with_watchdog()`] so that a
/// condition that never holds fails the test instead of hanging it.
///
/// # Panics
///
/// Panics if `condition` still does not hold after the watchdog timeout.
pub fn eventually(mut condition: impl FnMut() -> bool) {
    let started = Instant::now();

    while !condition() {
        assert!(
            started.elapsed() < watchdog_timeout(),
            "condition did not hold within {:?}",
            watchdog_timeout()
        );

        thread::sleep(Duration::from_millis(1));
    }
}

fn watchdog_timeout() -> Duration {
    // Thread synchronization is dramatically slower under Miri.
    if cfg!(miri) {
        Duration::from_secs(60)
    } else {
        Duration::from_secs(10)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn watchdog_returns_result() {
        assert_eq!(with_watchdog(|| "hello"), "hello");
    }

    #[test]
    #[should_panic]
    fn watchdog_forwards_panic() {
        with_watchdog(|| panic!("inner"));
    }

    #[test]
    fn eventually_waits_for_condition() {
        let counter = Arc::new(AtomicUsize::new(0));

        let counter_clone = Arc::clone(&counter);
        let worker = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            counter_clone.store(1, Ordering::Relaxed);
        });

        eventually(|| counter.load(Ordering::Relaxed) == 1);

        worker.join().unwrap();
    }
}
