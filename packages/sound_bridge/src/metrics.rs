//! Metrics for the bridge between callers and the event loop.
//!
//! Events are per-thread instances, recorded by the caller threads that run bridged operations.

use nm::{Event, Magnitude};

/// Histogram buckets for operation duration in milliseconds.
///
/// Measured from issuing the native request until the result has been converted. A local server
/// answers in well under a millisecond; anything in the upper buckets points at a slow or stalled
/// server.
const OPERATION_DURATION_MS_BUCKETS: &[Magnitude] = &[0, 1, 2, 5, 10, 20, 50, 100, 500, 1000, 5000];

/// Histogram buckets for the number of times a caller blocked in `wait()` during one operation.
const WAITS_PER_OPERATION_BUCKETS: &[Magnitude] = &[0, 1, 2, 3, 5, 10, 20, 50, 100];

/// Histogram buckets for the number of records returned by list operations.
const LIST_LENGTH_BUCKETS: &[Magnitude] = &[0, 1, 2, 4, 8, 16, 32, 64, 128];

thread_local! {
    /// Counts native requests issued through the bridge, including rejected ones.
    pub(crate) static OPERATIONS_ISSUED: Event = Event::builder()
        .name("sound_bridge_operations_issued")
        .build();

    /// Counts native requests that the native library refused to start.
    pub(crate) static OPERATIONS_REJECTED: Event = Event::builder()
        .name("sound_bridge_operations_rejected")
        .build();

    /// The magnitude is the duration of one bridged operation in milliseconds.
    pub(crate) static OPERATION_DURATION_MS: Event = Event::builder()
        .name("sound_bridge_operation_duration_ms")
        .histogram(OPERATION_DURATION_MS_BUCKETS)
        .build();

    /// The magnitude is how many times the caller waited for the loop during one operation.
    pub(crate) static WAITS_PER_OPERATION: Event = Event::builder()
        .name("sound_bridge_waits_per_operation")
        .histogram(WAITS_PER_OPERATION_BUCKETS)
        .build();

    /// The magnitude is the number of records a list operation returned.
    pub(crate) static LIST_LENGTH: Event = Event::builder()
        .name("sound_bridge_list_length")
        .histogram(LIST_LENGTH_BUCKETS)
        .build();
}
