//! The boundary with the native sound server client library.
//!
//! The native library is an external collaborator: it owns the connection, schedules work on the
//! event loop and reports results exclusively through callbacks that run on the loop thread. This
//! module describes that boundary as Rust traits so that any implementation can be plugged in
//! behind [`Context`][crate::Context]. The crate ships one implementation, the in-process
//! [`FakeServer`][crate::fake::FakeServer].
//!
//! Every entry point takes the loop guard as a parameter, which makes it impossible to call the
//! native library without holding the loop lock.

mod abstractions;
mod records;

pub use abstractions::*;
pub use records::*;
