#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Blocking and awaitable access to a callback-driven sound server client.
//!
//! The native client library of a sound server does all its work on one event loop thread and
//! reports every result through a callback that runs on that thread. The data a callback receives
//! is only valid until the callback returns. This crate turns that model into plain method calls
//! that can be made from any thread:
//!
//! ```rust
//! use sound_bridge::fake::FakeServer;
//! use sound_bridge::{Context, EventLoop};
//!
//! let event_loop = EventLoop::new();
//! let server = FakeServer::builder()
//!     .sink("speakers")
//!     .source("microphone")
//!     .build();
//!
//! let context = Context::builder(&event_loop, server).name("mixer").build();
//! context.connect(None)?;
//!
//! let info = context.server_info()?;
//! println!("connected to {} {}", info.server_name, info.server_version);
//!
//! for sink in context.sink_info_list()? {
//!     println!("sink #{}: {}", sink.index, sink.description);
//! }
//!
//! assert!(context.sink_info_by_name("nonexistent")?.is_none());
//! # Ok::<(), sound_bridge::Error>(())
//! ```
//!
//! # How it works
//!
//! An [`EventLoop`] owns the dedicated loop thread. Each call on a [`Context`] takes the context's
//! own lock (one operation per connection at a time) and then the loop lock, issues the native
//! request with a callback bound to a result slot that exists only for this call, and blocks in
//! [`LoopGuard::wait()`] until the callback has filled the slot. A callback that hands out a
//! native record stays parked until the caller has copied the record into an owned value, so the
//! library never frees data that is still being read. List operations repeat this for every
//! record and return the complete list once the end marker has arrived.
//!
//! The values returned by [`Context`] operations (see [`info`]) are owned snapshots with no link to
//! native memory.
//!
//! # Async
//!
//! Every blocking operation has an awaitable form through [`Context::spawn()`], which runs the
//! operation on a helper thread and returns an [`OperationFuture`]:
//!
//! ```rust
//! # use sound_bridge::fake::FakeServer;
//! # use sound_bridge::{Context, EventLoop};
//! # let event_loop = EventLoop::new();
//! # let context = Context::builder(&event_loop, FakeServer::builder().sink("speakers").build())
//! #     .build();
//! # futures::executor::block_on(async {
//! context.connect_async(None).await?;
//! let sinks = context.spawn(|context| context.sink_info_list()).await?;
//! assert_eq!(sinks.len(), 1);
//! # Ok::<(), sound_bridge::Error>(())
//! # })?;
//! # Ok::<(), sound_bridge::Error>(())
//! ```
//!
//! # Native libraries
//!
//! The bridge talks to the native library through the [`native::Backend`] and
//! [`native::NativeContext`] traits. The [`fake`] module provides an in-process implementation
//! that needs no running sound server and can inject faults, for testing code built on this
//! crate.
//!
//! # Errors
//!
//! Every operation returns [`Result`]. A lookup that finds nothing is not an error: it returns
//! `Ok(None)`. See [`Error`] for the failure categories.

mod context;
mod error;
mod event_loop;
pub mod fake;
mod future;
pub mod info;
mod metrics;
pub mod native;
mod operation;
mod session;
mod slot;

pub use context::*;
pub use error::*;
pub use event_loop::{EventLoop, EventLoopBuilder, LoopGuard, LoopHandle};
pub use future::*;
pub use operation::*;
