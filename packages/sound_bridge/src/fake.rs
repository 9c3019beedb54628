//! An in-process sound server for testing.
//!
//! [`FakeServer`] implements [`Backend`][crate::native::Backend] on top of the event loop it is
//! used with: requests are answered by work queued on the loop thread, exactly the way the native
//! client library answers them from its own event source. No sound server needs to be running.
//!
//! # Basic usage
//!
//! ```
//! use sound_bridge::fake::FakeServer;
//! use sound_bridge::{Context, EventLoop};
//!
//! let event_loop = EventLoop::new();
//! let server = FakeServer::builder()
//!     .sink("speakers")
//!     .sink("headphones")
//!     .build();
//!
//! let context = Context::builder(&event_loop, server).build();
//! context.connect(None)?;
//!
//! let sinks = context.sink_info_list()?;
//! assert_eq!(sinks.len(), 2);
//! assert_eq!(sinks[0].name, "speakers");
//! # Ok::<(), sound_bridge::Error>(())
//! ```
//!
//! # Fault injection
//!
//! The server can be told to misbehave in the ways a real server or a flaky connection does:
//! refusing a request, failing connection attempts, losing the connection in the middle of a
//! list, refusing mutations or never answering at all.
//!
//! ```
//! use sound_bridge::fake::FakeServer;
//! use sound_bridge::{Context, Error, ErrorCode, EventLoop};
//!
//! let event_loop = EventLoop::new();
//! let server = FakeServer::builder().sink("speakers").build();
//!
//! let context = Context::builder(&event_loop, server.clone()).build();
//! context.connect(None)?;
//!
//! server.fail_mutations(ErrorCode::Access);
//!
//! let result = context.set_sink_mute("speakers", true);
//! assert!(matches!(
//!     result,
//!     Err(Error::OperationFailed { code: ErrorCode::Access })
//! ));
//! # Ok::<(), sound_bridge::Error>(())
//! ```
//!
//! # Isolation
//!
//! Every [`FakeServer`] is independent. Clones share one server, so a test can keep a clone for
//! fault injection and inspection after handing another to a context.

mod builder;
mod catalog;
mod native;
mod server;

pub use builder::FakeServerBuilder;
pub use server::FakeServer;
