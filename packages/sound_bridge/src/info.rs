//! Owned value objects copied out of native records.
//!
//! Every type here is an immutable snapshot with no link to native memory. They are produced by
//! the [`Context`][crate::Context] operations and can be kept for as long as the caller likes.

mod card;
mod client;
pub(crate) mod common;
mod device;
mod module;
mod server;
mod stream;

pub use card::*;
pub use client::*;
pub use common::{
    ChannelMap, ChannelPosition, ChannelVolumes, Encoding, FormatInfo, PortAvailability, PortInfo,
    PropList, SampleFormat, SampleSpec, Volume,
};
pub use device::*;
pub use module::*;
pub use server::*;
pub use stream::*;
