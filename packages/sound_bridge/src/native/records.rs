//! Transient records in the shape the native library delivers them.
//!
//! Strings are nullable C strings, booleans are integers and references to other objects are
//! indexes. A record is only valid during the callback that receives it; the bridge copies it
//! into an owned value from [`crate::info`] before letting the callback return.

#![expect(
    clippy::exhaustive_structs,
    reason = "records mirror the native structures field for field"
)]

use std::ffi::CString;

/// Maximum number of channels a native record can describe.
pub const CHANNELS_MAX: usize = 32;

/// Native sample specification.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SampleSpecRecord {
    /// Raw sample format code.
    pub format: i32,

    /// Sample rate in Hz.
    pub rate: u32,

    /// Number of channels.
    pub channels: u8,
}

/// Native channel map. Only the first `channels` entries of `map` are meaningful.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ChannelMapRecord {
    /// Number of meaningful entries in `map`.
    pub channels: u8,

    /// Raw channel position codes.
    pub map: [i32; CHANNELS_MAX],
}

/// Native per-channel volume. Only the first `channels` entries of `values` are meaningful.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ChannelVolumesRecord {
    /// Number of meaningful entries in `values`.
    pub channels: u8,

    /// Raw volume values.
    pub values: [u32; CHANNELS_MAX],
}

/// Native property list: ordered key/value pairs whose values are arbitrary bytes.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PropListRecord {
    /// The entries, in insertion order.
    pub entries: Vec<(CString, Vec<u8>)>,
}

/// Native stream format description.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FormatInfoRecord {
    /// Raw encoding code.
    pub encoding: i32,

    /// Encoding-specific properties.
    pub plist: PropListRecord,
}

/// Native description of a sink or source port.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PortRecord {
    /// Name of the port.
    pub name: Option<CString>,

    /// Human-readable description.
    pub description: Option<CString>,

    /// Higher values are preferred.
    pub priority: u32,

    /// Raw availability code.
    pub available: i32,
}

/// Native server information.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ServerRecord {
    /// User the server runs as.
    pub user_name: Option<CString>,

    /// Host the server runs on.
    pub host_name: Option<CString>,

    /// Version string of the server.
    pub server_version: Option<CString>,

    /// Name of the server package.
    pub server_name: Option<CString>,

    /// Default sample specification.
    pub sample_spec: SampleSpecRecord,

    /// Name of the default sink.
    pub default_sink_name: Option<CString>,

    /// Name of the default source.
    pub default_source_name: Option<CString>,

    /// Random cookie identifying this server instance.
    pub cookie: u32,

    /// Default channel map.
    pub channel_map: ChannelMapRecord,
}

/// Native sink information.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SinkRecord {
    /// Name of the sink.
    pub name: Option<CString>,

    /// Index of the sink.
    pub index: u32,

    /// Human-readable description.
    pub description: Option<CString>,

    /// Sample specification of the sink.
    pub sample_spec: SampleSpecRecord,

    /// Channel map of the sink.
    pub channel_map: ChannelMapRecord,

    /// Index of the owning module, or the invalid index.
    pub owner_module: u32,

    /// Volume of the sink.
    pub volume: ChannelVolumesRecord,

    /// Non-zero when muted.
    pub mute: i32,

    /// Index of the monitor source.
    pub monitor_source: u32,

    /// Name of the monitor source.
    pub monitor_source_name: Option<CString>,

    /// Length of queued audio in the output buffer, in microseconds.
    pub latency: u64,

    /// Driver name.
    pub driver: Option<CString>,

    /// Raw sink flags.
    pub flags: u32,

    /// Property list.
    pub proplist: PropListRecord,

    /// The latency this device has been configured to, in microseconds.
    pub configured_latency: u64,

    /// Base volume of the device.
    pub base_volume: u32,

    /// Raw sink state code.
    pub state: i32,

    /// Number of volume steps for sinks without flat volume.
    pub n_volume_steps: u32,

    /// Index of the owning card, or the invalid index.
    pub card: u32,

    /// Available ports.
    pub ports: Vec<PortRecord>,

    /// Position of the active port in `ports`.
    pub active_port: Option<usize>,

    /// Supported formats.
    pub formats: Vec<FormatInfoRecord>,
}

/// Native source information.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SourceRecord {
    /// Name of the source.
    pub name: Option<CString>,

    /// Index of the source.
    pub index: u32,

    /// Human-readable description.
    pub description: Option<CString>,

    /// Sample specification of the source.
    pub sample_spec: SampleSpecRecord,

    /// Channel map of the source.
    pub channel_map: ChannelMapRecord,

    /// Index of the owning module, or the invalid index.
    pub owner_module: u32,

    /// Volume of the source.
    pub volume: ChannelVolumesRecord,

    /// Non-zero when muted.
    pub mute: i32,

    /// Index of the sink this source monitors, or the invalid index.
    pub monitor_of_sink: u32,

    /// Name of the sink this source monitors.
    pub monitor_of_sink_name: Option<CString>,

    /// Length of filled record buffer, in microseconds.
    pub latency: u64,

    /// Driver name.
    pub driver: Option<CString>,

    /// Raw source flags.
    pub flags: u32,

    /// Property list.
    pub proplist: PropListRecord,

    /// The latency this device has been configured to, in microseconds.
    pub configured_latency: u64,

    /// Base volume of the device.
    pub base_volume: u32,

    /// Raw source state code.
    pub state: i32,

    /// Number of volume steps for sources without flat volume.
    pub n_volume_steps: u32,

    /// Index of the owning card, or the invalid index.
    pub card: u32,

    /// Available ports.
    pub ports: Vec<PortRecord>,

    /// Position of the active port in `ports`.
    pub active_port: Option<usize>,

    /// Supported formats.
    pub formats: Vec<FormatInfoRecord>,
}

/// Native sink input (playback stream) information.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SinkInputRecord {
    /// Index of the sink input.
    pub index: u32,

    /// Name of the sink input.
    pub name: Option<CString>,

    /// Index of the owning module, or the invalid index.
    pub owner_module: u32,

    /// Index of the owning client, or the invalid index.
    pub client: u32,

    /// Index of the connected sink.
    pub sink: u32,

    /// Sample specification of the stream.
    pub sample_spec: SampleSpecRecord,

    /// Channel map of the stream.
    pub channel_map: ChannelMapRecord,

    /// Volume of the stream.
    pub volume: ChannelVolumesRecord,

    /// Latency due to buffering in the stream, in microseconds.
    pub buffer_usec: u64,

    /// Latency of the connected sink, in microseconds.
    pub sink_usec: u64,

    /// Name of the resampling method.
    pub resample_method: Option<CString>,

    /// Driver name.
    pub driver: Option<CString>,

    /// Non-zero when muted.
    pub mute: i32,

    /// Property list.
    pub proplist: PropListRecord,

    /// Non-zero when the stream is corked.
    pub corked: i32,

    /// Non-zero when the stream has a volume.
    pub has_volume: i32,

    /// Non-zero when the volume can be set by clients.
    pub volume_writable: i32,

    /// Stream format.
    pub format: FormatInfoRecord,
}

/// Native source output (recording stream) information.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SourceOutputRecord {
    /// Index of the source output.
    pub index: u32,

    /// Name of the source output.
    pub name: Option<CString>,

    /// Index of the owning module, or the invalid index.
    pub owner_module: u32,

    /// Index of the owning client, or the invalid index.
    pub client: u32,

    /// Index of the connected source.
    pub source: u32,

    /// Sample specification of the stream.
    pub sample_spec: SampleSpecRecord,

    /// Channel map of the stream.
    pub channel_map: ChannelMapRecord,

    /// Latency due to buffering in the stream, in microseconds.
    pub buffer_usec: u64,

    /// Latency of the connected source, in microseconds.
    pub source_usec: u64,

    /// Name of the resampling method.
    pub resample_method: Option<CString>,

    /// Driver name.
    pub driver: Option<CString>,

    /// Property list.
    pub proplist: PropListRecord,

    /// Non-zero when the stream is corked.
    pub corked: i32,

    /// Volume of the stream.
    pub volume: ChannelVolumesRecord,

    /// Non-zero when muted.
    pub mute: i32,

    /// Non-zero when the stream has a volume.
    pub has_volume: i32,

    /// Non-zero when the volume can be set by clients.
    pub volume_writable: i32,

    /// Stream format.
    pub format: FormatInfoRecord,
}

/// Native module information.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ModuleRecord {
    /// Index of the module.
    pub index: u32,

    /// Name of the module.
    pub name: Option<CString>,

    /// Argument string the module was loaded with.
    pub argument: Option<CString>,

    /// Usage counter, or the invalid index.
    pub n_used: u32,

    /// Property list.
    pub proplist: PropListRecord,
}

/// Native client information.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ClientRecord {
    /// Index of the client.
    pub index: u32,

    /// Name of the client.
    pub name: Option<CString>,

    /// Index of the owning module, or the invalid index.
    pub owner_module: u32,

    /// Driver name.
    pub driver: Option<CString>,

    /// Property list.
    pub proplist: PropListRecord,
}

/// Native card profile information.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CardProfileRecord {
    /// Name of the profile.
    pub name: Option<CString>,

    /// Human-readable description.
    pub description: Option<CString>,

    /// Number of sinks this profile would create.
    pub n_sinks: u32,

    /// Number of sources this profile would create.
    pub n_sources: u32,

    /// Higher values are preferred.
    pub priority: u32,

    /// Non-zero when the profile is available.
    pub available: i32,
}

/// Native card port information.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CardPortRecord {
    /// Name of the port.
    pub name: Option<CString>,

    /// Human-readable description.
    pub description: Option<CString>,

    /// Higher values are preferred.
    pub priority: u32,

    /// Raw availability code.
    pub available: i32,

    /// Raw direction bit mask.
    pub direction: i32,

    /// Property list.
    pub proplist: PropListRecord,

    /// Latency offset of the port, in microseconds.
    pub latency_offset: i64,

    /// Positions in the card's profile list of the profiles this port belongs to.
    pub profiles: Vec<usize>,
}

/// Native card information.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CardRecord {
    /// Index of the card.
    pub index: u32,

    /// Name of the card.
    pub name: Option<CString>,

    /// Index of the owning module, or the invalid index.
    pub owner_module: u32,

    /// Driver name.
    pub driver: Option<CString>,

    /// Available profiles.
    pub profiles: Vec<CardProfileRecord>,

    /// Position of the active profile in `profiles`.
    pub active_profile: Option<usize>,

    /// Property list.
    pub proplist: PropListRecord,

    /// Ports of the card.
    pub ports: Vec<CardPortRecord>,
}
