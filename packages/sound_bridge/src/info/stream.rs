use crate::info::common::{flag, optional_index, text};
use crate::info::{ChannelMap, ChannelVolumes, FormatInfo, PropList, SampleSpec};
use crate::native::{SinkInputRecord, SourceOutputRecord};

/// A playback stream connected to a sink.
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub struct SinkInputInfo {
    /// Index of the sink input.
    pub index: u32,

    /// Name of the stream.
    pub name: String,

    /// Index of the owning module, if any.
    pub owner_module: Option<u32>,

    /// Index of the owning client, if any.
    pub client: Option<u32>,

    /// Index of the sink the stream plays to.
    pub sink: u32,

    /// Sample specification.
    pub sample_spec: SampleSpec,

    /// Channel map.
    pub channel_map: ChannelMap,

    /// Per-channel volume.
    pub volume: ChannelVolumes,

    /// Latency due to buffering in the stream, in microseconds.
    pub buffer_usec: u64,

    /// Latency of the sink, in microseconds.
    pub sink_usec: u64,

    /// Name of the resampling method.
    pub resample_method: String,

    /// Driver name.
    pub driver: String,

    /// Whether the stream is muted.
    pub mute: bool,

    /// Free-form properties.
    pub properties: PropList,

    /// Whether the stream is corked (paused).
    pub corked: bool,

    /// Whether the stream has a volume at all.
    pub has_volume: bool,

    /// Whether clients may change the volume.
    pub volume_writable: bool,

    /// Stream format.
    pub format: FormatInfo,
}

impl From<&SinkInputRecord> for SinkInputInfo {
    fn from(record: &SinkInputRecord) -> Self {
        Self {
            index: record.index,
            name: text(record.name.as_deref()),
            owner_module: optional_index(record.owner_module),
            client: optional_index(record.client),
            sink: record.sink,
            sample_spec: SampleSpec::from(&record.sample_spec),
            channel_map: ChannelMap::from(&record.channel_map),
            volume: ChannelVolumes::from(&record.volume),
            buffer_usec: record.buffer_usec,
            sink_usec: record.sink_usec,
            resample_method: text(record.resample_method.as_deref()),
            driver: text(record.driver.as_deref()),
            mute: flag(record.mute),
            properties: PropList::from(&record.proplist),
            corked: flag(record.corked),
            has_volume: flag(record.has_volume),
            volume_writable: flag(record.volume_writable),
            format: FormatInfo::from(&record.format),
        }
    }
}

/// A recording stream connected to a source.
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub struct SourceOutputInfo {
    /// Index of the source output.
    pub index: u32,

    /// Name of the stream.
    pub name: String,

    /// Index of the owning module, if any.
    pub owner_module: Option<u32>,

    /// Index of the owning client, if any.
    pub client: Option<u32>,

    /// Index of the source the stream records from.
    pub source: u32,

    /// Sample specification.
    pub sample_spec: SampleSpec,

    /// Channel map.
    pub channel_map: ChannelMap,

    /// Latency due to buffering in the stream, in microseconds.
    pub buffer_usec: u64,

    /// Latency of the source, in microseconds.
    pub source_usec: u64,

    /// Name of the resampling method.
    pub resample_method: String,

    /// Driver name.
    pub driver: String,

    /// Free-form properties.
    pub properties: PropList,

    /// Whether the stream is corked (paused).
    pub corked: bool,

    /// Per-channel volume.
    pub volume: ChannelVolumes,

    /// Whether the stream is muted.
    pub mute: bool,

    /// Whether the stream has a volume at all.
    pub has_volume: bool,

    /// Whether clients may change the volume.
    pub volume_writable: bool,

    /// Stream format.
    pub format: FormatInfo,
}

impl From<&SourceOutputRecord> for SourceOutputInfo {
    fn from(record: &SourceOutputRecord) -> Self {
        Self {
            index: record.index,
            name: text(record.name.as_deref()),
            owner_module: optional_index(record.owner_module),
            client: optional_index(record.client),
            source: record.source,
            sample_spec: SampleSpec::from(&record.sample_spec),
            channel_map: ChannelMap::from(&record.channel_map),
            buffer_usec: record.buffer_usec,
            source_usec: record.source_usec,
            resample_method: text(record.resample_method.as_deref()),
            driver: text(record.driver.as_deref()),
            properties: PropList::from(&record.proplist),
            corked: flag(record.corked),
            volume: ChannelVolumes::from(&record.volume),
            mute: flag(record.mute),
            has_volume: flag(record.has_volume),
            volume_writable: flag(record.volume_writable),
            format: FormatInfo::from(&record.format),
        }
    }
}
