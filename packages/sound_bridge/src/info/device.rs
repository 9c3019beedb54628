use crate::info::common::{flag, optional_index, optional_text, text};
use crate::info::{ChannelMap, ChannelVolumes, FormatInfo, PortInfo, PropList, SampleSpec, Volume};
use crate::native::{SinkRecord, SourceRecord};

/// Run state of a sink or source.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum DeviceState {
    /// Playing or recording, with at least one stream attached.
    Running,

    /// Not in use, but not suspended either.
    Idle,

    /// Suspended, with the underlying device closed.
    Suspended,

    /// The server reported a state this client does not know.
    Invalid,
}

impl DeviceState {
    fn from_raw(raw: i32) -> Self {
        match raw {
            0 => Self::Running,
            1 => Self::Idle,
            2 => Self::Suspended,
            _ => Self::Invalid,
        }
    }
}

/// An audio output device.
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub struct SinkInfo {
    /// Unique name of the sink.
    pub name: String,

    /// Index of the sink.
    pub index: u32,

    /// Human-readable description.
    pub description: String,

    /// Sample specification.
    pub sample_spec: SampleSpec,

    /// Channel map.
    pub channel_map: ChannelMap,

    /// Index of the owning module, if any.
    pub owner_module: Option<u32>,

    /// Per-channel volume.
    pub volume: ChannelVolumes,

    /// Whether the sink is muted.
    pub mute: bool,

    /// Index of the monitor source.
    pub monitor_source: u32,

    /// Name of the monitor source.
    pub monitor_source_name: String,

    /// Length of queued audio in the output buffer, in microseconds.
    pub latency_usec: u64,

    /// Driver name.
    pub driver: String,

    /// Raw sink flags.
    pub flags: u32,

    /// Free-form properties.
    pub properties: PropList,

    /// The latency this device has been configured to, in microseconds.
    pub configured_latency_usec: u64,

    /// Base volume of the device.
    pub base_volume: Volume,

    /// Run state.
    pub state: DeviceState,

    /// Number of volume steps for sinks without flat volume.
    pub volume_steps: u32,

    /// Index of the owning card, if any.
    pub card: Option<u32>,

    /// Available ports.
    pub ports: Vec<PortInfo>,

    /// The active port, if the sink has ports.
    pub active_port: Option<PortInfo>,

    /// Supported formats.
    pub formats: Vec<FormatInfo>,
}

impl From<&SinkRecord> for SinkInfo {
    fn from(record: &SinkRecord) -> Self {
        let ports: Vec<PortInfo> = record.ports.iter().map(PortInfo::from).collect();
        let active_port = record
            .active_port
            .and_then(|position| ports.get(position))
            .cloned();

        Self {
            name: text(record.name.as_deref()),
            index: record.index,
            description: text(record.description.as_deref()),
            sample_spec: SampleSpec::from(&record.sample_spec),
            channel_map: ChannelMap::from(&record.channel_map),
            owner_module: optional_index(record.owner_module),
            volume: ChannelVolumes::from(&record.volume),
            mute: flag(record.mute),
            monitor_source: record.monitor_source,
            monitor_source_name: text(record.monitor_source_name.as_deref()),
            latency_usec: record.latency,
            driver: text(record.driver.as_deref()),
            flags: record.flags,
            properties: PropList::from(&record.proplist),
            configured_latency_usec: record.configured_latency,
            base_volume: Volume::new(record.base_volume),
            state: DeviceState::from_raw(record.state),
            volume_steps: record.n_volume_steps,
            card: optional_index(record.card),
            ports,
            active_port,
            formats: record.formats.iter().map(FormatInfo::from).collect(),
        }
    }
}

/// An audio input device.
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub struct SourceInfo {
    /// Unique name of the source.
    pub name: String,

    /// Index of the source.
    pub index: u32,

    /// Human-readable description.
    pub description: String,

    /// Sample specification.
    pub sample_spec: SampleSpec,

    /// Channel map.
    pub channel_map: ChannelMap,

    /// Index of the owning module, if any.
    pub owner_module: Option<u32>,

    /// Per-channel volume.
    pub volume: ChannelVolumes,

    /// Whether the source is muted.
    pub mute: bool,

    /// Index of the sink this source monitors, if it is a monitor source.
    pub monitor_of_sink: Option<u32>,

    /// Name of the sink this source monitors, if it is a monitor source.
    pub monitor_of_sink_name: Option<String>,

    /// Length of filled record buffer, in microseconds.
    pub latency_usec: u64,

    /// Driver name.
    pub driver: String,

    /// Raw source flags.
    pub flags: u32,

    /// Free-form properties.
    pub properties: PropList,

    /// The latency this device has been configured to, in microseconds.
    pub configured_latency_usec: u64,

    /// Base volume of the device.
    pub base_volume: Volume,

    /// Run state.
    pub state: DeviceState,

    /// Number of volume steps for sources without flat volume.
    pub volume_steps: u32,

    /// Index of the owning card, if any.
    pub card: Option<u32>,

    /// Available ports.
    pub ports: Vec<PortInfo>,

    /// The active port, if the source has ports.
    pub active_port: Option<PortInfo>,

    /// Supported formats.
    pub formats: Vec<FormatInfo>,
}

impl From<&SourceRecord> for SourceInfo {
    fn from(record: &SourceRecord) -> Self {
        let ports: Vec<PortInfo> = record.ports.iter().map(PortInfo::from).collect();
        let active_port = record
            .active_port
            .and_then(|position| ports.get(position))
            .cloned();

        Self {
            name: text(record.name.as_deref()),
            index: record.index,
            description: text(record.description.as_deref()),
            sample_spec: SampleSpec::from(&record.sample_spec),
            channel_map: ChannelMap::from(&record.channel_map),
            owner_module: optional_index(record.owner_module),
            volume: ChannelVolumes::from(&record.volume),
            mute: flag(record.mute),
            monitor_of_sink: optional_index(record.monitor_of_sink),
            monitor_of_sink_name: optional_text(record.monitor_of_sink_name.as_deref()),
            latency_usec: record.latency,
            driver: text(record.driver.as_deref()),
            flags: record.flags,
            properties: PropList::from(&record.proplist),
            configured_latency_usec: record.configured_latency,
            base_volume: Volume::new(record.base_volume),
            state: DeviceState::from_raw(record.state),
            volume_steps: record.n_volume_steps,
            card: optional_index(record.card),
            ports,
            active_port,
            formats: record.formats.iter().map(FormatInfo::from).collect(),
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::ffi::CString;

    use super::*;
    use crate::info::PortAvailability;
    use crate::native::{INVALID_INDEX, PortRecord};

    #[test]
    fn sink_active_port_resolves_by_position() {
        let record = SinkRecord {
            name: Some(CString::new("speakers").unwrap()),
            owner_module: INVALID_INDEX,
            card: 4,
            ports: vec![
                PortRecord {
                    name: Some(CString::new("analog-output").unwrap()),
                    available: 2,
                    ..PortRecord::default()
                },
                PortRecord {
                    name: Some(CString::new("headphones").unwrap()),
                    available: 1,
                    ..PortRecord::default()
                },
            ],
            active_port: Some(1),
            ..SinkRecord::default()
        };

        let info = SinkInfo::from(&record);

        assert_eq!(info.name, "speakers");
        assert_eq!(info.owner_module, None);
        assert_eq!(info.card, Some(4));
        assert_eq!(info.ports.len(), 2);

        let active_port = info.active_port.unwrap();
        assert_eq!(active_port.name, "headphones");
        assert_eq!(active_port.availability, PortAvailability::No);
    }

    #[test]
    fn out_of_range_active_port_is_ignored() {
        let record = SourceRecord {
            active_port: Some(3),
            ..SourceRecord::default()
        };

        let info = SourceInfo::from(&record);

        assert_eq!(info.active_port, None);
    }

    #[test]
    fn monitor_source_knows_its_sink() {
        let record = SourceRecord {
            monitor_of_sink: 2,
            monitor_of_sink_name: Some(CString::new("speakers").unwrap()),
            state: 2,
            mute: 1,
            ..SourceRecord::default()
        };

        let info = SourceInfo::from(&record);

        assert_eq!(info.monitor_of_sink, Some(2));
        assert_eq!(info.monitor_of_sink_name.as_deref(), Some("speakers"));
        assert_eq!(info.state, DeviceState::Suspended);
        assert!(info.mute);
    }
}
