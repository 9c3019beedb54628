use std::ffi::CStr;

use crate::native::{
    CHANNELS_MAX, ChannelMapRecord, ChannelVolumesRecord, FormatInfoRecord, INVALID_INDEX,
    PortRecord, PropListRecord, SampleSpecRecord,
};
use crate::{Error, ErrorCode, Result};

pub(crate) fn text(value: Option<&CStr>) -> String {
    value
        .map(|value| value.to_string_lossy().into_owned())
        .unwrap_or_default()
}

pub(crate) fn optional_text(value: Option<&CStr>) -> Option<String> {
    value.map(|value| value.to_string_lossy().into_owned())
}

pub(crate) fn optional_index(value: u32) -> Option<u32> {
    (value != INVALID_INDEX).then_some(value)
}

pub(crate) fn flag(value: i32) -> bool {
    value != 0
}

/// Encoding of individual audio samples.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum SampleFormat {
    /// Unsigned 8 bit PCM.
    U8,
    /// 8 bit a-Law.
    Alaw,
    /// 8 bit mu-Law.
    Ulaw,
    /// Signed 16 bit PCM, little endian.
    S16Le,
    /// Signed 16 bit PCM, big endian.
    S16Be,
    /// 32 bit IEEE floating point, little endian, range -1.0 to 1.0.
    Float32Le,
    /// 32 bit IEEE floating point, big endian, range -1.0 to 1.0.
    Float32Be,
    /// Signed 32 bit PCM, little endian.
    S32Le,
    /// Signed 32 bit PCM, big endian.
    S32Be,
    /// Signed 24 bit PCM packed, little endian.
    S24Le,
    /// Signed 24 bit PCM packed, big endian.
    S24Be,
    /// Signed 24 bit PCM in LSB of 32 bit words, little endian.
    S24In32Le,
    /// Signed 24 bit PCM in LSB of 32 bit words, big endian.
    S24In32Be,
    /// No valid format.
    Invalid,
}

impl SampleFormat {
    fn from_raw(raw: i32) -> Self {
        match raw {
            0 => Self::U8,
            1 => Self::Alaw,
            2 => Self::Ulaw,
            3 => Self::S16Le,
            4 => Self::S16Be,
            5 => Self::Float32Le,
            6 => Self::Float32Be,
            7 => Self::S32Le,
            8 => Self::S32Be,
            9 => Self::S24Le,
            10 => Self::S24Be,
            11 => Self::S24In32Le,
            12 => Self::S24In32Be,
            _ => Self::Invalid,
        }
    }
}

/// Describes the layout of a raw audio stream.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub struct SampleSpec {
    /// Sample encoding.
    pub format: SampleFormat,

    /// Sample rate in Hz.
    pub rate: u32,

    /// Number of channels.
    pub channels: u8,
}

impl SampleSpec {
    /// Whether the format, rate and channel count describe a playable stream.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.format != SampleFormat::Invalid
            && self.rate > 0
            && self.channels > 0
            && usize::from(self.channels) <= CHANNELS_MAX
    }
}

impl From<&SampleSpecRecord> for SampleSpec {
    fn from(record: &SampleSpecRecord) -> Self {
        Self {
            format: SampleFormat::from_raw(record.format),
            rate: record.rate,
            channels: record.channels,
        }
    }
}

/// The speaker position a channel is meant for.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum ChannelPosition {
    /// The only channel of a mono stream.
    Mono,
    /// Front left.
    FrontLeft,
    /// Front right.
    FrontRight,
    /// Front center.
    FrontCenter,
    /// Rear center.
    RearCenter,
    /// Rear left.
    RearLeft,
    /// Rear right.
    RearRight,
    /// Low frequency effects.
    Lfe,
    /// Front left of center.
    FrontLeftOfCenter,
    /// Front right of center.
    FrontRightOfCenter,
    /// Side left.
    SideLeft,
    /// Side right.
    SideRight,
    /// Auxiliary channel with the given number (0 to 31).
    Aux(u8),
    /// Top center.
    TopCenter,
    /// Top front left.
    TopFrontLeft,
    /// Top front right.
    TopFrontRight,
    /// Top front center.
    TopFrontCenter,
    /// Top rear left.
    TopRearLeft,
    /// Top rear right.
    TopRearRight,
    /// Top rear center.
    TopRearCenter,
    /// Unknown position.
    Invalid,
}

impl ChannelPosition {
    const AUX_FIRST: i32 = 12;
    const AUX_LAST: i32 = 43;

    fn from_raw(raw: i32) -> Self {
        match raw {
            0 => Self::Mono,
            1 => Self::FrontLeft,
            2 => Self::FrontRight,
            3 => Self::FrontCenter,
            4 => Self::RearCenter,
            5 => Self::RearLeft,
            6 => Self::RearRight,
            7 => Self::Lfe,
            8 => Self::FrontLeftOfCenter,
            9 => Self::FrontRightOfCenter,
            10 => Self::SideLeft,
            11 => Self::SideRight,
            Self::AUX_FIRST..=Self::AUX_LAST => raw
                .checked_sub(Self::AUX_FIRST)
                .and_then(|aux| u8::try_from(aux).ok())
                .map_or(Self::Invalid, Self::Aux),
            44 => Self::TopCenter,
            45 => Self::TopFrontLeft,
            46 => Self::TopFrontRight,
            47 => Self::TopFrontCenter,
            48 => Self::TopRearLeft,
            49 => Self::TopRearRight,
            50 => Self::TopRearCenter,
            _ => Self::Invalid,
        }
    }
}

/// Assigns a speaker position to every channel of a stream.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub struct ChannelMap {
    /// One position per channel, in channel order.
    pub positions: Vec<ChannelPosition>,
}

impl From<&ChannelMapRecord> for ChannelMap {
    fn from(record: &ChannelMapRecord) -> Self {
        Self {
            positions: record
                .map
                .iter()
                .take(usize::from(record.channels))
                .map(|&raw| ChannelPosition::from_raw(raw))
                .collect(),
        }
    }
}

/// A volume level on the server's linear scale.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Volume(u32);

impl Volume {
    /// Silence.
    pub const MUTED: Self = Self(0);

    /// Unamplified volume (100%).
    pub const NORMAL: Self = Self(0x1_0000);

    /// Creates a volume from its raw value.
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// The raw value of the volume.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Per-channel volume of a device or stream.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub struct ChannelVolumes {
    /// One volume per channel, in channel order.
    pub values: Vec<Volume>,
}

impl ChannelVolumes {
    /// Creates a volume with one value per channel, in channel order.
    #[must_use]
    pub fn new(values: Vec<Volume>) -> Self {
        Self { values }
    }

    /// Creates a volume that sets every one of `channels` channels to `volume`.
    #[must_use]
    pub fn uniform(channels: u8, volume: Volume) -> Self {
        Self {
            values: vec![volume; usize::from(channels)],
        }
    }

    /// The loudest channel, or [`Volume::MUTED`] if there are no channels.
    #[must_use]
    pub fn max(&self) -> Volume {
        self.values.iter().copied().max().unwrap_or(Volume::MUTED)
    }

    /// Fails with [`ErrorCode::Invalid`] if there are more channels than the native library
    /// supports. Nothing is truncated.
    pub(crate) fn to_record(&self) -> Result<ChannelVolumesRecord> {
        let channels = u8::try_from(self.values.len())
            .ok()
            .filter(|&channels| usize::from(channels) <= CHANNELS_MAX)
            .ok_or(Error::OperationRejected {
                code: ErrorCode::Invalid,
            })?;

        let mut record = ChannelVolumesRecord {
            channels,
            ..ChannelVolumesRecord::default()
        };

        for (target, volume) in record.values.iter_mut().zip(&self.values) {
            *target = volume.raw();
        }

        Ok(record)
    }
}

impl From<&ChannelVolumesRecord> for ChannelVolumes {
    fn from(record: &ChannelVolumesRecord) -> Self {
        Self {
            values: record
                .values
                .iter()
                .take(usize::from(record.channels))
                .map(|&raw| Volume::new(raw))
                .collect(),
        }
    }
}

/// Free-form properties attached to a server object, in server order.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub struct PropList {
    /// Key/value pairs. Values that are not valid UTF-8 are converted lossily.
    pub entries: Vec<(String, String)>,
}

impl PropList {
    /// The value stored under `key`, if any.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(candidate, _)| candidate == key)
            .map(|(_, value)| value.as_str())
    }

    /// Whether the list has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<&PropListRecord> for PropList {
    fn from(record: &PropListRecord) -> Self {
        Self {
            entries: record
                .entries
                .iter()
                .map(|(key, value)| {
                    (
                        key.to_string_lossy().into_owned(),
                        // Native string values carry their terminating NUL.
                        String::from_utf8_lossy(
                            value.strip_suffix(&[0]).unwrap_or(value.as_slice()),
                        )
                        .into_owned(),
                    )
                })
                .collect(),
        }
    }
}

/// How the payload of a stream is encoded.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum Encoding {
    /// Any encoding is acceptable.
    Any,
    /// Plain PCM.
    Pcm,
    /// AC3 data encapsulated in IEC 61937.
    Ac3Iec61937,
    /// EAC3 data encapsulated in IEC 61937.
    Eac3Iec61937,
    /// MPEG-1 or MPEG-2 data encapsulated in IEC 61937.
    MpegIec61937,
    /// DTS data encapsulated in IEC 61937.
    DtsIec61937,
    /// MPEG-2 AAC data encapsulated in IEC 61937.
    Mpeg2AacIec61937,
    /// Dolby `TrueHD` data encapsulated in IEC 61937.
    TrueHdIec61937,
    /// DTS-HD Master Audio encapsulated in IEC 61937.
    DtsHdIec61937,
    /// Unknown encoding.
    Invalid,
}

impl Encoding {
    fn from_raw(raw: i32) -> Self {
        match raw {
            0 => Self::Any,
            1 => Self::Pcm,
            2 => Self::Ac3Iec61937,
            3 => Self::Eac3Iec61937,
            4 => Self::MpegIec61937,
            5 => Self::DtsIec61937,
            6 => Self::Mpeg2AacIec61937,
            7 => Self::TrueHdIec61937,
            8 => Self::DtsHdIec61937,
            _ => Self::Invalid,
        }
    }
}

/// A stream format: an encoding plus encoding-specific properties.
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub struct FormatInfo {
    /// The encoding.
    pub encoding: Encoding,

    /// Properties such as the sample rate or channel count.
    pub properties: PropList,
}

impl From<&FormatInfoRecord> for FormatInfo {
    fn from(record: &FormatInfoRecord) -> Self {
        Self {
            encoding: Encoding::from_raw(record.encoding),
            properties: PropList::from(&record.plist),
        }
    }
}

/// Whether something is plugged into a port.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum PortAvailability {
    /// The server cannot tell.
    Unknown,
    /// Nothing is plugged in.
    No,
    /// Something is plugged in.
    Yes,
}

impl PortAvailability {
    pub(crate) fn from_raw(raw: i32) -> Self {
        match raw {
            1 => Self::No,
            2 => Self::Yes,
            _ => Self::Unknown,
        }
    }
}

/// A port of a sink or source, such as speakers or headphones.
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub struct PortInfo {
    /// Name of the port.
    pub name: String,

    /// Human-readable description.
    pub description: String,

    /// Higher values are preferred.
    pub priority: u32,

    /// Whether something is plugged in.
    pub availability: PortAvailability,
}

impl From<&PortRecord> for PortInfo {
    fn from(record: &PortRecord) -> Self {
        Self {
            name: text(record.name.as_deref()),
            description: text(record.description.as_deref()),
            priority: record.priority,
            availability: PortAvailability::from_raw(record.available),
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::ffi::CString;

    use super::*;

    #[test]
    fn channel_map_takes_only_meaningful_entries() {
        let mut record = ChannelMapRecord {
            channels: 2,
            ..ChannelMapRecord::default()
        };
        record.map[0] = 1;
        record.map[1] = 2;
        record.map[2] = 7;

        let map = ChannelMap::from(&record);

        assert_eq!(
            map.positions,
            vec![ChannelPosition::FrontLeft, ChannelPosition::FrontRight]
        );
    }

    #[test]
    fn aux_positions_are_numbered_from_zero() {
        assert_eq!(ChannelPosition::from_raw(12), ChannelPosition::Aux(0));
        assert_eq!(ChannelPosition::from_raw(43), ChannelPosition::Aux(31));
        assert_eq!(ChannelPosition::from_raw(-1), ChannelPosition::Invalid);
    }

    #[test]
    fn volumes_beyond_native_limit_are_refused() {
        let volumes = ChannelVolumes::uniform(40, Volume::NORMAL);

        assert!(matches!(
            volumes.to_record(),
            Err(Error::OperationRejected {
                code: ErrorCode::Invalid
            })
        ));
    }

    #[test]
    fn volumes_at_native_limit_are_kept() {
        let volumes = ChannelVolumes::uniform(32, Volume::NORMAL);

        let record = volumes.to_record().unwrap();

        assert_eq!(usize::from(record.channels), CHANNELS_MAX);
        assert!(record.values.iter().all(|&raw| raw == Volume::NORMAL.raw()));
    }

    #[test]
    fn volume_record_conversion_keeps_channel_order() {
        let volumes = ChannelVolumes {
            values: vec![Volume::new(10), Volume::new(20)],
        };

        let converted = ChannelVolumes::from(&volumes.to_record().unwrap());

        assert_eq!(converted, volumes);
        assert_eq!(converted.max(), Volume::new(20));
    }

    #[test]
    fn proplist_values_lose_terminator() {
        let record = PropListRecord {
            entries: vec![(
                CString::new("device.description").unwrap(),
                b"Speakers\0".to_vec(),
            )],
        };

        let list = PropList::from(&record);

        assert_eq!(list.get("device.description"), Some("Speakers"));
        assert_eq!(list.get("missing"), None);
    }

    #[test]
    fn missing_text_becomes_empty() {
        assert_eq!(text(None), "");
        assert_eq!(optional_text(None), None);
        assert_eq!(optional_index(INVALID_INDEX), None);
        assert_eq!(optional_index(3), Some(3));
    }

    #[test]
    fn sample_spec_validity() {
        let valid = SampleSpec::from(&SampleSpecRecord {
            format: 3,
            rate: 44_100,
            channels: 2,
        });
        let invalid = SampleSpec::from(&SampleSpecRecord::default());

        assert!(valid.is_valid());
        assert_eq!(valid.format, SampleFormat::S16Le);
        assert!(!invalid.is_valid());
    }
}
