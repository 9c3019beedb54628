use crate::info::common::{flag, optional_index, text};
use crate::info::{PortAvailability, PropList};
use crate::native::{CardPortRecord, CardProfileRecord, CardRecord};

/// A configuration a card can be switched to.
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub struct CardProfileInfo {
    /// Name of the profile.
    pub name: String,

    /// Human-readable description.
    pub description: String,

    /// Number of sinks this profile would create.
    pub sinks: u32,

    /// Number of sources this profile would create.
    pub sources: u32,

    /// Higher values are preferred.
    pub priority: u32,

    /// Whether the profile can currently be activated.
    pub available: bool,
}

impl From<&CardProfileRecord> for CardProfileInfo {
    fn from(record: &CardProfileRecord) -> Self {
        Self {
            name: text(record.name.as_deref()),
            description: text(record.description.as_deref()),
            sinks: record.n_sinks,
            sources: record.n_sources,
            priority: record.priority,
            available: flag(record.available),
        }
    }
}

/// Whether a card port carries audio out of or into the computer.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum PortDirection {
    /// Playback.
    Output,

    /// Capture.
    Input,

    /// Both playback and capture.
    Duplex,

    /// The server reported no direction.
    Unknown,
}

impl PortDirection {
    const OUTPUT: i32 = 0x1;
    const INPUT: i32 = 0x2;

    fn from_raw(raw: i32) -> Self {
        match ((raw & Self::OUTPUT) != 0, (raw & Self::INPUT) != 0) {
            (true, true) => Self::Duplex,
            (true, false) => Self::Output,
            (false, true) => Self::Input,
            (false, false) => Self::Unknown,
        }
    }
}

/// A physical connector on a card.
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub struct CardPortInfo {
    /// Name of the port.
    pub name: String,

    /// Human-readable description.
    pub description: String,

    /// Higher values are preferred.
    pub priority: u32,

    /// Whether something is plugged in.
    pub availability: PortAvailability,

    /// Direction of the port.
    pub direction: PortDirection,

    /// Free-form properties.
    pub properties: PropList,

    /// Latency offset of the port, in microseconds.
    pub latency_offset_usec: i64,

    /// Names of the card profiles this port is part of.
    pub profiles: Vec<String>,
}

impl CardPortInfo {
    fn from_record(record: &CardPortRecord, profiles: &[CardProfileInfo]) -> Self {
        Self {
            name: text(record.name.as_deref()),
            description: text(record.description.as_deref()),
            priority: record.priority,
            availability: PortAvailability::from_raw(record.available),
            direction: PortDirection::from_raw(record.direction),
            properties: PropList::from(&record.proplist),
            latency_offset_usec: record.latency_offset,
            profiles: record
                .profiles
                .iter()
                .filter_map(|&position| profiles.get(position))
                .map(|profile| profile.name.clone())
                .collect(),
        }
    }
}

/// A sound card.
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub struct CardInfo {
    /// Index of the card.
    pub index: u32,

    /// Unique name of the card.
    pub name: String,

    /// Index of the owning module, if any.
    pub owner_module: Option<u32>,

    /// Driver name.
    pub driver: String,

    /// Profiles the card supports.
    pub profiles: Vec<CardProfileInfo>,

    /// The active profile, if any.
    pub active_profile: Option<CardProfileInfo>,

    /// Free-form properties.
    pub properties: PropList,

    /// Ports of the card.
    pub ports: Vec<CardPortInfo>,
}

impl From<&CardRecord> for CardInfo {
    fn from(record: &CardRecord) -> Self {
        let profiles: Vec<CardProfileInfo> =
            record.profiles.iter().map(CardProfileInfo::from).collect();
        let active_profile = record
            .active_profile
            .and_then(|position| profiles.get(position))
            .cloned();
        let ports = record
            .ports
            .iter()
            .map(|port| CardPortInfo::from_record(port, &profiles))
            .collect();

        Self {
            index: record.index,
            name: text(record.name.as_deref()),
            owner_module: optional_index(record.owner_module),
            driver: text(record.driver.as_deref()),
            profiles,
            active_profile,
            properties: PropList::from(&record.proplist),
            ports,
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::ffi::CString;

    use super::*;

    fn profile(name: &str) -> CardProfileRecord {
        CardProfileRecord {
            name: Some(CString::new(name).unwrap()),
            available: 1,
            ..CardProfileRecord::default()
        }
    }

    #[test]
    fn port_profiles_resolve_to_names() {
        let record = CardRecord {
            name: Some(CString::new("pci-card").unwrap()),
            profiles: vec![profile("output:stereo"), profile("off")],
            active_profile: Some(0),
            ports: vec![CardPortRecord {
                name: Some(CString::new("analog-output").unwrap()),
                direction: 1,
                latency_offset: -250,
                profiles: vec![0, 7],
                ..CardPortRecord::default()
            }],
            ..CardRecord::default()
        };

        let info = CardInfo::from(&record);

        assert_eq!(info.profiles.len(), 2);
        assert_eq!(info.active_profile.unwrap().name, "output:stereo");

        let port = info.ports.first().unwrap();
        assert_eq!(port.direction, PortDirection::Output);
        assert_eq!(port.latency_offset_usec, -250);
        assert_eq!(port.profiles, vec!["output:stereo".to_string()]);
    }

    #[test]
    fn direction_bits_combine() {
        assert_eq!(PortDirection::from_raw(3), PortDirection::Duplex);
        assert_eq!(PortDirection::from_raw(2), PortDirection::Input);
        assert_eq!(PortDirection::from_raw(0), PortDirection::Unknown);
    }
}
