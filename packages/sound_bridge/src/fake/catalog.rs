//! The objects a fake server knows about, kept as native records.

use std::ffi::{CStr, CString};

use crate::native::{
    CHANNELS_MAX, CardPortRecord, CardProfileRecord, CardRecord, ChannelMapRecord,
    ChannelVolumesRecord, ClientRecord, FormatInfoRecord, INVALID_INDEX, ModuleRecord,
    PortRecord, PropListRecord, SampleSpecRecord, Selector, ServerRecord, SinkInputRecord,
    SinkRecord, SourceOutputRecord, SourceRecord,
};

const FORMAT_S16LE: i32 = 3;
const POSITION_FRONT_LEFT: i32 = 1;
const POSITION_FRONT_RIGHT: i32 = 2;
const VOLUME_NORMAL: u32 = 0x10000;
const VOLUME_STEPS: u32 = 0x10001;

pub(crate) const STATE_IDLE: i32 = 1;
pub(crate) const STATE_SUSPENDED: i32 = 2;

const AVAILABLE_NO: i32 = 1;
const AVAILABLE_YES: i32 = 2;
const DIRECTION_OUTPUT: i32 = 0x1;
const ENCODING_PCM: i32 = 1;

const DRIVER: &str = "fake-server";

/// Everything the server reports, in the order it reports it.
#[derive(Clone, Debug, Default)]
pub(crate) struct Catalog {
    pub(crate) server: ServerRecord,
    pub(crate) sinks: Vec<SinkRecord>,
    pub(crate) sources: Vec<SourceRecord>,
    pub(crate) sink_inputs: Vec<SinkInputRecord>,
    pub(crate) source_outputs: Vec<SourceOutputRecord>,
    pub(crate) modules: Vec<ModuleRecord>,
    pub(crate) clients: Vec<ClientRecord>,
    pub(crate) cards: Vec<CardRecord>,

    next_module_index: u32,
    next_client_index: u32,
}

impl Catalog {
    /// An empty catalog for a server described by `server`.
    pub(crate) fn with_server(server: ServerRecord) -> Self {
        Self {
            server,
            ..Self::default()
        }
    }

    pub(crate) fn add_module(&mut self, name: &str, argument: &str) -> u32 {
        let index = allocate(&mut self.next_module_index);
        self.modules.push(module_record(index, name, argument));
        index
    }

    pub(crate) fn remove_module(&mut self, index: u32) -> bool {
        remove_by_index(&mut self.modules, index, |module| module.index)
    }

    pub(crate) fn add_client(&mut self, name: &str) -> u32 {
        let index = allocate(&mut self.next_client_index);
        self.clients.push(client_record(index, name));
        index
    }

    pub(crate) fn remove_client(&mut self, index: u32) -> bool {
        remove_by_index(&mut self.clients, index, |client| client.index)
    }

    /// The index the next sink added through the builder receives.
    pub(crate) fn next_sink_index(&self) -> u32 {
        next_index(self.sinks.iter().map(|sink| sink.index))
    }

    pub(crate) fn next_source_index(&self) -> u32 {
        next_index(self.sources.iter().map(|source| source.index))
    }

    pub(crate) fn next_card_index(&self) -> u32 {
        next_index(self.cards.iter().map(|card| card.index))
    }

    pub(crate) fn next_stream_index(&self) -> u32 {
        next_index(
            self.sink_inputs
                .iter()
                .map(|input| input.index)
                .chain(self.source_outputs.iter().map(|output| output.index)),
        )
    }
}

/// An owned [`Selector`], for matching after the borrowed one is gone.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum Key {
    Index(u32),
    Name(String),
}

impl Key {
    fn matches(&self, index: u32, name: Option<&CStr>) -> bool {
        match self {
            Self::Index(wanted) => *wanted == index,
            Self::Name(wanted) => name.is_some_and(|name| name.to_bytes() == wanted.as_bytes()),
        }
    }
}

impl From<Selector<'_>> for Key {
    fn from(selector: Selector<'_>) -> Self {
        match selector {
            Selector::Index(index) => Self::Index(index),
            Selector::Name(name) => Self::Name(name.to_string()),
        }
    }
}

/// Records that can be addressed by index or by name.
pub(crate) trait Addressable {
    fn index(&self) -> u32;
    fn name(&self) -> Option<&CStr>;
}

macro_rules! addressable {
    ($($record:ty),*) => {
        $(
            impl Addressable for $record {
                fn index(&self) -> u32 {
                    self.index
                }

                fn name(&self) -> Option<&CStr> {
                    self.name.as_deref()
                }
            }
        )*
    };
}

addressable!(
    SinkRecord,
    SourceRecord,
    SinkInputRecord,
    SourceOutputRecord,
    ModuleRecord,
    ClientRecord,
    CardRecord
);

pub(crate) fn find<'a, R: Addressable>(records: &'a [R], key: &Key) -> Option<&'a R> {
    records
        .iter()
        .find(|record| key.matches(record.index(), record.name()))
}

pub(crate) fn find_mut<'a, R: Addressable>(records: &'a mut [R], key: &Key) -> Option<&'a mut R> {
    records
        .iter_mut()
        .find(|record| key.matches(record.index(), record.name()))
}

/// Position of the entry called `name`, for port and profile lists.
pub(crate) fn position_by_name<T>(
    entries: &[T],
    name: &str,
    entry_name: impl Fn(&T) -> Option<&CStr>,
) -> Option<usize> {
    entries.iter().position(|entry| {
        entry_name(entry).is_some_and(|entry_name| entry_name.to_bytes() == name.as_bytes())
    })
}

fn allocate(next: &mut u32) -> u32 {
    let index = *next;
    *next = next.wrapping_add(1);
    index
}

fn next_index(indexes: impl Iterator<Item = u32>) -> u32 {
    indexes.max().map_or(0, |index| index.wrapping_add(1))
}

fn remove_by_index<R>(records: &mut Vec<R>, index: u32, index_of: impl Fn(&R) -> u32) -> bool {
    let before = records.len();
    records.retain(|record| index_of(record) != index);
    records.len() != before
}

/// A C string, or `None` if `value` contains a NUL byte.
pub(crate) fn c_string(value: &str) -> Option<CString> {
    CString::new(value).ok()
}

fn properties(entries: &[(&str, &str)]) -> PropListRecord {
    PropListRecord {
        entries: entries
            .iter()
            .filter_map(|&(key, value)| {
                let key = CString::new(key).ok()?;

                // String properties travel with their terminating NUL.
                let value = CString::new(value).ok()?.into_bytes_with_nul();

                Some((key, value))
            })
            .collect(),
    }
}

pub(crate) fn stereo_spec() -> SampleSpecRecord {
    SampleSpecRecord {
        format: FORMAT_S16LE,
        rate: 44_100,
        channels: 2,
    }
}

pub(crate) fn stereo_map() -> ChannelMapRecord {
    let mut map = [0; CHANNELS_MAX];
    let [left, right, ..] = &mut map;
    *left = POSITION_FRONT_LEFT;
    *right = POSITION_FRONT_RIGHT;

    ChannelMapRecord { channels: 2, map }
}

fn stereo_volume() -> ChannelVolumesRecord {
    ChannelVolumesRecord {
        channels: 2,
        values: [VOLUME_NORMAL; CHANNELS_MAX],
    }
}

fn pcm_format() -> FormatInfoRecord {
    FormatInfoRecord {
        encoding: ENCODING_PCM,
        plist: PropListRecord::default(),
    }
}

fn port(name: &str, description: &str, priority: u32, available: i32) -> PortRecord {
    PortRecord {
        name: c_string(name),
        description: c_string(description),
        priority,
        available,
    }
}

pub(crate) fn server_record() -> ServerRecord {
    ServerRecord {
        user_name: c_string("listener"),
        host_name: c_string("localhost"),
        server_version: c_string("17.0"),
        server_name: c_string("fake-server"),
        sample_spec: stereo_spec(),
        default_sink_name: None,
        default_source_name: None,
        cookie: 0x5eed_cafe,
        channel_map: stereo_map(),
    }
}

pub(crate) fn sink_record(index: u32, name: &str) -> SinkRecord {
    SinkRecord {
        name: c_string(name),
        index,
        description: c_string(name),
        sample_spec: stereo_spec(),
        channel_map: stereo_map(),
        owner_module: INVALID_INDEX,
        volume: stereo_volume(),
        mute: 0,
        monitor_source: INVALID_INDEX,
        monitor_source_name: None,
        latency: 0,
        driver: c_string(DRIVER),
        flags: 0,
        proplist: properties(&[("device.description", name)]),
        configured_latency: 0,
        base_volume: VOLUME_NORMAL,
        state: STATE_IDLE,
        n_volume_steps: VOLUME_STEPS,
        card: INVALID_INDEX,
        ports: vec![
            port("analog-output", "Analog Output", 9900, AVAILABLE_YES),
            port("headphones", "Headphones", 9000, AVAILABLE_NO),
        ],
        active_port: Some(0),
        formats: vec![pcm_format()],
    }
}

pub(crate) fn source_record(index: u32, name: &str) -> SourceRecord {
    SourceRecord {
        name: c_string(name),
        index,
        description: c_string(name),
        sample_spec: stereo_spec(),
        channel_map: stereo_map(),
        owner_module: INVALID_INDEX,
        volume: stereo_volume(),
        mute: 0,
        monitor_of_sink: INVALID_INDEX,
        monitor_of_sink_name: None,
        latency: 0,
        driver: c_string(DRIVER),
        flags: 0,
        proplist: properties(&[("device.description", name)]),
        configured_latency: 0,
        base_volume: VOLUME_NORMAL,
        state: STATE_IDLE,
        n_volume_steps: VOLUME_STEPS,
        card: INVALID_INDEX,
        ports: vec![
            port("analog-input", "Analog Input", 9900, AVAILABLE_YES),
            port("microphone", "Microphone", 8700, AVAILABLE_NO),
        ],
        active_port: Some(0),
        formats: vec![pcm_format()],
    }
}

pub(crate) fn sink_input_record(index: u32, name: &str, sink: u32) -> SinkInputRecord {
    SinkInputRecord {
        index,
        name: c_string(name),
        owner_module: INVALID_INDEX,
        client: INVALID_INDEX,
        sink,
        sample_spec: stereo_spec(),
        channel_map: stereo_map(),
        volume: stereo_volume(),
        resample_method: c_string("speex-float-1"),
        driver: c_string(DRIVER),
        proplist: properties(&[("media.name", name)]),
        has_volume: 1,
        volume_writable: 1,
        format: pcm_format(),
        ..SinkInputRecord::default()
    }
}

pub(crate) fn source_output_record(index: u32, name: &str, source: u32) -> SourceOutputRecord {
    SourceOutputRecord {
        index,
        name: c_string(name),
        owner_module: INVALID_INDEX,
        client: INVALID_INDEX,
        source,
        sample_spec: stereo_spec(),
        channel_map: stereo_map(),
        volume: stereo_volume(),
        resample_method: c_string("speex-float-1"),
        driver: c_string(DRIVER),
        proplist: properties(&[("media.name", name)]),
        has_volume: 1,
        volume_writable: 1,
        format: pcm_format(),
        ..SourceOutputRecord::default()
    }
}

fn module_record(index: u32, name: &str, argument: &str) -> ModuleRecord {
    ModuleRecord {
        index,
        name: c_string(name),
        argument: (!argument.is_empty()).then(|| c_string(argument)).flatten(),
        n_used: INVALID_INDEX,
        proplist: properties(&[("module.description", name)]),
    }
}

fn client_record(index: u32, name: &str) -> ClientRecord {
    ClientRecord {
        index,
        name: c_string(name),
        owner_module: INVALID_INDEX,
        driver: c_string(DRIVER),
        proplist: properties(&[("application.name", name)]),
    }
}

pub(crate) fn card_record(index: u32, name: &str) -> CardRecord {
    CardRecord {
        index,
        name: c_string(name),
        owner_module: INVALID_INDEX,
        driver: c_string(DRIVER),
        profiles: vec![
            CardProfileRecord {
                name: c_string("output:analog-stereo"),
                description: c_string("Analog Stereo Output"),
                n_sinks: 1,
                n_sources: 0,
                priority: 6500,
                available: 1,
            },
            CardProfileRecord {
                name: c_string("off"),
                description: c_string("Off"),
                n_sinks: 0,
                n_sources: 0,
                priority: 0,
                available: 1,
            },
        ],
        active_profile: Some(0),
        proplist: properties(&[("device.description", name)]),
        ports: vec![CardPortRecord {
            name: c_string("analog-output-speaker"),
            description: c_string("Speakers"),
            priority: 10000,
            available: AVAILABLE_YES,
            direction: DIRECTION_OUTPUT,
            proplist: PropListRecord::default(),
            latency_offset: 0,
            profiles: vec![0],
        }],
    }
}
