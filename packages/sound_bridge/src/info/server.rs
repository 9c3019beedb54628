use crate::info::common::text;
use crate::info::{ChannelMap, SampleSpec};
use crate::native::ServerRecord;

/// Information about the sound server a context is connected to.
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub struct ServerInfo {
    /// User the server runs as.
    pub user_name: String,

    /// Host the server runs on.
    pub host_name: String,

    /// Version string of the server.
    pub server_version: String,

    /// Name of the server package.
    pub server_name: String,

    /// Default sample specification.
    pub sample_spec: SampleSpec,

    /// Default channel map.
    pub channel_map: ChannelMap,

    /// Name of the default sink.
    pub default_sink_name: String,

    /// Name of the default source.
    pub default_source_name: String,

    /// Random cookie identifying this server instance.
    pub cookie: u32,
}

impl From<&ServerRecord> for ServerInfo {
    fn from(record: &ServerRecord) -> Self {
        Self {
            user_name: text(record.user_name.as_deref()),
            host_name: text(record.host_name.as_deref()),
            server_version: text(record.server_version.as_deref()),
            server_name: text(record.server_name.as_deref()),
            sample_spec: SampleSpec::from(&record.sample_spec),
            channel_map: ChannelMap::from(&record.channel_map),
            default_sink_name: text(record.default_sink_name.as_deref()),
            default_source_name: text(record.default_source_name.as_deref()),
            cookie: record.cookie,
        }
    }
}
