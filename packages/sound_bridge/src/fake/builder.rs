//! Builder for configuring a fake server.

use crate::fake::FakeServer;
use crate::fake::catalog::{self, Catalog, c_string};
use crate::fake::server::ServerShared;
use crate::native::{CardRecord, INVALID_INDEX, SinkRecord, SourceRecord};

const DEFAULT_SERVER_PROTOCOL_VERSION: u32 = 35;

/// Builder for configuring a [`FakeServer`].
///
/// Objects are reported in the order they are added. Sinks, sources and cards receive sequential
/// indexes starting from 0 unless a full record with its own index is supplied.
///
/// Unless set explicitly, the default sink and source are the first ones added.
///
/// # Example
///
/// ```
/// use sound_bridge::fake::FakeServer;
///
/// let server = FakeServer::builder()
///     .server_name("studio")
///     .sink("speakers")
///     .sink("headphones")
///     .default_sink("headphones")
///     .source("microphone")
///     .card("built-in-audio")
///     .module("module-null-sink", "sink_name=null")
///     .client("mixer")
///     .sink_input("music")
///     .build();
/// ```
#[derive(Clone, Debug)]
pub struct FakeServerBuilder {
    catalog: Catalog,
    default_sink: Option<String>,
    default_source: Option<String>,
    server_protocol_version: u32,
}

impl Default for FakeServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeServerBuilder {
    /// Creates a builder for a server with no sinks, sources or other objects.
    #[must_use]
    pub fn new() -> Self {
        Self {
            catalog: Catalog::with_server(catalog::server_record()),
            default_sink: None,
            default_source: None,
            server_protocol_version: DEFAULT_SERVER_PROTOCOL_VERSION,
        }
    }

    /// Sets the name the server reports for itself.
    ///
    /// Default is `fake-server`.
    #[must_use]
    pub fn server_name(mut self, name: &str) -> Self {
        self.catalog.server.server_name = c_string(name);
        self
    }

    /// Sets the host name the server reports.
    ///
    /// Default is `localhost`.
    #[must_use]
    pub fn host_name(mut self, name: &str) -> Self {
        self.catalog.server.host_name = c_string(name);
        self
    }

    /// Sets the protocol version the server reports to connected clients.
    #[must_use]
    pub fn server_protocol_version(mut self, version: u32) -> Self {
        self.server_protocol_version = version;
        self
    }

    /// Adds a stereo sink called `name` with two ports.
    #[must_use]
    pub fn sink(mut self, name: &str) -> Self {
        let index = self.catalog.next_sink_index();
        self.catalog.sinks.push(catalog::sink_record(index, name));
        self
    }

    /// Adds a sink exactly as described by `record`.
    #[must_use]
    pub fn sink_record(mut self, record: SinkRecord) -> Self {
        self.catalog.sinks.push(record);
        self
    }

    /// Adds a stereo source called `name` with two ports.
    #[must_use]
    pub fn source(mut self, name: &str) -> Self {
        let index = self.catalog.next_source_index();
        self.catalog
            .sources
            .push(catalog::source_record(index, name));
        self
    }

    /// Adds a source exactly as described by `record`.
    #[must_use]
    pub fn source_record(mut self, record: SourceRecord) -> Self {
        self.catalog.sources.push(record);
        self
    }

    /// Sets the name of the default sink.
    #[must_use]
    pub fn default_sink(mut self, name: &str) -> Self {
        self.default_sink = Some(name.to_string());
        self
    }

    /// Sets the name of the default source.
    #[must_use]
    pub fn default_source(mut self, name: &str) -> Self {
        self.default_source = Some(name.to_string());
        self
    }

    /// Adds a playback stream called `name`, playing to the first sink.
    #[must_use]
    pub fn sink_input(mut self, name: &str) -> Self {
        let index = self.catalog.next_stream_index();
        let sink = self
            .catalog
            .sinks
            .first()
            .map_or(INVALID_INDEX, |sink| sink.index);

        self.catalog
            .sink_inputs
            .push(catalog::sink_input_record(index, name, sink));
        self
    }

    /// Adds a recording stream called `name`, recording from the first source.
    #[must_use]
    pub fn source_output(mut self, name: &str) -> Self {
        let index = self.catalog.next_stream_index();
        let source = self
            .catalog
            .sources
            .first()
            .map_or(INVALID_INDEX, |source| source.index);

        self.catalog
            .source_outputs
            .push(catalog::source_output_record(index, name, source));
        self
    }

    /// Adds a loaded module.
    #[must_use]
    pub fn module(mut self, name: &str, argument: &str) -> Self {
        self.catalog.add_module(name, argument);
        self
    }

    /// Adds a client that is connected independently of any context.
    #[must_use]
    pub fn client(mut self, name: &str) -> Self {
        self.catalog.add_client(name);
        self
    }

    /// Adds a card called `name` with an analog stereo profile, an `off` profile and one
    /// speaker port.
    #[must_use]
    pub fn card(mut self, name: &str) -> Self {
        let index = self.catalog.next_card_index();
        self.catalog.cards.push(catalog::card_record(index, name));
        self
    }

    /// Adds a card exactly as described by `record`.
    #[must_use]
    pub fn card_record(mut self, record: CardRecord) -> Self {
        self.catalog.cards.push(record);
        self
    }

    /// Creates the server.
    #[must_use]
    pub fn build(self) -> FakeServer {
        let mut catalog = self.catalog;

        catalog.server.default_sink_name = match self.default_sink {
            Some(name) => c_string(&name),
            None => catalog.sinks.first().and_then(|sink| sink.name.clone()),
        };

        catalog.server.default_source_name = match self.default_source {
            Some(name) => c_string(&name),
            None => catalog
                .sources
                .first()
                .and_then(|source| source.name.clone()),
        };

        FakeServer::from_shared(ServerShared::new(catalog, self.server_protocol_version))
    }
}
