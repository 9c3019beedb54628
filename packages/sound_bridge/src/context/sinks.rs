use crate::info::{ChannelVolumes, SinkInfo};
use crate::native::Selector;
use crate::{Context, Result};

impl Context {
    /// Looks up the sink called `name`.
    ///
    /// Returns `Ok(None)` if the server has no such sink.
    ///
    /// # Errors
    ///
    /// Fails if the context is not connected or the request fails for a reason other than the
    /// sink not existing.
    pub fn sink_info_by_name(&self, name: &str) -> Result<Option<SinkInfo>> {
        self.sink_info(Selector::Name(name))
    }

    /// Looks up the sink with index `index`.
    ///
    /// Returns `Ok(None)` if the server has no such sink.
    ///
    /// # Errors
    ///
    /// Fails if the context is not connected or the request fails for a reason other than the
    /// sink not existing.
    pub fn sink_info_by_index(&self, index: u32) -> Result<Option<SinkInfo>> {
        self.sink_info(Selector::Index(index))
    }

    fn sink_info(&self, sink: Selector<'_>) -> Result<Option<SinkInfo>> {
        self.with_session("sink_info", |session| {
            session.fetch_record(|native, guard, callback| {
                native.get_sink_info(guard, sink, callback)
            })
        })
    }

    /// Lists every sink, in the order the server reports them.
    ///
    /// # Errors
    ///
    /// Fails if the context is not connected or the enumeration breaks off before it is complete.
    pub fn sink_info_list(&self) -> Result<Vec<SinkInfo>> {
        self.with_session("sink_info_list", |session| {
            session.fetch_list(|native, guard, callback| native.get_sink_info_list(guard, callback))
        })
    }

    /// Sets the per-channel volume of a sink, selected by index or name.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::OperationFailed`][crate::Error::OperationFailed] carrying the server's
    /// reason if the server refuses the change.
    ///
    /// Fails with [`Error::OperationRejected`][crate::Error::OperationRejected] without contacting
    /// the server if `volume` has more channels than the native library supports.
    pub fn set_sink_volume<'s>(
        &self,
        sink: impl Into<Selector<'s>>,
        volume: &ChannelVolumes,
    ) -> Result<()> {
        let sink = sink.into();
        let volume = volume.to_record()?;

        self.with_session("set_sink_volume", |session| {
            session.mutate(|native, guard, callback| {
                native.set_sink_volume(guard, sink, &volume, callback)
            })
        })
    }

    /// Mutes or unmutes a sink, selected by index or name.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::OperationFailed`][crate::Error::OperationFailed] carrying the server's
    /// reason if the server refuses the change.
    pub fn set_sink_mute<'s>(&self, sink: impl Into<Selector<'s>>, mute: bool) -> Result<()> {
        let sink = sink.into();

        self.with_session("set_sink_mute", |session| {
            session.mutate(|native, guard, callback| {
                native.set_sink_mute(guard, sink, mute, callback)
            })
        })
    }

    /// Suspends or resumes a sink, selected by index or name.
    ///
    /// # Errors
    ///
    /// Fails if the server refuses the change.
    pub fn suspend_sink<'s>(&self, sink: impl Into<Selector<'s>>, suspend: bool) -> Result<()> {
        let sink = sink.into();

        self.with_session("suspend_sink", |session| {
            session.mutate(|native, guard, callback| {
                native.suspend_sink(guard, sink, suspend, callback)
            })
        })
    }

    /// Switches the active port of a sink, selected by index or name.
    ///
    /// # Errors
    ///
    /// Fails if the server refuses the change, for example because the port does not exist.
    pub fn set_sink_port<'s>(&self, sink: impl Into<Selector<'s>>, port: &str) -> Result<()> {
        let sink = sink.into();

        self.with_session("set_sink_port", |session| {
            session.mutate(|native, guard, callback| {
                native.set_sink_port(guard, sink, port, callback)
            })
        })
    }
}
