use crate::info::{ChannelVolumes, SourceInfo};
use crate::native::Selector;
use crate::{Context, Result};

impl Context {
    /// Looks up the source called `name`. Returns `Ok(None)` if there is none.
    pub fn source_info_by_name(&self, name: &str) -> Result<Option<SourceInfo>> {
        self.source_info(Selector::Name(name))
    }

    /// Looks up the source with index `index`. Returns `Ok(None)` if there is none.
    pub fn source_info_by_index(&self, index: u32) -> Result<Option<SourceInfo>> {
        self.source_info(Selector::Index(index))
    }

    fn source_info(&self, source: Selector<'_>) -> Result<Option<SourceInfo>> {
        self.with_session("source_info", |session| {
            session.fetch_record(|native, guard, callback| {
                native.get_source_info(guard, source, callback)
            })
        })
    }

    /// Lists every source, in the order the server reports them.
    ///
    /// # Errors
    ///
    /// Fails if the context is not connected or the enumeration breaks off before it is complete.
    pub fn source_info_list(&self) -> Result<Vec<SourceInfo>> {
        self.with_session("source_info_list", |session| {
            session.fetch_list(|native, guard, callback| {
                native.get_source_info_list(guard, callback)
            })
        })
    }

    /// Sets the per-channel volume of a source, selected by index or name.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::OperationFailed`][crate::Error::OperationFailed] carrying the server's
    /// reason if the server refuses the change.
    ///
    /// Fails with [`Error::OperationRejected`][crate::Error::OperationRejected] without contacting
    /// the server if `volume` has more channels than the native library supports.
    pub fn set_source_volume<'s>(
        &self,
        source: impl Into<Selector<'s>>,
        volume: &ChannelVolumes,
    ) -> Result<()> {
        let source = source.into();
        let volume = volume.to_record()?;

        self.with_session("set_source_volume", |session| {
            session.mutate(|native, guard, callback| {
                native.set_source_volume(guard, source, &volume, callback)
            })
        })
    }

    /// Mutes or unmutes a source, selected by index or name.
    pub fn set_source_mute<'s>(&self, source: impl Into<Selector<'s>>, mute: bool) -> Result<()> {
        let source = source.into();

        self.with_session("set_source_mute", |session| {
            session.mutate(|native, guard, callback| {
                native.set_source_mute(guard, source, mute, callback)
            })
        })
    }

    /// Suspends or resumes a source, selected by index or name.
    pub fn suspend_source<'s>(&self, source: impl Into<Selector<'s>>, suspend: bool) -> Result<()> {
        let source = source.into();

        self.with_session("suspend_source", |session| {
            session.mutate(|native, guard, callback| {
                native.suspend_source(guard, source, suspend, callback)
            })
        })
    }

    /// Switches the active port of a source, selected by index or name.
    pub fn set_source_port<'s>(&self, source: impl Into<Selector<'s>>, port: &str) -> Result<()> {
        let source = source.into();

        self.with_session("set_source_port", |session| {
            session.mutate(|native, guard, callback| {
                native.set_source_port(guard, source, port, callback)
            })
        })
    }
}
