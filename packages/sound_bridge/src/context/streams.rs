use crate::info::{SinkInputInfo, SourceOutputInfo};
use crate::{Context, Result};

impl Context {
    /// Looks up the playback stream with index `index`. Returns `Ok(None)` if there is none.
    ///
    /// # Errors
    ///
    /// Fails if the context is not connected or the request fails for another reason.
    pub fn sink_input_info(&self, index: u32) -> Result<Option<SinkInputInfo>> {
        self.with_session("sink_input_info", |session| {
            session.fetch_record(|native, guard, callback| {
                native.get_sink_input_info(guard, index, callback)
            })
        })
    }

    /// Lists every playback stream.
    ///
    /// # Errors
    ///
    /// Fails if the context is not connected or the enumeration breaks off before it is complete.
    pub fn sink_input_info_list(&self) -> Result<Vec<SinkInputInfo>> {
        self.with_session("sink_input_info_list", |session| {
            session.fetch_list(|native, guard, callback| {
                native.get_sink_input_info_list(guard, callback)
            })
        })
    }

    /// Looks up the recording stream with index `index`. Returns `Ok(None)` if there is none.
    ///
    /// # Errors
    ///
    /// Fails if the context is not connected or the request fails for another reason.
    pub fn source_output_info(&self, index: u32) -> Result<Option<SourceOutputInfo>> {
        self.with_session("source_output_info", |session| {
            session.fetch_record(|native, guard, callback| {
                native.get_source_output_info(guard, index, callback)
            })
        })
    }

    /// Lists every recording stream.
    ///
    /// # Errors
    ///
    /// Fails if the context is not connected or the enumeration breaks off before it is complete.
    pub fn source_output_info_list(&self) -> Result<Vec<SourceOutputInfo>> {
        self.with_session("source_output_info_list", |session| {
            session.fetch_list(|native, guard, callback| {
                native.get_source_output_info_list(guard, callback)
            })
        })
    }
}
