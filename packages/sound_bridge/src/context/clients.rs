use crate::info::ClientInfo;
use crate::{Context, Result};

impl Context {
    /// Looks up the client with index `index`. Returns `Ok(None)` if there is none.
    ///
    /// # Errors
    ///
    /// Fails if the context is not connected or the request fails for another reason.
    pub fn client_info(&self, index: u32) -> Result<Option<ClientInfo>> {
        self.with_session("client_info", |session| {
            session.fetch_record(|native, guard, callback| {
                native.get_client_info(guard, index, callback)
            })
        })
    }

    /// Lists every client connected to the server, this one included.
    ///
    /// # Errors
    ///
    /// Fails if the context is not connected or the enumeration breaks off before it is complete.
    pub fn client_info_list(&self) -> Result<Vec<ClientInfo>> {
        self.with_session("client_info_list", |session| {
            session.fetch_list(|native, guard, callback| {
                native.get_client_info_list(guard, callback)
            })
        })
    }

    /// Disconnects the client with index `index` from the server.
    ///
    /// # Errors
    ///
    /// Fails if the server refuses.
    pub fn kill_client(&self, index: u32) -> Result<()> {
        self.with_session("kill_client", |session| {
            session.mutate(|native, guard, callback| native.kill_client(guard, index, callback))
        })
    }
}
