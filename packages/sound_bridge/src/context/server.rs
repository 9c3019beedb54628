use crate::info::ServerInfo;
use crate::{Context, Result};

impl Context {
    /// Describes the server the context is connected to.
    ///
    /// # Errors
    ///
    /// Fails if the context is not connected or the server does not answer the request.
    pub fn server_info(&self) -> Result<ServerInfo> {
        self.with_session("server_info", |session| {
            session.fetch_server_record(|native, guard, callback| {
                native.get_server_info(guard, callback)
            })
        })
    }
}
