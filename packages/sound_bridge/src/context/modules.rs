use crate::info::ModuleInfo;
use crate::{Context, Result};

impl Context {
    /// Looks up the loaded module with index `index`. Returns `Ok(None)` if there is none.
    ///
    /// # Errors
    ///
    /// Fails if the context is not connected or the request fails for another reason.
    pub fn module_info(&self, index: u32) -> Result<Option<ModuleInfo>> {
        self.with_session("module_info", |session| {
            session.fetch_record(|native, guard, callback| {
                native.get_module_info(guard, index, callback)
            })
        })
    }

    /// Lists every loaded module.
    ///
    /// # Errors
    ///
    /// Fails if the context is not connected or the enumeration breaks off before it is complete.
    pub fn module_info_list(&self) -> Result<Vec<ModuleInfo>> {
        self.with_session("module_info_list", |session| {
            session.fetch_list(|native, guard, callback| {
                native.get_module_info_list(guard, callback)
            })
        })
    }

    /// Loads the module `name` with `argument` and returns the index of the loaded module.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::OperationFailed`][crate::Error::OperationFailed] if the server could
    /// not load the module.
    pub fn load_module(&self, name: &str, argument: &str) -> Result<u32> {
        self.with_session("load_module", |session| {
            session.fetch_index(|native, guard, callback| {
                native.load_module(guard, name, argument, callback)
            })
        })
    }

    /// Unloads the module with index `index`.
    ///
    /// # Errors
    ///
    /// Fails if the server refuses, for example because no such module is loaded.
    pub fn unload_module(&self, index: u32) -> Result<()> {
        self.with_session("unload_module", |session| {
            session.mutate(|native, guard, callback| native.unload_module(guard, index, callback))
        })
    }
}
