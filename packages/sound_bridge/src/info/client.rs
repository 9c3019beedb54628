use crate::info::PropList;
use crate::info::common::{optional_index, text};
use crate::native::ClientRecord;

/// A client connected to the server.
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub struct ClientInfo {
    /// Index of the client.
    pub index: u32,

    /// Name the client announced.
    pub name: String,

    /// Index of the owning module, if any.
    pub owner_module: Option<u32>,

    /// Driver name.
    pub driver: String,

    /// Free-form properties.
    pub properties: PropList,
}

impl From<&ClientRecord> for ClientInfo {
    fn from(record: &ClientRecord) -> Self {
        Self {
            index: record.index,
            name: text(record.name.as_deref()),
            owner_module: optional_index(record.owner_module),
            driver: text(record.driver.as_deref()),
            properties: PropList::from(&record.proplist),
        }
    }
}
