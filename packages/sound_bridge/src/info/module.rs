use crate::info::PropList;
use crate::info::common::{optional_index, optional_text, text};
use crate::native::ModuleRecord;

/// A module loaded into the server.
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub struct ModuleInfo {
    /// Index of the module.
    pub index: u32,

    /// Name of the module.
    pub name: String,

    /// Argument string the module was loaded with, if any.
    pub argument: Option<String>,

    /// Usage counter, if the module keeps one.
    pub use_count: Option<u32>,

    /// Free-form properties.
    pub properties: PropList,
}

impl From<&ModuleRecord> for ModuleInfo {
    fn from(record: &ModuleRecord) -> Self {
        Self {
            index: record.index,
            name: text(record.name.as_deref()),
            argument: optional_text(record.argument.as_deref()),
            use_count: optional_index(record.n_used),
            properties: PropList::from(&record.proplist),
        }
    }
}
