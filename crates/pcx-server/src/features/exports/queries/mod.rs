pub mod status;

pub use status::{ExportStatusResponse, GetExportStatusQuery};
