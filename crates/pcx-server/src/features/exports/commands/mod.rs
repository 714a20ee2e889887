pub mod create;

pub use create::{CreateExportCommand, CreateExportResponse};
