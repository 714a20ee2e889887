pub mod process;
pub mod upload;

pub use process::{ProcessOptions, ProcessUploadCommand, ProcessUploadResponse};
pub use upload::{UploadFileCommand, UploadFileResponse};
