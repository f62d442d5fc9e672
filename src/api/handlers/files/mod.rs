pub mod list;
pub mod status;
pub mod types;
pub mod upload;

// Re-export all types
pub use types::*;

// Re-export all handlers
pub use list::{get_file, list_files};
pub use status::get_file_status;
pub use upload::upload_file;
