mod admin;
mod files;
mod public;

pub use admin::{admin_purge, health};
pub use files::{create_file, delete_file, get_file, list_files, usage};
pub use public::{serve_converted, serve_origin};
