pub mod entry;
pub mod hint;
pub(crate) mod log_file;
pub mod segment;
