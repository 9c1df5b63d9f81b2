//! Discovery of media files on disk.

pub mod file_scanner;

pub use file_scanner::{FileScanner, MediaType, ScanConfig};
