//! Justified flow-grid layout and viewport virtualization.
//!
//! Media items of arbitrary aspect ratio are packed into rows of equal
//! height that exactly fill the container width. Only tiles inside the
//! visible band (plus an over-scan margin) are handed to the renderer, so
//! grids of many thousands of items scroll and zoom cheaply.
//!
//! - `models`, `layout`, `viewport` - the layout core, free of I/O
//! - `media`, `render` - decoding and drawing behind traits
//! - `scanner`, `app`, `bench` - the command-line host

pub mod app;
pub mod bench;
pub mod config;
pub mod error;
pub mod layout;
pub mod media;
pub mod models;
pub mod render;
pub mod scanner;
pub mod viewport;

pub use config::GridConfig;
pub use error::{ConfigError, MediaError};
pub use layout::{LayoutEngine, LayoutSnapshot};
pub use models::{MediaId, Rect, Row, Tile};
pub use viewport::{ScrollOutcome, ViewportState};
