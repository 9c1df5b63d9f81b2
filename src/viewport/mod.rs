//! Viewport side of the grid: which tiles to draw, and how scroll and zoom
//! input move the visible band.

pub mod controller;
pub mod culler;
pub mod damping;

pub use controller::{ScrollOutcome, ScrollZoomController, ViewportState};
pub use culler::{CullMode, ViewportCuller};
pub use damping::{ZoomDamper, ZoomDamping};
pub use hit_test::{hit_test, SelectionSink};
