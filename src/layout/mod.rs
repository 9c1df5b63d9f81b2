pub mod engine;
pub mod normalizer;
pub mod packer;
pub mod snapshot;

pub use engine::LayoutEngine;
pub use normalizer::RowNormalizer;
pub use packer::RowPacker;
pub use snapshot::LayoutSnapshot;
