pub mod row;
pub mod tile;

pub use row::*;
pub use tile::*;
