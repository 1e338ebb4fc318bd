//! Middle-end module - validation and the async lowering pass

pub mod census;
pub mod lower;
pub mod placement;
pub mod primitives;

pub use census::{is_fully_lowered, Census};
pub use lower::{LowerOptions, Lowerer, LoweringStats};
pub use placement::check_await_placement;
