//! Shared data types.

mod enums;
mod media;

pub use enums::{AttemptStatus, ErrorClass, MergeStrategy, OverlayMethod};
pub use media::{MediaDescriptor, START_OFFSET_EPSILON};
