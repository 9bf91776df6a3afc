//! Turning extracted fields into a typed, scored financial record:
//! classify → clean → fix → score.

pub mod classify;
pub mod cleaning;
pub mod confidence;
pub mod dates;
pub mod fields;
pub mod fixer;
pub mod normalize;

pub use classify::*;
pub use cleaning::*;
pub use confidence::*;
pub use dates::*;
pub use fixer::*;
pub use normalize::*;
