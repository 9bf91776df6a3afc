pub mod document;
pub mod enums;
pub mod job;

pub use document::*;
pub use enums::*;
pub use job::*;
