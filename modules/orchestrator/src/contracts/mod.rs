pub mod enums;
pub mod payloads;
pub mod reasons;

pub use enums::*;
pub use payloads::*;
pub use reasons::*;
