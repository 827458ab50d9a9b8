pub mod health;
pub mod diagnostics;
pub mod room_info;

pub use health::*;
pub use diagnostics::*;
pub use room_info::*;
