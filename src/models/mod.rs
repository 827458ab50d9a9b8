pub mod health;
pub mod diagnostics;
pub mod room_info;
pub mod messages;
pub mod user;
pub mod error;

pub use health::*;
pub use diagnostics::*;
pub use room_info::*;
pub use messages::*;
pub use user::*;
pub use error::*;
