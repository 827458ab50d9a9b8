pub mod hub;
pub mod presence;
pub mod registry;
pub mod room;
pub mod session;
pub mod transport;
