//! Room lobby - codes and the room registry

pub mod code;
pub mod registry;

pub use registry::RoomRegistry;
