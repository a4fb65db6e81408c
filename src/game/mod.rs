//! Game simulation modules

pub mod catalog;
pub mod combat;
pub mod grid;
pub mod room;
pub mod round;
pub mod snapshot;
pub mod state;

pub use room::{PlayerConnection, RoomHandle};
