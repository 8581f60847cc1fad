//! Game simulation modules

pub mod physics;
pub mod score;
pub mod session;
pub mod snapshot;

pub use session::{GameSession, SessionHandle};
