pub mod api;
pub mod auth;
mod collaboration;
pub mod theme;
pub mod transport;

pub use collaboration::{Collaboration, CollaborationError};
pub use system;
