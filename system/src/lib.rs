pub extern crate bincode;
pub extern crate serde;
pub extern crate serde_json;

mod claims;
pub mod codec;
mod message;
mod participant;
mod presence;
mod room;
mod types;

pub use claims::*;
pub use message::*;
pub use participant::*;
pub use presence::*;
pub use room::*;
pub use types::*;
