//! Data models for the charity discovery client.
//!
//! Field names follow the remote document schema so documents decode directly.

mod campaign;
mod charity;
mod document;
mod donation;
mod supporter;

pub use campaign::*;
pub use charity::*;
pub use document::*;
pub use donation::*;
pub use supporter::*;
