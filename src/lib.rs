//! Giveo deck data layer
//!
//! Entity cache and swipe-deck coordinator for the charity discovery client.
//! Remote collaborators (document catalog, blob storage, recommendation API)
//! are reached through traits so hosts can plug in their own clients.

pub mod assembler;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod deck;
pub mod errors;
pub mod gateway;
pub mod merge;
pub mod models;
pub mod session;
pub mod telemetry;

pub use assembler::RecordAssembler;
pub use cache::{BlobKey, EntityCache};
pub use config::Config;
pub use deck::{DeckCoordinator, DeckOptions, DeckSnapshot};
pub use errors::{AppError, AppResult};
pub use gateway::{HttpGateway, Reaction, RecommendationGateway, SwipeDirection};
pub use session::Session;

#[cfg(test)]
mod test_support;
