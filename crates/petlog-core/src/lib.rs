//! Client core for PetLog
//!
//! This crate is the heart of the client, containing:
//! - Schedule evaluation (upcoming, due, overdue)
//! - The home card deck and its cursor
//! - A keyed remote data loader (TTL cache, single-flight, generations)
//! - The home model wiring loader, deck and backend together

mod deck;
mod error;
mod events;
mod home;
mod loader;
mod schedule;

pub use deck::*;
pub use error::*;
pub use events::*;
pub use home::*;
pub use loader::*;
pub use schedule::*;
