//! Domain and wire types for the PetLog backend
//!
//! This crate defines the contract between the client core and the backend:
//! - Domain types (profile, activity schedules, the home bundle)
//! - Wire DTOs and the endpoint table
//! - The error taxonomy every remote call reports
//! - The backend trait the core calls into, plus a scriptable mock

mod backend;
mod error;
mod mock;
mod types;
mod wire;

pub use backend::*;
pub use error::*;
pub use mock::*;
pub use types::*;
pub use wire::*;
