//! Common types for the Redesign Studio gateway

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
