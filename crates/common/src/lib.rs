//! Common utilities and types shared across the netvip crates.

pub mod error;
pub mod logging;

pub use error::{Error, Result};
