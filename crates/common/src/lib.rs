//! Common utilities and types shared across the status reporter crates.

pub mod error;
pub mod logging;

pub use error::{Error, Result};
