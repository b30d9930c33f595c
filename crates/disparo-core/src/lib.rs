//! # disparo-core
//!
//! Core types, traits, configuration, and error handling for Disparo.

pub mod config;
pub mod error;
pub mod phone;
pub mod record;
pub mod template;
pub mod traits;

pub use config::shellexpand;
pub use error::DisparoError;
