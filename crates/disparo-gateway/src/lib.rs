//! # disparo-gateway
//!
//! WAHA (WhatsApp HTTP API) client implementing the delivery gateway trait.

mod waha;

pub use waha::WahaGateway;
