//! # disparo-store
//!
//! SQLite-backed batch/record store, plus the store-facing sink and source
//! adapters the worker plugs into.

mod sink;
mod source;
mod store;

pub use sink::StoreSink;
pub use source::StoreSource;
pub use store::{BatchRow, BatchTallies, Store};
