//! # Store
//!
//! Result store implementations behind the `ResultStore` contract.
//!
//! - [`InMemoryResultStore`] for tests and mock runs (with failure injection)
//! - [`JsonResultStore`] single JSON document rewritten on every write
//! - [`AnyStore`] runtime selection from configuration
//! - [`export_csv`] results download

mod any;
mod document;
mod export;
mod json;
mod memory;

pub use any::AnyStore;
pub use document::StoreDocument;
pub use export::{export_csv, ResultRow};
pub use json::JsonResultStore;
pub use memory::InMemoryResultStore;
