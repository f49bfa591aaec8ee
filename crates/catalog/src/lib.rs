//! In-memory authoritative snapshot of country risk state.

pub mod model;
pub mod store;

pub use model::*;
pub use store::*;
