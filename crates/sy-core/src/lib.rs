//! Core types for the switchyard inference router: tiers, backend
//! descriptors, the catalog snapshot, and the cost model.
//!
//! Everything in this crate is synchronous and side-effect-free. The
//! `sy-router` crate composes these types into routing decisions.

pub mod backend;
pub mod catalog;
pub mod cost;
pub mod tier;

pub use backend::{default_backend_table, BackendDescriptor, Capability, TaskType};
pub use catalog::{BackendCatalog, CatalogSnapshot};
pub use cost::{cheapest, estimate_cost};
pub use tier::Tier;
