//! Data models for the swim school dashboard.
//!
//! Field names serialize in camelCase to match the dashboard frontend.

mod datastore;
mod health_declaration;
mod participant;
mod payment;
mod pool;
mod product;
mod registration;
mod season;

pub use datastore::*;
pub use health_declaration::*;
pub use participant::*;
pub use payment::*;
pub use pool::*;
pub use product::*;
pub use registration::*;
pub use season::*;
