//! Database models for sorapc.
//!
//! These map directly to the SQLite schema. JSON columns are kept as raw
//! text here and interpreted by the owning component.

pub mod credential;
pub mod download;
pub mod task;

pub use credential::*;
pub use download::*;
pub use task::*;
