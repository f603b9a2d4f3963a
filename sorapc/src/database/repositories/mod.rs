//! Repository layer for database access.
//!
//! Each component receives the repository it needs as an `Arc<dyn ...>` at
//! construction; nothing reaches the pool through global state.

pub mod credential;
pub mod download;
pub mod task;

pub use credential::*;
pub use download::*;
pub use task::*;
