//! Build-world engine library.
//!
//! Tracks which build worlds exist, who may see and enter them, and unloads
//! worlds that have sat empty for too long.
//!
//! ## Structure
//!
//! - `stores/` - In-memory world registry and idle tracker
//! - `use_cases/` - World lifecycle, listing, permissions, reconciliation, eviction
//! - `infrastructure/` - Port traits and their SQLite / filesystem / JSON adapters
//! - `app` - Application composition

pub mod app;
pub mod infrastructure;
pub mod stores;
pub mod use_cases;

pub use app::{App, Ports};
