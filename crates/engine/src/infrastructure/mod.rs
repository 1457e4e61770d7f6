//! Infrastructure implementations.
//!
//! Contains port trait implementations for external dependencies.

pub mod authorization;
pub mod clock;
pub mod config;
pub mod occupancy_feed;
pub mod ports;
pub mod roles_file;
pub mod world_storage;
pub mod world_store;
