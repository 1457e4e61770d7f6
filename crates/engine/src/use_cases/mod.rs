//! Use cases - User story orchestration.
//!
//! Each module covers one part of the world lifecycle. Use cases coordinate
//! the in-memory stores with the port traits from `infrastructure::ports`.

pub mod eviction;
pub mod listing;
pub mod occupancy;
pub mod permissions;
pub mod reconcile;
pub mod world;

// Re-export main types
pub use eviction::{EvictionConfig, EvictionItemError, EvictionScheduler, SweepReport};
pub use listing::WorldListing;
pub use occupancy::{occupancy_events_for_move, OccupancyEvent, OccupancyListener};
pub use permissions::PermissionResolver;
pub use reconcile::{ReconcileError, ReconcileReport, StartupReconciler};
pub use world::{WorldError, WorldLifecycle};
