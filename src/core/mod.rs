//! In-memory operation store, settlement resolution and statistics.

/// Settlement-to-outcome resolution.
pub mod resolve;
/// Rolling statistics over stored operations.
pub mod stats;
/// Bounded operation store with URL correlation and eviction.
pub mod store;
