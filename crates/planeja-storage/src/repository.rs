//! Repository layer for data access

pub mod snapshots;

// Re-export concrete repository implementations with simple names
pub use snapshots::DbSnapshotRepository;
pub use snapshots::StoredSnapshotRepository;

// Re-export repository traits
pub use snapshots::SnapshotRepository;
