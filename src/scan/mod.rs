pub mod cache;
pub mod catalog;
pub mod scanner;

pub use cache::SnapshotCache;
pub use catalog::{CacheStats, CatalogEvent, LogCatalog};
pub use scanner::{LogDirScanner, RunLogEntry};
