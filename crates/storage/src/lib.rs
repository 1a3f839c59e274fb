pub mod conformance;
mod error;
mod memory;
mod record;
mod traits;

pub use error::StorageError;
pub use memory::InMemoryStore;
pub use record::{tables, AuditStats, DecisionCounts, OriginCounts, Row};
pub use traits::{Filter, Order, Query, RowStore};
