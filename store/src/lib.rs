mod arango;
mod gateway;
mod interface;
mod memory;
mod query;

pub use arango::{ArangoConfig, ArangoCursor, ArangoStore};
pub use gateway::GatewayColdStorage;
pub use interface::{ColdStorage, CreateOutcome, DocumentCursor, DocumentStore};
pub use memory::{MemoryColdStorage, MemoryCursor, MemoryDocumentStore};
pub use query::DocumentQuery;
