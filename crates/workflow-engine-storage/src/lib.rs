// Postgres-backed `Store` and `DomainEntityReader` for the configurable
// workflow engine (spec §4.1, §4.3). `workflow-engine-core` never depends on
// this crate; the dependency runs the other way so the Engine/Scheduler stay
// testable against in-memory fakes.

pub mod entity_reader;
pub mod models;
pub mod store;

pub use store::Database;
