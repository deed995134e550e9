pub mod event_store;
pub mod models;

pub use event_store::SqliteEventStore;
