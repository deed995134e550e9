pub mod event_cache;

pub use event_cache::MemoryEventCache;
