//! Live fight-card engine: decides when each tracked event is polled, merges
//! fetched outcomes into the store and advances event status.

pub mod clock;
pub mod differ;
pub mod monitor;
pub mod ports;
pub mod reconcile;
pub mod schedule;

pub use monitor::{LiveMonitor, MonitorConfig};
pub use ports::EventCache;
