pub mod service;

pub use service::{system_time, LedgerService, TimeSource};
