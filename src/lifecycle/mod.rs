//! In-memory credential cache with lazy refresh and single-flight exchanges.

pub mod flight;
pub mod manager;

pub use manager::LifecycleManager;
