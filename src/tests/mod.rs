#[cfg(test)]
pub mod common;
pub mod http_exchange;
pub mod store_persistence;
