pub mod config;
pub mod metrics;
pub mod retry;
pub mod storage;

#[cfg(feature = "api")]
pub mod api;
