//! Concrete adapter implementations for ports.

pub mod advisory_stub;
pub mod csv_adapter;
pub mod file_config_adapter;
pub mod log_notifier;
#[cfg(feature = "sqlite")]
pub mod sqlite_adapter;
