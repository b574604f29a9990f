//! Port traits at the boundary between the core and the outside world.

pub mod advisory_port;
pub mod config_port;
pub mod data_port;
pub mod notify_port;
pub mod report_port;
pub mod store_port;
