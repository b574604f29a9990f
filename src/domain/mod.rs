//! Core domain types and logic. No I/O happens here.

pub mod advisory;
pub mod backtest;
pub mod config_validation;
pub mod cost;
pub mod error;
pub mod live;
pub mod metrics;
pub mod observation;
pub mod portfolio;
pub mod position;
pub mod rolling;
pub mod signal;
pub mod state_machine;
pub mod strategy;
