#![cfg_attr(not(test), no_std)]

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

pub mod client;
pub mod command;
pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod http;
pub mod line_reader;
mod module_timing;
pub mod parser;
pub mod registration;
pub mod sleep;
pub mod telemetry;
pub mod traits;

#[cfg(test)]
mod test_helpers;

pub use client::Sim800l;
pub use config::Config;
pub use connection::ConnectionState;
pub use error::Error;
pub use http::HttpState;
pub use telemetry::TelemetrySnapshot;
pub use traits::{Clock, Sensor, SystemClock};
