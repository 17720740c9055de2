//! AT Commands for the SIM800 series of GSM/GPRS modules
//!
//! Only the subset needed to bring up a GPRS bearer, run HTTP GET requests
//! and read signal and battery status is defined.

pub mod bearer;
pub mod control;
pub mod device_lock;
pub mod general;
pub mod http;
pub mod mobile_control;
pub mod network_service;

use atat::atat_derive::AtatResp;

#[derive(Debug, Clone, AtatResp)]
pub struct NoResponse;

/// Final result code of a successful command
pub const OK: &str = "OK";

/// Final result codes of a rejected command. `+CME ERROR` and `+CMS ERROR`
/// carry a numeric or verbose cause after the colon.
pub const ERRORS: &[&str] = &["ERROR", "+CME ERROR", "+CMS ERROR"];

/// Unsolicited lines that can interleave with the reply to any command
pub const UNSOLICITED: &[&str] = &[bearer::BEARER_DEACTIVATED];
