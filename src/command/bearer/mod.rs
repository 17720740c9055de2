//! ### Bearer configuration for IP based applications +SAPBR
//!
//! The HTTP service of the module runs on top of a GPRS bearer profile that
//! has to be configured and opened with `+SAPBR` first.

pub mod responses;
pub mod types;

use atat::atat_derive::AtatCmd;
use responses::*;

use super::NoResponse;

/// Unsolicited line sent when the network drops the bearer of profile 1
pub const BEARER_DEACTIVATED: &str = "+SAPBR 1: DEACT";

/// Bearer profile used for all IP traffic
pub const BEARER_PROFILE: u8 = 1;

/// Set bearer parameter +SAPBR=3
///
/// `tag` is one of the names in [`types::BearerParameter`].
#[derive(Clone, AtatCmd)]
#[at_cmd("+SAPBR=3,", NoResponse, value_sep = false)]
pub struct SetBearerParameter<'a> {
    #[at_arg(position = 0)]
    pub cid: u8,
    #[at_arg(position = 1, len = 8)]
    pub tag: &'a str,
    #[at_arg(position = 2, len = 64)]
    pub value: &'a str,
}

/// Open bearer +SAPBR=1
///
/// Activates the PDP context of the profile. The network may take well over
/// a minute to answer.
#[derive(Clone, AtatCmd)]
#[at_cmd("+SAPBR=1,", NoResponse, value_sep = false, timeout_ms = 85000)]
pub struct OpenBearer {
    #[at_arg(position = 0)]
    pub cid: u8,
}

/// Query bearer +SAPBR=2
#[derive(Clone, AtatCmd)]
#[at_cmd("+SAPBR=2,", BearerStatus, value_sep = false)]
pub struct GetBearerStatus {
    #[at_arg(position = 0)]
    pub cid: u8,
}
