//! ### HTTP application commands
//!
//! The module runs the HTTP client itself. A request is a session: `+HTTPINIT`,
//! parameters set with `+HTTPPARA`, `+HTTPACTION` which is answered with `OK`
//! and later by the `+HTTPACTION:` notification, `+HTTPREAD` for the body and
//! finally `+HTTPTERM`. The bearer profile referenced by `CID` must be open.

pub mod responses;
pub mod types;
pub mod urc;

use atat::atat_derive::AtatCmd;
use types::{HttpMethod, HttpSsl};

use super::NoResponse;

/// Longest URL accepted for `+HTTPPARA="URL"`
pub const MAX_URL_LEN: usize = 256;

/// Initialize HTTP service +HTTPINIT
#[derive(Clone, AtatCmd)]
#[at_cmd("+HTTPINIT", NoResponse)]
pub struct InitHttp;

/// Terminate HTTP service +HTTPTERM
#[derive(Clone, AtatCmd)]
#[at_cmd("+HTTPTERM", NoResponse)]
pub struct TerminateHttp;

/// Set HTTP parameter `CID` +HTTPPARA
///
/// Selects the `+SAPBR` bearer profile the session runs on.
#[derive(Clone, AtatCmd)]
#[at_cmd("+HTTPPARA=\"CID\",", NoResponse, value_sep = false)]
pub struct SetHttpBearerProfile {
    #[at_arg(position = 0)]
    pub cid: u8,
}

/// Set HTTP parameter `URL` +HTTPPARA
#[derive(Clone, AtatCmd)]
#[at_cmd("+HTTPPARA=\"URL\",", NoResponse, value_sep = false)]
pub struct SetHttpUrl<'a> {
    #[at_arg(position = 0, len = 256)]
    pub url: &'a str,
}

/// HTTPS enable +HTTPSSL
#[derive(Clone, AtatCmd)]
#[at_cmd("+HTTPSSL", NoResponse)]
pub struct SetHttpSsl {
    #[at_arg(position = 0)]
    pub enabled: HttpSsl,
}

/// HTTP method action +HTTPACTION
///
/// `OK` only means the request was queued. The outcome arrives later as
/// [`urc::HttpActionResult`].
#[derive(Clone, AtatCmd)]
#[at_cmd("+HTTPACTION", NoResponse)]
pub struct HttpAction {
    #[at_arg(position = 0)]
    pub method: HttpMethod,
}

/// Read the HTTP server response +HTTPREAD
///
/// Answered by `+HTTPREAD: <len>`, then `<len>` raw bytes, then `OK`.
#[derive(Clone, AtatCmd)]
#[at_cmd("+HTTPREAD", NoResponse, timeout_ms = 5000)]
pub struct ReadHttpData {
    #[at_arg(position = 0)]
    pub start: u32,
    #[at_arg(position = 1)]
    pub len: u32,
}
