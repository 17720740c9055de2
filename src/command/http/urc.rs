//! Unsolicited responses for HTTP Commands
use atat::atat_derive::AtatResp;

/// Prefix of the notification that finishes a `+HTTPACTION` request
pub const HTTP_ACTION: &str = "+HTTPACTION:";

/// HTTP method action +HTTPACTION
///
/// `status` is the HTTP status code, or a 6xx code when the module itself
/// failed (600 not HTTP PDU, 601 network error, 603 DNS error, ...).
#[derive(Clone, Debug, PartialEq, Eq, AtatResp)]
pub struct HttpActionResult {
    #[at_arg(position = 0)]
    pub method: u8,
    #[at_arg(position = 1)]
    pub status: i32,
    #[at_arg(position = 2)]
    pub data_len: u32,
}
