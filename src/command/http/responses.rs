//! Responses for HTTP Commands
use atat::atat_derive::AtatResp;

/// Header line preceding the raw body bytes of +HTTPREAD
#[derive(Clone, Debug, PartialEq, Eq, AtatResp)]
pub struct HttpReadHeader {
    #[at_arg(position = 0)]
    pub len: u32,
}
