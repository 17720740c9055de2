//! Responses for Bearer Commands
use super::types::*;
use atat::atat_derive::AtatResp;
use heapless::String;

/// Query bearer +SAPBR=2
#[derive(Clone, Debug, PartialEq, Eq, AtatResp)]
pub struct BearerStatus {
    #[at_arg(position = 0)]
    pub cid: u8,
    #[at_arg(position = 1)]
    pub status: BearerState,
    #[at_arg(position = 2)]
    pub ip: String<24>,
}
