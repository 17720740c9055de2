//! Responses for Network service Commands
use super::types::*;
use atat::atat_derive::AtatResp;

/// Network registration +CREG
#[derive(Clone, Debug, PartialEq, Eq, AtatResp)]
pub struct NetworkRegistrationStatus {
    #[at_arg(position = 0)]
    pub n: NetworkRegistrationUrc,
    #[at_arg(position = 1)]
    pub stat: NetworkRegistrationStat,
}
