//! Argument and parameter types used by HTTP Commands and Responses

use atat::atat_derive::AtatEnum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, AtatEnum)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HttpMethod {
    Get = 0,
    Post = 1,
    Head = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, AtatEnum)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HttpSsl {
    Disabled = 0,
    Enabled = 1,
}
