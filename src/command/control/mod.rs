//! ### V.25TER Commands

pub mod types;

use super::NoResponse;
use atat::atat_derive::AtatCmd;
use types::Echo;

/// Set command echo mode E
///
/// Controls whether the module echoes characters received from the host. The
/// driver runs with echo disabled so replies contain only result lines.
#[derive(Clone, AtatCmd)]
#[at_cmd("E", NoResponse, value_sep = false)]
pub struct SetEcho {
    #[at_arg(position = 0)]
    pub enabled: Echo,
}
