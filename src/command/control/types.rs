//! Argument and parameter types used by V.25TER Commands

use atat::atat_derive::AtatEnum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, AtatEnum)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Echo {
    Off = 0,
    On = 1,
}
