//! Decoding of the reply lines the state machines care about.
//!
//! Every function takes the payload lines of a completed command (or a single
//! line) and returns [`Error::MalformedReply`] instead of panicking when the
//! reply does not have the expected shape.

use serde::Deserialize;

use crate::command::bearer::responses::BearerStatus;
use crate::command::bearer::types::BearerState;
use crate::command::device_lock::responses::PinStatus;
use crate::command::device_lock::types::PinStatusCode;
use crate::command::http::responses::HttpReadHeader;
use crate::command::http::urc::HttpActionResult;
use crate::command::mobile_control::responses::{BatteryCharge, SignalQuality};
use crate::command::mobile_control::types::ChargeStatus;
use crate::command::network_service::responses::NetworkRegistrationStatus;
use crate::error::Error;
use crate::line_reader::Line;
use crate::registration::Status;

fn decode<'a, T: Deserialize<'a>>(line: &'a str) -> Result<T, Error> {
    atat::serde_at::from_slice(line.trim().as_bytes()).map_err(|_| {
        warn!("Malformed reply: {}", line);
        Error::MalformedReply
    })
}

fn find<'a>(lines: &'a [Line], prefix: &str) -> Result<&'a str, Error> {
    lines
        .iter()
        .map(|l| l.trim_start())
        .find(|l| l.starts_with(prefix))
        .ok_or(Error::MalformedReply)
}

/// Map the 27.007 RSSI scale to dBm. 0 is -113 dBm or less, 31 is -51 dBm
/// or more, 99 and anything out of range is unknown.
pub fn rssi_to_dbm(rssi: u8) -> Option<i16> {
    match rssi {
        0..=31 => Some(-113 + 2 * rssi as i16),
        _ => None,
    }
}

/// Signal strength in dBm from a `+CSQ` reply, `None` when the module does
/// not know it.
pub fn signal_strength(lines: &[Line]) -> Result<Option<i16>, Error> {
    let csq: SignalQuality = decode(find(lines, "+CSQ:")?)?;
    Ok(rssi_to_dbm(csq.rssi))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Battery {
    pub status: ChargeStatus,
    /// Percent
    pub level: u8,
    /// Volts
    pub voltage: f32,
}

/// Charge state, level and voltage from a `+CBC` reply
pub fn battery(lines: &[Line]) -> Result<Battery, Error> {
    let cbc: BatteryCharge = decode(find(lines, "+CBC:")?)?;
    if cbc.level > 100 {
        return Err(Error::MalformedReply);
    }
    Ok(Battery {
        status: cbc.status,
        level: cbc.level,
        voltage: cbc.voltage as f32 / 1000.0,
    })
}

/// SIM state from a `+CPIN?` reply
pub fn pin_status(lines: &[Line]) -> Result<PinStatusCode, Error> {
    let cpin: PinStatus = decode(find(lines, "+CPIN:")?)?;
    Ok(cpin.code)
}

/// Registration state from a `+CREG?` reply
pub fn registration(lines: &[Line]) -> Result<Status, Error> {
    let creg: NetworkRegistrationStatus = decode(find(lines, "+CREG:")?)?;
    Ok(creg.stat.into())
}

/// State of the bearer profile from a `+SAPBR=2` reply
pub fn bearer_state(lines: &[Line]) -> Result<BearerState, Error> {
    let sapbr: BearerStatus = decode(find(lines, "+SAPBR:")?)?;
    Ok(sapbr.status)
}

/// Outcome of a finished HTTP request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HttpOutcome {
    pub status: u16,
    pub len: usize,
}

/// Decode the `+HTTPACTION: <method>,<status>,<len>` notification.
///
/// A status of 0 or below, above 65535, or in the 6xx range the module uses
/// for its own network errors does not describe a server response and is
/// reported as malformed.
pub fn http_action(line: &str) -> Result<HttpOutcome, Error> {
    let res: HttpActionResult = decode(line)?;
    match res.status {
        600..=699 => {
            warn!("HTTP request failed in module: {}", res.status);
            Err(Error::MalformedReply)
        }
        1..=65535 => Ok(HttpOutcome {
            status: res.status as u16,
            len: res.data_len as usize,
        }),
        _ => Err(Error::MalformedReply),
    }
}

/// Length announced by a data header such as `+HTTPREAD: <len>`
pub fn data_header(line: &str) -> Result<usize, Error> {
    let header: HttpReadHeader = decode(line)?;
    Ok(header.len as usize)
}
