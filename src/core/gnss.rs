//! GNSS power, URC reporting and navigation fixes

use crate::core::command::Command;
use crate::core::engine::DEFAULT_CRLF;
use crate::core::modem::Modem;
use crate::core::response::{anchor, ResponseFrame};
use crate::core::transport::Transport;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Terminator pairs of a `+CGNSINF` reply: blank, sentence, blank, `OK`
const GNSS_INFO_CRLF: u8 = 4;

/// Fields a `+CGNSINF`/`+UGNSINF` sentence carries before the optional tail
const GNSS_FIELDS: usize = 16;

/// GNSS engine state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GnssStatus {
    /// Engine off
    PowerOff,
    /// Engine on
    PowerOn,
    /// Engine on with a position
    Fix,
    /// Engine on, still searching
    NotFix,
    /// No answer, unreadable answer or `ERROR`
    Error,
}

impl GnssStatus {
    /// Map the flag after `+CGNSPWR: `
    pub fn from_power_char(c: u8) -> Self {
        match c {
            b'1' => Self::PowerOn,
            b'0' => Self::PowerOff,
            _ => Self::Error,
        }
    }
}

impl fmt::Display for GnssStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PowerOff => "power off",
            Self::PowerOn => "power on",
            Self::Fix => "fix",
            Self::NotFix => "no fix",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// One navigation fix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GnssInfo {
    /// UTC as sent, `yyyyMMddhhmmss.sss`
    pub utc: String,
    /// Degrees, north positive
    pub latitude: f64,
    /// Degrees, east positive
    pub longitude: f64,
    /// Meters above MSL
    pub altitude: f64,
    /// Speed over ground, km/h
    pub speed: f64,
    /// Course over ground, degrees
    pub heading: f64,
    /// Fix mode
    pub fix_mode: u8,
    /// Horizontal dilution of precision
    pub hdop: f64,
    /// Position dilution of precision
    pub pdop: f64,
    /// Vertical dilution of precision
    pub vdop: f64,
    /// GPS satellites in view
    pub satellites_in_view: u8,
    /// GNSS satellites used
    pub satellites_used: u8,
}

impl GnssInfo {
    /// UTC timestamp of the fix
    pub fn timestamp(&self) -> Option<NaiveDateTime> {
        let s = self.utc.as_str();
        let num = |range: std::ops::Range<usize>| s.get(range)?.parse::<u32>().ok();
        let date = NaiveDate::from_ymd_opt(num(0..4)? as i32, num(4..6)?, num(6..8)?)?;
        let millis = match s.get(14..) {
            Some(frac) if !frac.is_empty() => {
                let digits = frac.strip_prefix('.')?;
                format!("{:0<3}", digits).get(..3)?.parse::<u32>().ok()?
            }
            _ => 0,
        };
        date.and_hms_milli_opt(num(8..10)?, num(10..12)?, num(12..14)?, millis)
    }
}

/// Status plus the fix, present exactly when status is [`GnssStatus::Fix`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GnssReport {
    /// Engine state
    pub status: GnssStatus,
    /// Navigation data
    pub info: Option<GnssInfo>,
}

impl GnssReport {
    fn status(status: GnssStatus) -> Self {
        Self { status, info: None }
    }
}

/// Decode a `+CGNSPWR: ` reply
pub fn parse_gnss_power(frame: &ResponseFrame) -> GnssStatus {
    if frame.is_error() {
        return GnssStatus::Error;
    }
    frame
        .cursor_after(anchor::CGNSPWR)
        .and_then(|c| c.peek())
        .map_or(GnssStatus::Error, GnssStatus::from_power_char)
}

/// Decode a polled `+CGNSINF: ` or unsolicited `+UGNSINF: ` reply
pub fn parse_gnss_info(frame: &ResponseFrame) -> GnssReport {
    let cursor = frame
        .cursor_after(anchor::CGNSINF)
        .or_else(|| frame.cursor_after(anchor::UGNSINF));
    match cursor {
        Some(mut cursor) => parse_gnss_sentence(cursor.take_until(b'\r')),
        None => GnssReport::status(GnssStatus::Error),
    }
}

/// Decode the comma separated fields of a navigation sentence.
///
/// A fix is all or nothing: if any field is missing or malformed the
/// result is [`GnssStatus::Error`].
pub fn parse_gnss_sentence(sentence: &[u8]) -> GnssReport {
    let Ok(text) = std::str::from_utf8(sentence) else {
        return GnssReport::status(GnssStatus::Error);
    };
    let fields: Vec<&str> = text.trim().split(',').collect();
    match (fields.first().copied(), fields.get(1).copied()) {
        (Some("1"), Some("1")) => {}
        (Some("1"), Some(_)) => return GnssReport::status(GnssStatus::NotFix),
        (Some("0"), _) => return GnssReport::status(GnssStatus::PowerOff),
        _ => return GnssReport::status(GnssStatus::Error),
    }
    if fields.len() < GNSS_FIELDS {
        tracing::warn!("GNSS sentence has {} fields", fields.len());
        return GnssReport::status(GnssStatus::Error);
    }
    match fix_from_fields(&fields) {
        Some(info) => GnssReport {
            status: GnssStatus::Fix,
            info: Some(info),
        },
        None => {
            tracing::warn!("malformed GNSS sentence: {}", text);
            GnssReport::status(GnssStatus::Error)
        }
    }
}

fn fix_from_fields(fields: &[&str]) -> Option<GnssInfo> {
    let float = |i: usize| fields.get(i)?.parse::<f64>().ok();
    let count = |i: usize| fields.get(i)?.parse::<u8>().ok();
    let utc = fields.get(2).filter(|s| !s.is_empty())?;
    Some(GnssInfo {
        utc: (*utc).to_string(),
        latitude: float(3)?,
        longitude: float(4)?,
        altitude: float(5)?,
        speed: float(6)?,
        heading: float(7)?,
        fix_mode: count(8)?,
        hdop: float(10)?,
        pdop: float(11)?,
        vdop: float(12)?,
        satellites_in_view: count(14)?,
        satellites_used: count(15)?,
    })
}

impl<T: Transport> Modem<T> {
    /// Switch the GNSS engine on
    pub fn power_on_gnss(&mut self) -> bool {
        let timeout = self.config.default_timeout();
        let ok = self.command_ok(&Command::GnssPowerOn.plain(), timeout);
        if !ok {
            tracing::warn!("unable to power on GNSS");
        }
        ok
    }

    /// Switch the GNSS engine off
    pub fn power_off_gnss(&mut self) -> bool {
        let timeout = self.config.default_timeout();
        let ok = self.command_ok(&Command::GnssPowerOff.plain(), timeout);
        if !ok {
            tracing::warn!("unable to power off GNSS");
        }
        ok
    }

    /// GNSS engine power state
    pub fn get_gnss_power_status(&mut self) -> GnssStatus {
        let timeout = self.config.default_timeout();
        match self
            .engine
            .transact(&Command::GnssPowerQuery.plain(), DEFAULT_CRLF, timeout)
        {
            Ok(frame) => parse_gnss_power(frame),
            Err(e) => {
                tracing::warn!("GNSS power query failed: {}", e);
                GnssStatus::Error
            }
        }
    }

    /// Report navigation data unsolicited every `interval` fixes.
    ///
    /// Fails without sending anything unless the engine is powered on.
    pub fn attach_gnss(&mut self, interval: u8) -> bool {
        let power = self.get_gnss_power_status();
        if power != GnssStatus::PowerOn {
            tracing::warn!("GNSS attach refused, engine is {}", power);
            return false;
        }
        let timeout = self.config.default_timeout();
        self.command_ok(
            &Command::GnssUrcReport.with_param(&interval.to_string()),
            timeout,
        )
    }

    /// Stop unsolicited navigation reports
    pub fn detach_gnss(&mut self) -> bool {
        let timeout = self.config.default_timeout();
        self.command_ok(&Command::GnssUrcReport.with_param("0"), timeout)
    }

    /// Poll the current navigation data
    pub fn get_gnss_info(&mut self) -> GnssReport {
        let timeout = self.config.default_timeout();
        match self
            .engine
            .transact(&Command::GnssInfo.plain(), GNSS_INFO_CRLF, timeout)
        {
            Ok(frame) => parse_gnss_info(frame),
            Err(e) => {
                tracing::warn!("unable to get GNSS info: {}", e);
                GnssReport::status(GnssStatus::Error)
            }
        }
    }

    /// Wait for the next `+UGNSINF` report after [`attach_gnss`](Self::attach_gnss)
    pub fn next_gnss_urc(&mut self, timeout: Duration) -> GnssReport {
        match self.engine.read_response(DEFAULT_CRLF, timeout) {
            Ok(frame) if frame.contains(anchor::UGNSINF) => parse_gnss_info(frame),
            Ok(frame) => {
                tracing::debug!("not a GNSS report: {:?}", frame);
                GnssReport::status(GnssStatus::Error)
            }
            Err(e) => {
                tracing::debug!("no GNSS report: {}", e);
                GnssReport::status(GnssStatus::Error)
            }
        }
    }
}
