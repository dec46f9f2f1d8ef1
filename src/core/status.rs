//! Device status and power management
//!
//! Signal, registration and power mode queries, the power transition guard,
//! GPRS bearer control and identification strings.

use crate::core::command::Command;
use crate::core::engine::DEFAULT_CRLF;
use crate::core::modem::Modem;
use crate::core::response::{anchor, extract_digits_at, find_anchor, ResponseFrame};
use crate::core::transport::Transport;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Functionality level reported by `+CFUN`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerMode {
    /// `0`: RF and SIM off
    Minimum,
    /// `1`: full functionality
    Normal,
    /// `4`: RF off
    Sleep,
    /// A value the driver does not know
    Unknown,
    /// No answer, or the device said `ERROR`
    Error,
}

impl PowerMode {
    /// Map the status character after `+CFUN: `
    pub fn from_status_char(c: u8) -> Self {
        match c {
            b'0' => Self::Minimum,
            b'1' => Self::Normal,
            b'4' => Self::Sleep,
            _ => Self::Unknown,
        }
    }

    /// Whether this is a concrete mode (not Unknown/Error)
    pub fn is_known(self) -> bool {
        !matches!(self, Self::Unknown | Self::Error)
    }

    /// Out of Sleep or Minimum only Normal is reachable
    pub fn can_transition_to(self, target: Self) -> bool {
        if !self.is_known() || !target.is_known() {
            return false;
        }
        match self {
            Self::Sleep | Self::Minimum => target == Self::Normal || target == self,
            _ => true,
        }
    }

    /// Command that switches to this mode
    pub fn command(self) -> Option<Command> {
        match self {
            Self::Minimum => Some(Command::PowerModeMinimum),
            Self::Normal => Some(Command::PowerModeNormal),
            Self::Sleep => Some(Command::PowerModeSleep),
            Self::Unknown | Self::Error => None,
        }
    }
}

impl fmt::Display for PowerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Minimum => "minimum",
            Self::Normal => "normal",
            Self::Sleep => "sleep",
            Self::Unknown => "unknown",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

impl FromStr for PowerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "minimum" | "min" | "0" => Ok(Self::Minimum),
            "normal" | "1" => Ok(Self::Normal),
            "sleep" | "4" => Ok(Self::Sleep),
            other => Err(format!("unknown power mode '{}'", other)),
        }
    }
}

/// Network registration reported by `+CREG`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkRegistration {
    /// `0`
    NotRegistered,
    /// `1`
    RegisteredHome,
    /// `2`
    Searching,
    /// `3`
    Denied,
    /// `5`
    RegisteredRoaming,
    /// Any other value, including `4`
    Unknown,
    /// No answer, or the device said `ERROR`
    Error,
}

impl NetworkRegistration {
    /// Map the status character after `+CREG: n,`
    pub fn from_status_char(c: u8) -> Self {
        match c {
            b'0' => Self::NotRegistered,
            b'1' => Self::RegisteredHome,
            b'2' => Self::Searching,
            b'3' => Self::Denied,
            b'5' => Self::RegisteredRoaming,
            _ => Self::Unknown,
        }
    }

    /// Home or roaming
    pub fn is_registered(self) -> bool {
        matches!(self, Self::RegisteredHome | Self::RegisteredRoaming)
    }
}

impl fmt::Display for NetworkRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotRegistered => "not registered",
            Self::RegisteredHome => "registered (home)",
            Self::Searching => "searching",
            Self::Denied => "denied",
            Self::RegisteredRoaming => "registered (roaming)",
            Self::Unknown => "unknown",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// Decode a `+CFUN: ` reply
pub fn parse_power_mode(frame: &ResponseFrame) -> PowerMode {
    if frame.is_error() {
        return PowerMode::Error;
    }
    frame
        .cursor_after(anchor::CFUN)
        .and_then(|c| c.peek())
        .map_or(PowerMode::Unknown, PowerMode::from_status_char)
}

/// Decode a `+CREG: <n>,<stat>` reply
pub fn parse_registration(frame: &ResponseFrame) -> NetworkRegistration {
    if frame.is_error() {
        return NetworkRegistration::Error;
    }
    // Skip the unsolicited-mode setting and its comma
    frame
        .cursor_after(anchor::CREG)
        .and_then(|c| c.skip(2).peek())
        .map_or(NetworkRegistration::Unknown, NetworkRegistration::from_status_char)
}

/// Decode a `+CSQ: <rssi>,<ber>` reply; anything unusable reads as 0
pub fn parse_signal(frame: &ResponseFrame) -> u8 {
    let Some(mut cursor) = frame.cursor_after(anchor::CSQ) else {
        return 0;
    };
    let value = cursor.digits(2).map(|(value, _)| value);
    let separated = cursor.expect(b',');
    match value {
        Some(value) if separated && value <= 31 => value as u8,
        _ => 0,
    }
}

/// Module identification from an `ATI` reply, e.g. `SIM808 R14.18`
pub fn parse_version(frame: &ResponseFrame) -> Option<String> {
    let mut cursor = frame.cursor_after(b"SIM")?;
    let tail = cursor.take_until(b'\r');
    let mut version = b"SIM".to_vec();
    version.extend_from_slice(tail);
    Some(String::from_utf8_lossy(&version).into_owned())
}

/// Two-digit release after the first `R` of a version string
pub fn firmware_release(version: &str) -> Option<u32> {
    let bytes = version.as_bytes();
    let idx = find_anchor(bytes, b"R", 0)?;
    extract_digits_at(bytes, idx + 1, 2)
}

impl<T: Transport> Modem<T> {
    /// `AT` answers `OK`
    pub fn is_ready(&mut self) -> bool {
        let timeout = self.config.default_timeout();
        self.command_ok(&Command::Base.plain(), timeout)
    }

    /// Signal quality 0..=31, 0 when unknown
    pub fn get_signal(&mut self) -> u8 {
        let timeout = self.config.default_timeout();
        match self
            .engine
            .transact(&Command::SignalQuality.plain(), DEFAULT_CRLF, timeout)
        {
            Ok(frame) => parse_signal(frame),
            Err(e) => {
                tracing::warn!("signal query failed: {}", e);
                0
            }
        }
    }

    /// Current functionality level
    pub fn get_power_mode(&mut self) -> PowerMode {
        let timeout = self.config.default_timeout();
        match self
            .engine
            .transact(&Command::PowerModeQuery.plain(), DEFAULT_CRLF, timeout)
        {
            Ok(frame) => parse_power_mode(frame),
            Err(e) => {
                tracing::warn!("power mode query failed: {}", e);
                PowerMode::Error
            }
        }
    }

    /// Current network registration
    pub fn get_registration_status(&mut self) -> NetworkRegistration {
        let timeout = self.config.default_timeout();
        match self
            .engine
            .transact(&Command::RegistrationQuery.plain(), DEFAULT_CRLF, timeout)
        {
            Ok(frame) => parse_registration(frame),
            Err(e) => {
                tracing::warn!("registration query failed: {}", e);
                NetworkRegistration::Error
            }
        }
    }

    /// Module identification (`ATI`)
    pub fn get_version(&mut self) -> Option<String> {
        let timeout = self.config.default_timeout();
        let frame = self
            .engine
            .transact(&Command::Version.plain(), DEFAULT_CRLF, timeout)
            .ok()?;
        parse_version(frame)
    }

    /// Firmware revision (`AT+GMR`)
    pub fn get_firmware(&mut self) -> Option<String> {
        self.info_query(Command::Firmware)
    }

    /// SIM card identifier (`AT+CCID`)
    pub fn get_sim_card_number(&mut self) -> Option<String> {
        self.info_query(Command::SimCardId)
    }

    fn info_query(&mut self, command: Command) -> Option<String> {
        let timeout = self.config.default_timeout();
        let frame = self
            .engine
            .transact(&command.plain(), DEFAULT_CRLF, timeout)
            .ok()?;
        if frame.is_error() {
            return None;
        }
        frame.info_line(command.name())
    }

    /// Switch power mode, then confirm with a fresh query
    pub fn set_power_mode(&mut self, target: PowerMode) -> bool {
        let Some(command) = target.command() else {
            tracing::warn!("refusing power mode target {}", target);
            return false;
        };

        let current = self.get_power_mode();
        if !current.is_known() {
            tracing::warn!("current power mode is {}, not switching", current);
            return false;
        }
        if current == target {
            return true;
        }
        if !current.can_transition_to(target) {
            tracing::warn!("power mode {} -> {} not allowed", current, target);
            return false;
        }

        // The acknowledgement is not trusted; the re-query decides
        let timeout = self.config.default_timeout();
        if let Err(e) = self.engine.transact(&command.plain(), DEFAULT_CRLF, timeout) {
            tracing::debug!("{}: {}", command, e);
        }

        let after = self.get_power_mode();
        tracing::info!("power mode {} -> {} (now {})", current, target, after);
        after == target
    }

    /// Configure bearer profile 1 for GPRS on `apn`
    pub fn setup_gprs(&mut self, apn: &str) -> bool {
        let timeout = self.config.bearer_timeout();
        self.command_ok(&Command::BearerContype.plain(), timeout)
            && self.command_ok(&Command::BearerApn.with_param(apn), timeout)
    }

    /// Open bearer profile 1
    pub fn connect_gprs(&mut self) -> bool {
        let timeout = self.config.gprs_timeout();
        self.command_ok(&Command::BearerOpen.plain(), timeout)
    }

    /// Close bearer profile 1
    pub fn disconnect_gprs(&mut self) -> bool {
        let timeout = self.config.gprs_timeout();
        self.command_ok(&Command::BearerClose.plain(), timeout)
    }

    /// Cycle through minimum power and back to normal, then purge the link
    pub fn soft_reset(&mut self) -> bool {
        let mut restored = false;
        if self.set_power_mode(PowerMode::Minimum) {
            std::thread::sleep(self.config.reset_delay());
            restored = self.set_power_mode(PowerMode::Normal);
        } else {
            tracing::warn!("soft reset: could not enter minimum power mode");
        }
        if let Err(e) = self.engine.transport_mut().purge() {
            tracing::warn!("soft reset: purge failed: {}", e);
        }
        restored
    }
}
