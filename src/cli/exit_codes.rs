//! CLI Exit Codes
//!
//! Standard exit codes for CLI operations and automation.

use crate::config::ConfigError;
use crate::core::http::HttpError;
use crate::core::transport::TransportError;
use std::process::ExitCode;

/// Exit code constants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCodes;

impl ExitCodes {
    /// Success
    pub const SUCCESS: u8 = 0;

    /// General error
    pub const ERROR: u8 = 1;

    /// Invalid arguments
    pub const INVALID_ARGS: u8 = 2;

    /// Connection failed
    pub const CONNECTION_FAILED: u8 = 3;

    /// No answer in time
    pub const TIMEOUT: u8 = 4;

    /// Permission denied
    pub const PERMISSION_DENIED: u8 = 7;

    /// Configuration error
    pub const CONFIG_ERROR: u8 = 8;

    /// The module answered, but not as expected
    pub const PROTOCOL_ERROR: u8 = 9;

    /// Module not responding to `AT`
    pub const DEVICE_NOT_READY: u8 = 12;

    /// Port not found
    pub const PORT_NOT_FOUND: u8 = 14;

    /// HTTP session failed before a server status was known
    pub const HTTP_FAILED: u8 = 18;

    /// Server answered with a non-success status
    pub const HTTP_STATUS: u8 = 19;

    /// GNSS engine off or no fix
    pub const NO_FIX: u8 = 20;

    /// Internal error
    pub const INTERNAL_ERROR: u8 = 127;
}

/// CLI operation result
#[derive(Debug)]
pub enum CliResult {
    /// Success with optional message
    Success(Option<String>),

    /// Error with code and message
    Error(u8, String),
}

impl CliResult {
    /// Plain success
    pub fn success() -> Self {
        Self::Success(None)
    }

    /// Success with a message for the user
    pub fn success_with_message(msg: impl Into<String>) -> Self {
        Self::Success(Some(msg.into()))
    }

    /// Failure with an explicit code
    pub fn error(code: u8, msg: impl Into<String>) -> Self {
        Self::Error(code, msg.into())
    }

    /// Module did not do what was asked
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Error(ExitCodes::PROTOCOL_ERROR, msg.into())
    }

    /// Map an HTTP session result; a non-success server status is still a failure
    pub fn from_http(result: &Result<u16, HttpError>, success: bool) -> Self {
        match result {
            Ok(status) if success => Self::success_with_message(format!("HTTP {}", status)),
            Ok(status) => Self::Error(ExitCodes::HTTP_STATUS, format!("HTTP {}", status)),
            Err(HttpError::ServerTimeout) => Self::Error(
                ExitCodes::TIMEOUT,
                format!("{} ({})", HttpError::ServerTimeout, HttpError::ServerTimeout.code()),
            ),
            Err(e) => Self::Error(ExitCodes::HTTP_FAILED, format!("{} ({})", e, e.code())),
        }
    }

    /// Get exit code
    pub fn code(&self) -> u8 {
        match self {
            Self::Success(_) => ExitCodes::SUCCESS,
            Self::Error(code, _) => *code,
        }
    }

    /// Get message
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Success(Some(msg)) | Self::Error(_, msg) => Some(msg),
            Self::Success(None) => None,
        }
    }

    /// Convert to ExitCode
    pub fn to_exit_code(&self) -> ExitCode {
        ExitCode::from(self.code())
    }

    /// Is success?
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

impl From<TransportError> for CliResult {
    fn from(err: TransportError) -> Self {
        let code = match &err {
            TransportError::PortNotFound(_) => ExitCodes::PORT_NOT_FOUND,
            TransportError::PermissionDenied(_) => ExitCodes::PERMISSION_DENIED,
            TransportError::Timeout(_) => ExitCodes::TIMEOUT,
            TransportError::InvalidConfiguration(_) => ExitCodes::INVALID_ARGS,
            TransportError::ConnectionFailed(_) | TransportError::Disconnected => {
                ExitCodes::CONNECTION_FAILED
            }
            TransportError::IoError(_) => ExitCodes::ERROR,
        };
        Self::Error(code, err.to_string())
    }
}

impl From<ConfigError> for CliResult {
    fn from(err: ConfigError) -> Self {
        Self::Error(ExitCodes::CONFIG_ERROR, err.to_string())
    }
}

/// Exit code description
pub fn exit_code_description(code: u8) -> &'static str {
    match code {
        0 => "Success",
        1 => "General error",
        2 => "Invalid arguments",
        3 => "Connection failed",
        4 => "Timeout",
        7 => "Permission denied",
        8 => "Configuration error",
        9 => "Protocol error",
        12 => "Module not ready",
        14 => "Port not found",
        18 => "HTTP session failed",
        19 => "HTTP non-success status",
        20 => "No GNSS fix",
        127 => "Internal error",
        _ => "Unknown error",
    }
}

/// Print exit code table
pub fn print_exit_codes() {
    println!("Exit Codes:");
    for code in [0, 1, 2, 3, 4, 7, 8, 9, 12, 14, 18, 19, 20, 127] {
        println!("  {:>3}  {}", code, exit_code_description(code));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_result() {
        let success = CliResult::success();
        assert!(success.is_success());
        assert_eq!(success.code(), 0);

        let error = CliResult::error(3, "Connection failed");
        assert!(!error.is_success());
        assert_eq!(error.code(), 3);
        assert_eq!(error.message(), Some("Connection failed"));
    }

    #[test]
    fn test_from_transport_error() {
        let result = CliResult::from(TransportError::PortNotFound("/dev/ttyUSB9".into()));
        assert_eq!(result.code(), ExitCodes::PORT_NOT_FOUND);
        let result = CliResult::from(TransportError::Disconnected);
        assert_eq!(result.code(), ExitCodes::CONNECTION_FAILED);
    }

    #[test]
    fn test_from_http_result() {
        assert!(CliResult::from_http(&Ok(200), true).is_success());
        assert_eq!(CliResult::from_http(&Ok(404), false).code(), ExitCodes::HTTP_STATUS);
        assert_eq!(
            CliResult::from_http(&Err(HttpError::ServerTimeout), false).code(),
            ExitCodes::TIMEOUT
        );
        let failed = CliResult::from_http(&Err(HttpError::Payload), false);
        assert_eq!(failed.code(), ExitCodes::HTTP_FAILED);
        assert!(failed.message().unwrap().contains("707"));
    }

    #[test]
    fn test_every_listed_code_is_described() {
        for code in [0, 1, 2, 3, 4, 7, 8, 9, 12, 14, 18, 19, 20, 127] {
            assert_ne!(exit_code_description(code), "Unknown error");
        }
    }
}
