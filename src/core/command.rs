//! AT command catalogue and wire rendering
//!
//! Commands are rendered either verbatim or as `name"parameter"`. The
//! parameter is wrapped in exactly one pair of quotes and is never escaped;
//! callers pass pre-escaped text.

use std::fmt;

/// Line terminator written after every command
pub const LINE_TERMINATOR: &[u8] = b"\r\n";

/// Known modem directives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// `AT` link check
    Base,
    /// `AT+CSQ` signal quality
    SignalQuality,
    /// `ATI` module version
    Version,
    /// `AT+GMR` firmware revision
    Firmware,
    /// `AT+CCID` SIM card identifier
    SimCardId,
    /// `AT+CFUN?` current power mode
    PowerModeQuery,
    /// `AT+CFUN=0`
    PowerModeMinimum,
    /// `AT+CFUN=1`
    PowerModeNormal,
    /// `AT+CFUN=4`
    PowerModeSleep,
    /// `AT+CREG?` network registration
    RegistrationQuery,
    /// Bearer profile 1 uses GPRS
    BearerContype,
    /// Bearer profile 1 APN, takes the APN as parameter
    BearerApn,
    /// Open bearer 1
    BearerOpen,
    /// Close bearer 1
    BearerClose,
    /// `AT+HTTPINIT`
    HttpInit,
    /// Bind HTTP to bearer 1
    HttpBearer,
    /// Target URL, takes the URL as parameter
    HttpUrl,
    /// Extra request headers, takes the header block as parameter
    HttpUserData,
    /// POST content type, takes the MIME type as parameter
    HttpContentType,
    /// `AT+HTTPSSL=1`
    HttpSslOn,
    /// `AT+HTTPSSL=0`
    HttpSslOff,
    /// `AT+HTTPACTION=0`
    HttpActionGet,
    /// `AT+HTTPACTION=1`
    HttpActionPost,
    /// `AT+HTTPREAD`
    HttpRead,
    /// `AT+HTTPTERM`
    HttpTerminate,
    /// `AT+CGNSPWR=1`
    GnssPowerOn,
    /// `AT+CGNSPWR=0`
    GnssPowerOff,
    /// `AT+CGNSPWR?`
    GnssPowerQuery,
    /// URC report interval, takes the interval as parameter
    GnssUrcReport,
    /// `AT+CGNSINF` navigation information
    GnssInfo,
}

impl Command {
    /// Literal command text, without parameter or terminator
    pub fn name(self) -> &'static str {
        match self {
            Self::Base => "AT",
            Self::SignalQuality => "AT+CSQ",
            Self::Version => "ATI",
            Self::Firmware => "AT+GMR",
            Self::SimCardId => "AT+CCID",
            Self::PowerModeQuery => "AT+CFUN?",
            Self::PowerModeMinimum => "AT+CFUN=0",
            Self::PowerModeNormal => "AT+CFUN=1",
            Self::PowerModeSleep => "AT+CFUN=4",
            Self::RegistrationQuery => "AT+CREG?",
            Self::BearerContype => "AT+SAPBR=3,1,\"Contype\",\"GPRS\"",
            Self::BearerApn => "AT+SAPBR=3,1,\"APN\",",
            Self::BearerOpen => "AT+SAPBR=1,1",
            Self::BearerClose => "AT+SAPBR=0,1",
            Self::HttpInit => "AT+HTTPINIT",
            Self::HttpBearer => "AT+HTTPPARA=\"CID\",1",
            Self::HttpUrl => "AT+HTTPPARA=\"URL\",",
            Self::HttpUserData => "AT+HTTPPARA=\"USERDATA\",",
            Self::HttpContentType => "AT+HTTPPARA=\"CONTENT\",",
            Self::HttpSslOn => "AT+HTTPSSL=1",
            Self::HttpSslOff => "AT+HTTPSSL=0",
            Self::HttpActionGet => "AT+HTTPACTION=0",
            Self::HttpActionPost => "AT+HTTPACTION=1",
            Self::HttpRead => "AT+HTTPREAD",
            Self::HttpTerminate => "AT+HTTPTERM",
            Self::GnssPowerOn => "AT+CGNSPWR=1",
            Self::GnssPowerOff => "AT+CGNSPWR=0",
            Self::GnssPowerQuery => "AT+CGNSPWR?",
            Self::GnssUrcReport => "AT+CGNSURC=",
            Self::GnssInfo => "AT+CGNSINF",
        }
    }

    /// Render without parameter
    pub fn plain(self) -> Vec<u8> {
        build(self.name(), None)
    }

    /// Render with a quoted parameter
    pub fn with_param(self, parameter: &str) -> Vec<u8> {
        build(self.name(), Some(parameter))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Render `name` or `name"parameter"` into wire bytes (terminator excluded)
pub fn build(name: &str, parameter: Option<&str>) -> Vec<u8> {
    match parameter {
        None => name.as_bytes().to_vec(),
        Some(param) => {
            let mut out = Vec::with_capacity(name.len() + param.len() + 2);
            out.extend_from_slice(name.as_bytes());
            out.push(b'"');
            out.extend_from_slice(param.as_bytes());
            out.push(b'"');
            out
        }
    }
}

/// `AT+HTTPDATA=<len>,<write budget ms>`; announces a POST payload
pub fn http_data(payload_len: usize, write_timeout_ms: u64) -> Vec<u8> {
    format!("AT+HTTPDATA={},{}", payload_len, write_timeout_ms).into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_form_is_verbatim() {
        assert_eq!(Command::SignalQuality.plain(), b"AT+CSQ");
        assert_eq!(build("AT+HTTPTERM", None), b"AT+HTTPTERM");
    }

    #[test]
    fn test_parameter_is_quoted_once() {
        for param in ["", "internet", "http://example.com/a?b=c", "say \\\"hi\\\""] {
            let rendered = Command::HttpUrl.with_param(param);
            let expected = format!("AT+HTTPPARA=\"URL\",\"{}\"", param);
            assert_eq!(rendered, expected.as_bytes());
        }
    }

    #[test]
    fn test_no_escaping_is_performed() {
        assert_eq!(build("X", Some("a\"b")), b"X\"a\"b\"");
    }

    #[test]
    fn test_http_data_directive() {
        assert_eq!(http_data(42, 2000), b"AT+HTTPDATA=42,2000");
    }

    #[test]
    fn test_display_uses_name() {
        assert_eq!(Command::GnssInfo.to_string(), "AT+CGNSINF");
    }
}
