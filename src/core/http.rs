//! HTTP/HTTPS sessions over the module's built-in HTTP stack
//!
//! One call runs the whole session: `HTTPINIT`, parameters, optional SSL
//! switch, optional POST body, the action itself, the asynchronous
//! `+HTTPACTION` completion, the body read and finally `HTTPTERM`.
//! Each phase that fails maps to its own [`HttpError`] and numeric code.

use crate::core::command::{http_data, Command};
use crate::core::engine::DEFAULT_CRLF;
use crate::core::modem::Modem;
use crate::core::response::{anchor, extract_digits_at, ResponseFrame};
use crate::core::status::firmware_release;
use crate::core::transport::Transport;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Default time the module waits for the POST body, in ms
pub const DEFAULT_WRITE_TIMEOUT_MS: u64 = 10_000;

/// Default time to wait for the server's answer, in ms
pub const DEFAULT_SERVER_TIMEOUT_MS: u64 = 30_000;

/// HTTP parameter that could not be set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpParam {
    /// Bearer profile binding
    Bearer,
    /// Target URL
    Url,
    /// Extra headers
    Headers,
    /// SSL on/off switch
    Ssl,
    /// POST content type
    ContentType,
}

impl fmt::Display for HttpParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bearer => "bearer",
            Self::Url => "URL",
            Self::Headers => "headers",
            Self::Ssl => "SSL mode",
            Self::ContentType => "content type",
        };
        f.write_str(name)
    }
}

/// HTTP session failure
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpError {
    /// `HTTPINIT` was not acknowledged
    #[error("unable to init HTTP")]
    Init,

    /// A session parameter was rejected
    #[error("unable to set {0}")]
    Config(HttpParam),

    /// The action was not acknowledged or its completion was unreadable
    #[error("HTTP action failed")]
    Action,

    /// The body read broke protocol
    #[error("invalid data while reading HTTP result")]
    Read,

    /// `HTTPTERM` was not acknowledged
    #[error("unable to close HTTP session")]
    Terminate,

    /// The module never asked for the POST body
    #[error("module refused the payload")]
    Payload,

    /// No completion line within the server timeout
    #[error("server timeout")]
    ServerTimeout,
}

impl HttpError {
    /// Numeric code reported to callers
    pub fn code(&self) -> u16 {
        match self {
            Self::Init => 701,
            Self::Config(_) => 702,
            Self::Action => 703,
            Self::Read => 705,
            Self::Terminate => 706,
            Self::Payload => 707,
            Self::ServerTimeout => 408,
        }
    }
}

/// Collapse a session result into one number: server status or error code
pub fn http_status_code(result: &Result<u16, HttpError>) -> u16 {
    match result {
        Ok(status) => *status,
        Err(e) => e.code(),
    }
}

/// HTTP method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// Action 0
    Get,
    /// Action 1
    Post,
}

impl HttpMethod {
    fn action(self) -> Command {
        match self {
            Self::Get => Command::HttpActionGet,
            Self::Post => Command::HttpActionPost,
        }
    }

    fn completion_anchor(self) -> &'static [u8] {
        match self {
            Self::Get => anchor::HTTP_ACTION_GET,
            Self::Post => anchor::HTTP_ACTION_POST,
        }
    }

    /// Whether `status` means a body is waiting to be read
    pub fn is_success(self, status: u16) -> bool {
        match self {
            Self::Get => status == 200,
            Self::Post => (200..=205).contains(&status),
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => f.write_str("GET"),
            Self::Post => f.write_str("POST"),
        }
    }
}

/// One GET or POST
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Method
    pub method: HttpMethod,
    /// Target URL, `https://` switches SSL on where supported
    pub url: String,
    /// Header block for `USERDATA`, already escaped
    pub headers: Option<String>,
    /// POST content type
    pub content_type: String,
    /// POST body
    pub body: Vec<u8>,
    /// Time the module waits for the POST body
    pub write_timeout_ms: u64,
    /// Time to wait for the server's answer
    pub server_timeout_ms: u64,
}

impl HttpRequest {
    /// GET `url`
    pub fn get(url: &str) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.to_string(),
            headers: None,
            content_type: String::new(),
            body: Vec::new(),
            write_timeout_ms: DEFAULT_WRITE_TIMEOUT_MS,
            server_timeout_ms: DEFAULT_SERVER_TIMEOUT_MS,
        }
    }

    /// POST `body` to `url`
    pub fn post(url: &str, content_type: &str, body: impl Into<Vec<u8>>) -> Self {
        Self {
            method: HttpMethod::Post,
            content_type: content_type.to_string(),
            body: body.into(),
            ..Self::get(url)
        }
    }

    /// Set extra headers
    #[must_use]
    pub fn headers(mut self, headers: &str) -> Self {
        self.headers = Some(headers.to_string());
        self
    }

    /// Set the POST body write budget
    #[must_use]
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.write_timeout_ms = ms;
        self
    }

    /// Set the server answer budget
    #[must_use]
    pub fn server_timeout_ms(mut self, ms: u64) -> Self {
        self.server_timeout_ms = ms;
        self
    }

    fn is_https(&self) -> bool {
        self.url
            .get(..8)
            .is_some_and(|scheme| scheme.eq_ignore_ascii_case("https://"))
    }
}

/// Fields of a `+HTTPACTION: <method>,<status>,<length>` line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionResult {
    /// Three-digit server status
    pub status: u16,
    /// Announced body length
    pub content_length: usize,
}

/// Read the completion line for `method`.
///
/// Status is the three digits right after the anchor; the length follows
/// the next comma. Returns `None` when the anchor is missing or the status
/// is not three digits.
pub fn parse_action_result(frame: &ResponseFrame, method: HttpMethod) -> Option<ActionResult> {
    let needle = method.completion_anchor();
    let base = frame.find(needle)? + needle.len();
    let data = frame.as_bytes();
    let status = extract_digits_at(data, base, 3).filter(|s| *s >= 100)?;
    let content_length = extract_digits_at(data, base + 4, 10).unwrap_or(0);
    Some(ActionResult {
        status: status as u16,
        content_length: content_length as usize,
    })
}

impl<T: Transport> Modem<T> {
    /// GET `url`; the body ends up in [`received`](Modem::received)
    pub fn http_get(
        &mut self,
        url: &str,
        headers: Option<&str>,
        server_timeout_ms: u64,
    ) -> Result<u16, HttpError> {
        let mut request = HttpRequest::get(url).server_timeout_ms(server_timeout_ms);
        request.headers = headers.map(str::to_string);
        self.http(&request)
    }

    /// POST `payload` to `url`; any response body ends up in [`received`](Modem::received)
    pub fn http_post(
        &mut self,
        url: &str,
        headers: Option<&str>,
        content_type: &str,
        payload: &[u8],
        write_timeout_ms: u64,
        server_timeout_ms: u64,
    ) -> Result<u16, HttpError> {
        let mut request = HttpRequest::post(url, content_type, payload)
            .write_timeout_ms(write_timeout_ms)
            .server_timeout_ms(server_timeout_ms);
        request.headers = headers.map(str::to_string);
        self.http(&request)
    }

    /// Run a complete HTTP session.
    ///
    /// `Ok` carries the server status, successful or not. Once `HTTPINIT`
    /// succeeded the session is always terminated; if that fails the result
    /// is [`HttpError::Terminate`] whatever happened before.
    pub fn http(&mut self, request: &HttpRequest) -> Result<u16, HttpError> {
        self.payload.clear();
        tracing::debug!("{} {}", request.method, request.url);

        let timeout = self.config.default_timeout();
        if !self.command_ok(&Command::HttpInit.plain(), timeout) {
            tracing::warn!("{} {}: unable to init HTTP", request.method, request.url);
            return Err(HttpError::Init);
        }

        match self.http_session(request) {
            Ok(status) => {
                self.http_terminate()?;
                tracing::info!("{} {} -> {}", request.method, request.url, status);
                Ok(status)
            }
            Err(e) => {
                tracing::warn!("{} {}: {} ({})", request.method, request.url, e, e.code());
                if self.http_terminate().is_err() {
                    return Err(HttpError::Terminate);
                }
                Err(e)
            }
        }
    }

    fn http_session(&mut self, request: &HttpRequest) -> Result<u16, HttpError> {
        let timeout = self.config.default_timeout();

        self.http_param(&Command::HttpBearer.plain(), HttpParam::Bearer)?;
        self.http_param(&Command::HttpUrl.with_param(&request.url), HttpParam::Url)?;
        if let Some(headers) = &request.headers {
            self.http_param(&Command::HttpUserData.with_param(headers), HttpParam::Headers)?;
        }

        if self.ssl_supported() {
            let ssl = if request.is_https() {
                Command::HttpSslOn
            } else {
                Command::HttpSslOff
            };
            self.http_param(&ssl.plain(), HttpParam::Ssl)?;
        } else {
            tracing::debug!("firmware without SSL stack, HTTPSSL skipped");
        }

        if request.method == HttpMethod::Post {
            self.http_param(
                &Command::HttpContentType.with_param(&request.content_type),
                HttpParam::ContentType,
            )?;
            self.http_upload(request)?;
        }

        if !self.command_ok(&request.method.action().plain(), timeout) {
            return Err(HttpError::Action);
        }

        let server_timeout = Duration::from_millis(request.server_timeout_ms);
        let frame = match self.engine.read_response(DEFAULT_CRLF, server_timeout) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!("waiting for server: {}", e);
                return Err(HttpError::ServerTimeout);
            }
        };
        let result = parse_action_result(frame, request.method).ok_or(HttpError::Action)?;
        tracing::debug!(
            "HTTP status {}, {} bytes announced",
            result.status,
            result.content_length
        );

        if request.method.is_success(result.status) {
            self.http_read(result.content_length)?;
        }
        Ok(result.status)
    }

    fn http_param(&mut self, command: &[u8], param: HttpParam) -> Result<(), HttpError> {
        let timeout = self.config.default_timeout();
        if self.command_ok(command, timeout) {
            Ok(())
        } else {
            Err(HttpError::Config(param))
        }
    }

    /// Firmware release is new enough for `HTTPSSL`; unknown means no
    fn ssl_supported(&mut self) -> bool {
        let Some(version) = self.get_version() else {
            return false;
        };
        match firmware_release(&version) {
            Some(release) => release >= self.config.ssl_min_release,
            None => false,
        }
    }

    fn http_upload(&mut self, request: &HttpRequest) -> Result<(), HttpError> {
        let timeout = self.config.default_timeout();
        let announce = http_data(request.body.len(), request.write_timeout_ms);
        if !self
            .engine
            .transact_expect(&announce, anchor::DOWNLOAD, DEFAULT_CRLF, timeout)
        {
            return Err(HttpError::Payload);
        }
        if let Err(e) = self.engine.write_raw(&request.body) {
            tracing::warn!("writing payload: {}", e);
            return Err(HttpError::Payload);
        }
        std::thread::sleep(self.config.payload_settle());
        Ok(())
    }

    fn http_read(&mut self, content_length: usize) -> Result<(), HttpError> {
        let timeout = self.config.default_timeout();
        if !self.engine.transact_expect(
            &Command::HttpRead.plain(),
            anchor::HTTP_READ,
            DEFAULT_CRLF,
            timeout,
        ) {
            return Err(HttpError::Read);
        }

        let storage = self.payload.prepare(content_length);
        let copy = self
            .engine
            .read_payload(storage, content_length, timeout)
            .map_err(|e| {
                tracing::warn!("reading HTTP body: {}", e);
                HttpError::Read
            })?;
        self.payload.set_len(copy.stored);

        if !self.engine.expect(anchor::OK, DEFAULT_CRLF, timeout) {
            return Err(HttpError::Read);
        }
        Ok(())
    }

    fn http_terminate(&mut self) -> Result<(), HttpError> {
        let timeout = self.config.default_timeout();
        if self.command_ok(&Command::HttpTerminate.plain(), timeout) {
            Ok(())
        } else {
            tracing::warn!("unable to close HTTP session");
            Err(HttpError::Terminate)
        }
    }
}
