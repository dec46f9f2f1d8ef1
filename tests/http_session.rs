//! HTTP sessions against the virtual SIM808

mod common;

use common::{commands, sim808_with, BUDGET_MS};
use sim808_core::core::http::HttpParam;
use sim808_core::{http_status_code, HttpError, HttpRequest, ResponseRule};

const URL: &str = "http://example.com";

#[test]
fn get_returns_status_and_body() {
    let mut modem = sim808_with(vec![]);
    let result = modem.http_get(URL, None, BUDGET_MS);

    assert_eq!(result, Ok(200));
    assert_eq!(modem.received(), b"hello");
    assert_eq!(modem.payload().len(), 5);
    assert!(!modem.payload().is_truncated());
    assert_eq!(
        commands(&modem),
        vec![
            "AT+HTTPINIT",
            "AT+HTTPPARA=\"CID\",1",
            "AT+HTTPPARA=\"URL\",\"http://example.com\"",
            "ATI",
            "AT+HTTPSSL=0",
            "AT+HTTPACTION=0",
            "AT+HTTPREAD",
            "AT+HTTPTERM",
        ]
    );
}

#[test]
fn https_switches_ssl_on() {
    let mut modem = sim808_with(vec![]);
    assert_eq!(modem.http_get("https://example.com", None, BUDGET_MS), Ok(200));
    let sent = commands(&modem);
    assert!(sent.contains(&"AT+HTTPSSL=1".to_string()));
    assert!(!sent.contains(&"AT+HTTPSSL=0".to_string()));
}

#[test]
fn old_firmware_skips_ssl_switch() {
    let mut modem = sim808_with(vec![ResponseRule::exact(
        "ATI",
        "\r\nSIM808 R13.08\r\n\r\nOK\r\n",
    )]);
    assert_eq!(modem.http_get("https://example.com", None, BUDGET_MS), Ok(200));
    assert!(!commands(&modem).iter().any(|c| c.starts_with("AT+HTTPSSL")));
}

#[test]
fn unreadable_version_skips_ssl_switch() {
    let mut modem = sim808_with(vec![ResponseRule::silent("ATI")]);
    assert_eq!(modem.http_get(URL, None, BUDGET_MS), Ok(200));
    assert!(!commands(&modem).iter().any(|c| c.starts_with("AT+HTTPSSL")));
}

#[test]
fn headers_are_sent_quoted() {
    let mut modem = sim808_with(vec![]);
    assert_eq!(modem.http_get(URL, Some("X-Api-Key: 42"), BUDGET_MS), Ok(200));
    let userdata = "AT+HTTPPARA=\"USERDATA\",\"X-Api-Key: 42\"".to_string();
    assert!(commands(&modem).contains(&userdata));
}

#[test]
fn post_streams_payload_and_reads_answer() {
    let mut modem = sim808_with(vec![]);
    let body = b"{\"a\":1}";
    let result = modem.http_post(URL, None, "application/json", body, 2000, BUDGET_MS);

    assert_eq!(result, Ok(201));
    assert_eq!(modem.received(), b"hello");
    let sent = commands(&modem);
    assert!(sent.contains(&"AT+HTTPPARA=\"CONTENT\",\"application/json\"".to_string()));
    assert!(sent.contains(&"AT+HTTPDATA=7,2000".to_string()));
    assert!(modem.transport().written().iter().any(|w| w == body));
}

#[test]
fn post_without_download_prompt_is_707() {
    let mut modem = sim808_with(vec![ResponseRule::silent("AT+HTTPDATA")]);
    let body = b"{\"a\":1}";
    let result = modem.http_post(URL, None, "application/json", body, 2000, BUDGET_MS);

    assert_eq!(result, Err(HttpError::Payload));
    assert_eq!(http_status_code(&result), 707);
    assert!(!modem.transport().written().iter().any(|w| w == body));
    let sent = commands(&modem);
    assert!(!sent.contains(&"AT+HTTPACTION=1".to_string()));
    assert_eq!(sent.last().map(String::as_str), Some("AT+HTTPTERM"));
}

#[test]
fn non_success_status_skips_read() {
    let mut modem = sim808_with(vec![ResponseRule::exact(
        "AT+HTTPACTION=0",
        "\r\nOK\r\n\r\n+HTTPACTION: 0,404,12\r\n",
    )]);
    assert_eq!(modem.http_get(URL, None, BUDGET_MS), Ok(404));
    assert!(modem.received().is_empty());
    let sent = commands(&modem);
    assert!(!sent.contains(&"AT+HTTPREAD".to_string()));
    assert_eq!(sent.last().map(String::as_str), Some("AT+HTTPTERM"));
}

#[test]
fn missing_completion_is_408() {
    let mut modem = sim808_with(vec![ResponseRule::exact("AT+HTTPACTION=0", "\r\nOK\r\n")]);
    let result = modem.http_get(URL, None, BUDGET_MS);
    assert_eq!(result, Err(HttpError::ServerTimeout));
    assert_eq!(http_status_code(&result), 408);
}

#[test]
fn completion_for_other_method_is_703() {
    let mut modem = sim808_with(vec![ResponseRule::exact(
        "AT+HTTPACTION=0",
        "\r\nOK\r\n\r\n+HTTPACTION: 1,200,5\r\n",
    )]);
    assert_eq!(modem.http_get(URL, None, BUDGET_MS), Err(HttpError::Action));
}

#[test]
fn unacknowledged_action_is_703() {
    let mut modem = sim808_with(vec![ResponseRule::exact("AT+HTTPACTION=0", "\r\nERROR\r\n")]);
    let result = modem.http_get(URL, None, BUDGET_MS);
    assert_eq!(http_status_code(&result), 703);
}

#[test]
fn init_failure_is_701_and_stops() {
    let mut modem = sim808_with(vec![ResponseRule::exact("AT+HTTPINIT", "\r\nERROR\r\n")]);
    assert_eq!(modem.http_get(URL, None, BUDGET_MS), Err(HttpError::Init));
    assert_eq!(commands(&modem), vec!["AT+HTTPINIT"]);
}

#[test]
fn rejected_url_is_702_and_session_is_closed() {
    let mut modem = sim808_with(vec![ResponseRule::reply(
        "AT+HTTPPARA=\"URL\"",
        "\r\nERROR\r\n",
    )]);
    let result = modem.http_get(URL, None, BUDGET_MS);
    assert_eq!(result, Err(HttpError::Config(HttpParam::Url)));
    assert_eq!(http_status_code(&result), 702);
    assert_eq!(commands(&modem).last().map(String::as_str), Some("AT+HTTPTERM"));
}

#[test]
fn rejected_content_type_is_702() {
    let mut modem = sim808_with(vec![ResponseRule::reply(
        "AT+HTTPPARA=\"CONTENT\"",
        "\r\nERROR\r\n",
    )]);
    let result = modem.http_post(URL, None, "text/plain", b"x", 2000, BUDGET_MS);
    assert_eq!(result, Err(HttpError::Config(HttpParam::ContentType)));
}

fn assert_rejected_param(
    overrides: Vec<ResponseRule>,
    url: &str,
    headers: Option<&str>,
    param: HttpParam,
) {
    let mut modem = sim808_with(overrides);
    let result = modem.http_get(url, headers, BUDGET_MS);
    assert_eq!(result, Err(HttpError::Config(param)));
    assert_eq!(http_status_code(&result), 702);
    let sent = commands(&modem);
    assert!(!sent.contains(&"AT+HTTPACTION=0".to_string()));
    assert_eq!(sent.last().map(String::as_str), Some("AT+HTTPTERM"));
}

#[test]
fn rejected_bearer_is_702() {
    assert_rejected_param(
        vec![ResponseRule::exact("AT+HTTPPARA=\"CID\",1", "\r\nERROR\r\n")],
        URL,
        None,
        HttpParam::Bearer,
    );
}

#[test]
fn rejected_headers_are_702() {
    assert_rejected_param(
        vec![ResponseRule::reply("AT+HTTPPARA=\"USERDATA\"", "\r\nERROR\r\n")],
        URL,
        Some("X-Api-Key: 42"),
        HttpParam::Headers,
    );
}

#[test]
fn rejected_ssl_switch_is_702() {
    assert_rejected_param(
        vec![ResponseRule::exact("AT+HTTPSSL=1", "\r\nERROR\r\n")],
        "https://example.com",
        None,
        HttpParam::Ssl,
    );
}

#[test]
fn terminate_failure_overrides_status() {
    let mut modem = sim808_with(vec![ResponseRule::exact("AT+HTTPTERM", "\r\nERROR\r\n")]);
    let result = modem.http_get(URL, None, BUDGET_MS);
    assert_eq!(result, Err(HttpError::Terminate));
    assert_eq!(http_status_code(&result), 706);
}

#[test]
fn terminate_failure_overrides_phase_error() {
    let mut modem = sim808_with(vec![
        ResponseRule::exact("AT+HTTPACTION=0", "\r\nERROR\r\n"),
        ResponseRule::exact("AT+HTTPTERM", "\r\nERROR\r\n"),
    ]);
    assert_eq!(modem.http_get(URL, None, BUDGET_MS), Err(HttpError::Terminate));
}

#[test]
fn oversized_body_is_truncated_to_capacity() {
    let mut modem = sim808_with(vec![
        ResponseRule::exact("AT+HTTPACTION=0", "\r\nOK\r\n\r\n+HTTPACTION: 0,200,600\r\n"),
        ResponseRule::exact(
            "AT+HTTPREAD",
            &format!("\r\n+HTTPREAD: 600\r\n{}\r\nOK\r\n", "x".repeat(600)),
        ),
    ]);
    assert_eq!(modem.http_get(URL, None, BUDGET_MS), Ok(200));
    assert_eq!(modem.received().len(), modem.payload().capacity());
    assert_eq!(modem.payload().capacity(), 512);
    assert_eq!(modem.payload().declared(), 600);
    assert!(modem.payload().is_truncated());
}

#[test]
fn line_breaks_inside_body_are_dropped() {
    let mut modem = sim808_with(vec![ResponseRule::exact(
        "AT+HTTPREAD",
        "\r\n+HTTPREAD: 5\r\nhel\r\nlo\r\nOK\r\n",
    )]);
    assert_eq!(modem.http_get(URL, None, BUDGET_MS), Ok(200));
    assert_eq!(modem.received(), b"hello");
}

#[test]
fn missing_trailing_ok_is_705() {
    let mut modem = sim808_with(vec![ResponseRule::exact(
        "AT+HTTPREAD",
        "\r\n+HTTPREAD: 5\r\nhello\r\nERROR\r\n",
    )]);
    assert_eq!(modem.http_get(URL, None, BUDGET_MS), Err(HttpError::Read));
}

#[test]
fn stalled_body_is_705() {
    let mut modem = sim808_with(vec![ResponseRule::exact(
        "AT+HTTPREAD",
        "\r\n+HTTPREAD: 5\r\nhel",
    )]);
    let result = modem.http_get(URL, None, BUDGET_MS);
    assert_eq!(http_status_code(&result), 705);
}

#[test]
fn missing_read_anchor_is_705() {
    let mut modem = sim808_with(vec![ResponseRule::exact("AT+HTTPREAD", "\r\nERROR\r\n")]);
    assert_eq!(modem.http_get(URL, None, BUDGET_MS), Err(HttpError::Read));
}

#[test]
fn previous_body_is_cleared() {
    let mut modem = sim808_with(vec![]);
    assert_eq!(modem.http_get(URL, None, BUDGET_MS), Ok(200));
    assert_eq!(modem.received(), b"hello");

    modem
        .transport_mut()
        .add_rule(ResponseRule::exact("AT+HTTPINIT", "\r\nERROR\r\n").priority(200));
    assert_eq!(modem.http_get(URL, None, BUDGET_MS), Err(HttpError::Init));
    assert!(modem.received().is_empty());
}

#[test]
fn request_builder_drives_session() {
    let mut modem = sim808_with(vec![]);
    let request = HttpRequest::post(URL, "text/plain", "ping")
        .headers("X-Trace: 1")
        .write_timeout_ms(500)
        .server_timeout_ms(BUDGET_MS);
    assert_eq!(modem.http(&request), Ok(201));
    assert!(commands(&modem).contains(&"AT+HTTPDATA=4,500".to_string()));
}
