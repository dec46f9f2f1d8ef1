//! Virtual SIM808
//!
//! A scriptable in-process modem that implements [`Transport`]. Each write
//! that ends in CRLF is one command line; the first matching rule decides
//! the reply. Replies are held back until the driver next polls for input,
//! so the purge that follows every command never eats them.

use crate::core::transport::{Transport, TransportError, TransportStats};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Response rule condition, evaluated against one command line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MatchCondition {
    /// Whole line equals
    Exact {
        /// Expected line, without terminator
        line: String,
    },
    /// Line starts with
    Prefix {
        /// Leading text
        prefix: String,
    },
    /// Line contains
    Text {
        /// Text found anywhere in the line
        text: String,
    },
    /// Match any line
    Any,
}

impl MatchCondition {
    /// Check if a command line matches this condition
    pub fn matches(&self, line: &str) -> bool {
        match self {
            Self::Exact { line: expected } => line == expected,
            Self::Prefix { prefix } => line.starts_with(prefix.as_str()),
            Self::Text { text } => line.contains(text.as_str()),
            Self::Any => true,
        }
    }
}

/// What the device sends back
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ResponseAction {
    /// Send fixed bytes
    Send {
        /// Raw reply
        data: Vec<u8>,
    },
    /// Send text
    SendText {
        /// Reply text
        text: String,
    },
    /// Several replies back to back
    Sequence {
        /// Replies in order
        actions: Vec<ResponseAction>,
    },
    /// Stay silent
    None,
}

impl ResponseAction {
    /// Bytes produced by this action
    pub fn bytes(&self) -> Vec<u8> {
        match self {
            Self::Send { data } => data.clone(),
            Self::SendText { text } => text.as_bytes().to_vec(),
            Self::Sequence { actions } => actions.iter().flat_map(ResponseAction::bytes).collect(),
            Self::None => Vec::new(),
        }
    }
}

/// A response rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseRule {
    /// Rule name
    pub name: String,
    /// Match condition
    pub condition: MatchCondition,
    /// Response action
    pub action: ResponseAction,
    /// Priority (higher = checked first)
    #[serde(default)]
    pub priority: i32,
    /// Enabled
    #[serde(default = "enabled_default")]
    pub enabled: bool,
    /// One-shot (disable after first match)
    #[serde(default)]
    pub one_shot: bool,
    /// Match count
    #[serde(default)]
    pub match_count: u64,
}

fn enabled_default() -> bool {
    true
}

impl ResponseRule {
    /// Reply `text` to lines starting with `prefix`
    pub fn reply(prefix: &str, text: &str) -> Self {
        Self {
            name: prefix.to_string(),
            condition: MatchCondition::Prefix {
                prefix: prefix.to_string(),
            },
            action: ResponseAction::SendText {
                text: text.to_string(),
            },
            priority: 0,
            enabled: true,
            one_shot: false,
            match_count: 0,
        }
    }

    /// Reply `text` to the exact line `line`
    pub fn exact(line: &str, text: &str) -> Self {
        Self {
            condition: MatchCondition::Exact {
                line: line.to_string(),
            },
            ..Self::reply(line, text)
        }
    }

    /// Never answer lines starting with `prefix`
    pub fn silent(prefix: &str) -> Self {
        Self {
            action: ResponseAction::None,
            ..Self::reply(prefix, "")
        }
    }

    /// Set priority
    #[must_use]
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Disable after the first match
    #[must_use]
    pub fn once(mut self) -> Self {
        self.one_shot = true;
        self
    }
}

/// Rules loaded from a TOML script
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimulationScript {
    /// Device name
    #[serde(default)]
    pub name: String,
    /// Rules in any order; priority decides
    #[serde(default)]
    pub rules: Vec<ResponseRule>,
}

/// Virtual device
pub struct VirtualModem {
    name: String,
    rules: Vec<ResponseRule>,
    echo: bool,
    pending: VecDeque<u8>,
    rx: VecDeque<u8>,
    written: Vec<Vec<u8>>,
    stats: TransportStats,
}

impl VirtualModem {
    /// Create a device with no rules; it never answers
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            rules: Vec::new(),
            echo: false,
            pending: VecDeque::new(),
            rx: VecDeque::new(),
            written: Vec::new(),
            stats: TransportStats::default(),
        }
    }

    /// Build a device from a TOML script
    pub fn from_script(source: &str) -> Result<Self, toml::de::Error> {
        let script: SimulationScript = toml::from_str(source)?;
        let mut device = Self::new(&script.name);
        for rule in script.rules {
            device.add_rule(rule);
        }
        Ok(device)
    }

    /// Echo each command line back before the reply
    pub fn set_echo(&mut self, echo: bool) {
        self.echo = echo;
    }

    /// Add a response rule
    pub fn add_rule(&mut self, rule: ResponseRule) {
        self.rules.push(rule);
        // Stable sort keeps insertion order among equal priorities
        self.rules.sort_by(|a, b| b.priority.cmp(&a.priority));
    }

    /// Builder form of [`add_rule`](Self::add_rule)
    #[must_use]
    pub fn with_rule(mut self, rule: ResponseRule) -> Self {
        self.add_rule(rule);
        self
    }

    /// Get all rules
    pub fn rules(&self) -> &[ResponseRule] {
        &self.rules
    }

    /// Queue unsolicited bytes (URCs, late replies)
    pub fn inject(&mut self, data: &[u8]) {
        self.pending.extend(data);
    }

    /// Every write call, in order
    pub fn written(&self) -> &[Vec<u8>] {
        &self.written
    }

    /// Command lines written so far, without terminators
    pub fn commands(&self) -> Vec<String> {
        self.written
            .iter()
            .filter_map(|w| w.strip_suffix(b"\r\n"))
            .map(|line| String::from_utf8_lossy(line).into_owned())
            .collect()
    }

    /// Device name
    pub fn name(&self) -> &str {
        &self.name
    }

    fn respond(&mut self, line: &str) {
        if self.echo {
            self.pending.extend(line.as_bytes());
            self.pending.extend(b"\r");
        }
        let Some(rule) = self
            .rules
            .iter_mut()
            .find(|r| r.enabled && r.condition.matches(line))
        else {
            tracing::trace!("{}: no rule for {:?}", self.name, line);
            return;
        };
        rule.match_count += 1;
        if rule.one_shot {
            rule.enabled = false;
        }
        let reply = rule.action.bytes();
        self.pending.extend(reply);
    }

    fn release(&mut self) {
        self.rx.extend(self.pending.drain(..));
    }
}

impl Transport for VirtualModem {
    fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.written.push(data.to_vec());
        self.stats.bytes_sent += data.len() as u64;
        self.stats.writes += 1;
        if let Some(line) = data.strip_suffix(b"\r\n") {
            let line = String::from_utf8_lossy(line).into_owned();
            self.respond(&line);
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    fn available(&mut self) -> Result<usize, TransportError> {
        self.release();
        Ok(self.rx.len())
    }

    fn read_byte(&mut self) -> Result<Option<u8>, TransportError> {
        self.release();
        let byte = self.rx.pop_front();
        if byte.is_some() {
            self.stats.bytes_received += 1;
        }
        Ok(byte)
    }

    // Only what already arrived is dropped; replies still in flight survive.
    fn purge(&mut self) -> Result<usize, TransportError> {
        let dropped = self.rx.len();
        self.rx.clear();
        self.stats.bytes_purged += dropped as u64;
        Ok(dropped)
    }

    fn connection_info(&self) -> String {
        format!("virtual modem '{}'", self.name)
    }

    fn stats(&self) -> TransportStats {
        self.stats.clone()
    }
}

/// Preset device templates
pub struct DeviceTemplates;

impl DeviceTemplates {
    /// A registered SIM808 on firmware R14 with a GNSS fix and a reachable
    /// HTTP server returning `hello`.
    pub fn sim808() -> VirtualModem {
        const OK: &str = "\r\nOK\r\n";
        VirtualModem::new("SIM808")
            .with_rule(ResponseRule::exact("AT", OK))
            .with_rule(ResponseRule::exact("AT+CSQ", "\r\n+CSQ: 23,0\r\n\r\nOK\r\n"))
            .with_rule(ResponseRule::exact("ATI", "\r\nSIM808 R14.18\r\n\r\nOK\r\n"))
            .with_rule(ResponseRule::exact(
                "AT+GMR",
                "\r\nRevision:1418B05SIM808M32\r\n\r\nOK\r\n",
            ))
            .with_rule(ResponseRule::exact("AT+CCID", "\r\n89014103211118510720\r\n\r\nOK\r\n"))
            .with_rule(ResponseRule::exact("AT+CFUN?", "\r\n+CFUN: 1\r\n\r\nOK\r\n"))
            .with_rule(ResponseRule::reply("AT+CFUN=", OK))
            .with_rule(ResponseRule::exact("AT+CREG?", "\r\n+CREG: 0,1\r\n\r\nOK\r\n"))
            .with_rule(ResponseRule::reply("AT+SAPBR", OK))
            .with_rule(ResponseRule::reply("AT+HTTPINIT", OK))
            .with_rule(ResponseRule::reply("AT+HTTPPARA", OK))
            .with_rule(ResponseRule::reply("AT+HTTPSSL", OK))
            .with_rule(ResponseRule::reply("AT+HTTPDATA", "\r\nDOWNLOAD\r\n"))
            .with_rule(ResponseRule::exact(
                "AT+HTTPACTION=0",
                "\r\nOK\r\n\r\n+HTTPACTION: 0,200,5\r\n",
            ))
            .with_rule(ResponseRule::exact(
                "AT+HTTPACTION=1",
                "\r\nOK\r\n\r\n+HTTPACTION: 1,201,5\r\n",
            ))
            .with_rule(ResponseRule::exact(
                "AT+HTTPREAD",
                "\r\n+HTTPREAD: 5\r\nhello\r\nOK\r\n",
            ))
            .with_rule(ResponseRule::exact("AT+HTTPTERM", OK))
            .with_rule(ResponseRule::exact("AT+CGNSPWR?", "\r\n+CGNSPWR: 1\r\n\r\nOK\r\n"))
            .with_rule(ResponseRule::reply("AT+CGNSPWR=", OK))
            .with_rule(ResponseRule::reply("AT+CGNSURC=", OK))
            .with_rule(ResponseRule::exact(
                "AT+CGNSINF",
                "\r\n+CGNSINF: 1,1,20161107115028.000,31.221783,121.354528,114.600,0.28,0.0,1,,1.9,2.1,1.0,,8,6,,,42,,\r\n\r\nOK\r\n",
            ))
    }
}
