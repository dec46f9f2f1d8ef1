//! Shared helpers for the integration tests

#![allow(dead_code)]

use sim808_core::{DeviceTemplates, Modem, ModemConfig, ResponseRule, VirtualModem};
use std::time::Duration;

/// Command budget used by every test; silent rules cost this much
pub const BUDGET_MS: u64 = 100;

pub fn budget() -> Duration {
    Duration::from_millis(BUDGET_MS)
}

/// Modem with short budgets and no settle pauses
pub fn modem(device: VirtualModem) -> Modem<VirtualModem> {
    Modem::with_config(device, ModemConfig::default().with_timeouts(BUDGET_MS))
}

/// Happy-path SIM808 with `overrides` taking precedence over its rules.
///
/// Relative priorities among the overrides are kept.
pub fn sim808_with(overrides: Vec<ResponseRule>) -> Modem<VirtualModem> {
    let mut device = DeviceTemplates::sim808();
    for rule in overrides {
        let boost = 100 + rule.priority;
        device.add_rule(rule.priority(boost));
    }
    modem(device)
}

/// Command lines the modem received so far
pub fn commands(modem: &Modem<VirtualModem>) -> Vec<String> {
    modem.transport().commands()
}
