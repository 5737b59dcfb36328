// File: cmdgate-common/src/models/settings.rs

use serde::{Deserialize, Serialize};

/// Per-command numeric settings as they appear in the config document.
///
/// Axes a command is exempt from are simply absent, so every field is optional
/// and falls back to the defaults (enabled, no cooldown, no warmup, free).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cooldown: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warmup: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
}

impl CommandSettings {
    pub fn enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    pub fn cooldown_seconds(&self) -> i64 {
        self.cooldown.unwrap_or(0)
    }

    pub fn warmup_seconds(&self) -> i64 {
        self.warmup.unwrap_or(0)
    }

    pub fn cost(&self) -> f64 {
        self.cost.unwrap_or(0.0)
    }
}

/// Runtime-wide knobs for the gate itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateSettings {
    /// Log full causes of unexpected body failures.
    #[serde(default)]
    pub debug: bool,
    /// Blocks an actor may drift before a pending warmup is cancelled.
    #[serde(default = "default_movement_tolerance")]
    pub movement_tolerance: f64,
    #[serde(default = "default_true")]
    pub cancel_warmup_on_move: bool,
    #[serde(default = "default_true")]
    pub cancel_warmup_on_command: bool,
}

fn default_movement_tolerance() -> f64 {
    0.5
}

fn default_true() -> bool {
    true
}

impl Default for GateSettings {
    fn default() -> Self {
        Self {
            debug: false,
            movement_tolerance: default_movement_tolerance(),
            cancel_warmup_on_move: true,
            cancel_warmup_on_command: true,
        }
    }
}
