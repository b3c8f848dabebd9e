//! Engine tuning parameters
//!
//! Deadbands, snap thresholds and alerter timing used by the translation
//! engine. Every field has a default so a partial `[engine]` table in the
//! application config is enough.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Filtering applied to one brake lever after scaling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeverConfig {
    /// Minimum change (in 0-255 units) before a new value is sent
    #[serde(default = "default_deadband")]
    pub deadband: u8,

    /// Values at or below this are sent as exactly 0
    #[serde(default)]
    pub snap_to_zero_at: Option<u8>,

    /// Reverse the lever direction (255 - value)
    #[serde(default)]
    pub inverted: bool,
}

impl LeverConfig {
    pub fn new(deadband: u8) -> Self {
        Self {
            deadband,
            snap_to_zero_at: None,
            inverted: false,
        }
    }

    pub fn with_snap_to_zero(mut self, threshold: u8) -> Self {
        self.snap_to_zero_at = Some(threshold);
        self
    }

    pub fn with_inverted(mut self, inverted: bool) -> Self {
        self.inverted = inverted;
        self
    }
}

impl Default for LeverConfig {
    fn default() -> Self {
        Self::new(default_deadband())
    }
}

/// Configuration for the translation engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Automatic (train) brake
    #[serde(default = "default_auto")]
    pub auto_brake: LeverConfig,

    /// Independent (locomotive) brake
    #[serde(default = "default_indy")]
    pub indy_brake: LeverConfig,

    /// Dynamic brake
    #[serde(default = "default_dyn")]
    pub dyn_brake: LeverConfig,

    /// Minimum scaled reverser movement before re-classifying
    #[serde(default = "default_reverser_deadband")]
    pub reverser_deadband: u8,

    /// Raw units added to both ends of each throttle notch band
    #[serde(default = "default_notch_margin")]
    pub notch_margin: i32,

    /// Time between automatic alerter presses (default: 30000ms)
    #[serde(default = "default_alerter_interval")]
    pub alerter_interval_ms: u64,

    /// How long an automatic alerter press is held (default: 100ms)
    #[serde(default = "default_alerter_hold")]
    pub alerter_hold_ms: u64,

    /// Read attempts per calibration sample before giving up
    #[serde(default = "default_sample_retries")]
    pub calibration_sample_retries: u32,

    /// Pause before each calibration sample so the levers settle (default: 1000ms)
    #[serde(default = "default_settle")]
    pub calibration_settle_ms: u64,
}

fn default_deadband() -> u8 {
    1
}

fn default_auto() -> LeverConfig {
    LeverConfig::new(1)
}

fn default_indy() -> LeverConfig {
    LeverConfig::new(1).with_snap_to_zero(1)
}

fn default_dyn() -> LeverConfig {
    LeverConfig::new(1).with_snap_to_zero(3)
}

fn default_reverser_deadband() -> u8 {
    4
}

fn default_notch_margin() -> i32 {
    10
}

fn default_alerter_interval() -> u64 {
    30_000
}

fn default_alerter_hold() -> u64 {
    100
}

fn default_sample_retries() -> u32 {
    3
}

fn default_settle() -> u64 {
    1000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            auto_brake: default_auto(),
            indy_brake: default_indy(),
            dyn_brake: default_dyn(),
            reverser_deadband: default_reverser_deadband(),
            notch_margin: default_notch_margin(),
            alerter_interval_ms: default_alerter_interval(),
            alerter_hold_ms: default_alerter_hold(),
            calibration_sample_retries: default_sample_retries(),
            calibration_settle_ms: default_settle(),
        }
    }
}

impl EngineConfig {
    /// Create a new engine configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the throttle notch margin
    pub fn with_notch_margin(mut self, margin: i32) -> Self {
        self.notch_margin = margin;
        self
    }

    /// Builder method: set the reverser deadband
    pub fn with_reverser_deadband(mut self, deadband: u8) -> Self {
        self.reverser_deadband = deadband;
        self
    }

    /// Builder method: set alerter interval and hold time
    pub fn with_alerter_timing(mut self, interval: Duration, hold: Duration) -> Self {
        self.alerter_interval_ms = interval.as_millis() as u64;
        self.alerter_hold_ms = hold.as_millis() as u64;
        self
    }

    /// Builder method: set the automatic brake filter
    pub fn with_auto_brake(mut self, lever: LeverConfig) -> Self {
        self.auto_brake = lever;
        self
    }

    /// Builder method: set the independent brake filter
    pub fn with_indy_brake(mut self, lever: LeverConfig) -> Self {
        self.indy_brake = lever;
        self
    }

    /// Builder method: set the dynamic brake filter
    pub fn with_dyn_brake(mut self, lever: LeverConfig) -> Self {
        self.dyn_brake = lever;
        self
    }

    /// Builder method: set the calibration settle time
    pub fn with_calibration_settle(mut self, settle: Duration) -> Self {
        self.calibration_settle_ms = settle.as_millis() as u64;
        self
    }

    pub fn alerter_interval(&self) -> Duration {
        Duration::from_millis(self.alerter_interval_ms)
    }

    pub fn alerter_hold(&self) -> Duration {
        Duration::from_millis(self.alerter_hold_ms)
    }

    pub fn calibration_settle(&self) -> Duration {
        Duration::from_millis(self.calibration_settle_ms)
    }
}
