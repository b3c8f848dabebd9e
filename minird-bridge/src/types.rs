//! Core types for the miniRD bridge library
//!
//! This module defines the error taxonomy shared by every stage of the
//! bridge (sampling, translation, framing and calibration) together with the
//! raw sample type read from the controller.

/// One raw status vector as reported by the controller, in channel order
pub type RawSample = Vec<i32>;

/// Result type for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors that can occur while bridging the console to the simulator
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Empty status line from controller")]
    EmptySample,

    #[error("Malformed status field {index}: {field:?}")]
    MalformedSample { index: usize, field: String },

    #[error("Status vector has {actual} channels, expected at least {expected}")]
    SampleLength { expected: usize, actual: usize },

    #[error("Timed out waiting for controller status")]
    Timeout,

    #[error("Frame value {0} outside 0-255")]
    ValueOutOfRange(i32),

    #[error("Invalid command code: {0}")]
    InvalidCommandCode(u32),

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Calibration range '{0}' has zero span")]
    ZeroSpan(String),

    #[error("Calibration range '{key}' is inverted (min {min} > max {max})")]
    InvertedRange { key: String, min: i32, max: i32 },

    #[error("Missing calibration key: {0}")]
    MissingCalibrationKey(String),

    #[error("Failed to parse calibration file: {0}")]
    CalibrationParse(#[from] serde_json::Error),

    #[error("Calibration cancelled by operator")]
    CalibrationCancelled,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl BridgeError {
    /// Transient read errors skip the current cycle without touching state
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BridgeError::EmptySample
                | BridgeError::MalformedSample { .. }
                | BridgeError::SampleLength { .. }
                | BridgeError::Timeout
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(BridgeError::EmptySample.is_transient());
        assert!(BridgeError::Timeout.is_transient());
        assert!(BridgeError::SampleLength { expected: 24, actual: 3 }.is_transient());
        assert!(!BridgeError::ZeroSpan("auto".to_string()).is_transient());
        assert!(!BridgeError::CalibrationCancelled.is_transient());
    }

    #[test]
    fn test_error_display() {
        let err = BridgeError::MalformedSample { index: 2, field: "x".to_string() };
        assert_eq!(format!("{}", err), "Malformed status field 2: \"x\"");
        assert_eq!(
            format!("{}", BridgeError::ValueOutOfRange(300)),
            "Frame value 300 outside 0-255"
        );
    }
}
