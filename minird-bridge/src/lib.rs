//! miniRD Bridge Library
//!
//! Translates the status of a miniRD locomotive console into Run8 simulator
//! control frames.
//!
//! # Architecture
//!
//! The library is transport-free:
//! - Samples arrive through a [`SampleSource`]
//! - Frames leave through a [`FrameSink`]
//! - Recalibration talks to the operator through a [`Prompter`]
//!
//! The [`Engine`] owns all session state and turns each status vector into
//! the minimal set of frames. The [`CalibrationWorkflow`] rewrites the
//! persisted ranges on request.
//!
//! Serial ports, UDP sockets and the console live in the application layer
//! (minird-cli).
//!
//! # Example Usage
//!
//! ```no_run
//! use minird_bridge::{Engine, EngineConfig, CalibrationStore, CommandTable};
//! use std::path::Path;
//! use std::time::Instant;
//!
//! let store = CalibrationStore::load_or_create(Path::new("miniRD.cal")).unwrap();
//! let table = CommandTable::minird();
//! let first = vec![0; table.len()];
//!
//! let mut engine = Engine::new(
//!     &table,
//!     EngineConfig::new(),
//!     store.calibration().clone(),
//!     &first,
//!     Instant::now(),
//! )
//! .unwrap();
//!
//! let mut next = first.clone();
//! next[0] = 512;
//! for frame in engine.process(&next, Instant::now()).unwrap() {
//!     println!("{} -> {:?}", frame, frame.encode());
//! }
//! ```

// Public modules
pub mod bridge;
pub mod calibration;
pub mod channel;
pub mod codec;
pub mod commands;
pub mod config;
pub mod engine;
pub mod io;
pub mod scaler;
pub mod types;
pub mod workflow;

// Re-export main types for convenience
pub use bridge::{Bridge, BridgeStats, CycleOutcome};
pub use calibration::{Calibration, CalibrationRange, CalibrationStore, Lever};
pub use codec::{decode_vector, encode, Frame, MessageClass};
pub use commands::{Command, CommandTable};
pub use config::{EngineConfig, LeverConfig};
pub use engine::{Direction, Engine};
pub use io::{FrameSink, Prompter, SampleSource};
pub use scaler::scale;
pub use types::{BridgeError, RawSample, Result};
pub use workflow::{CalibrationWorkflow, Scope, WorkflowState};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_default_table_matches_controller() {
        let table = CommandTable::default();
        assert_eq!(table.len(), 24);
        assert_eq!(table.channel_of(Command::Alerter), Some(14));
    }
}
