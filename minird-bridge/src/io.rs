//! Collaborator interfaces
//!
//! The bridge talks to the outside world only through these traits, so the
//! engine and the calibration workflow can be driven by canned data in tests
//! and by the serial port, UDP socket and console in the application.

use crate::codec::Frame;
use crate::types::{RawSample, Result};

/// Source of controller status vectors
pub trait SampleSource {
    /// Request and read one status vector.
    ///
    /// Empty lines, timeouts and malformed lines are reported as transient
    /// errors; the caller skips the cycle.
    fn sample(&mut self) -> Result<RawSample>;
}

/// Destination for simulator frames
pub trait FrameSink {
    /// Send one frame. Delivery is not guaranteed.
    fn send(&mut self, frame: &Frame) -> Result<()>;
}

/// Operator interaction used by the calibration workflow
pub trait Prompter {
    /// Show a prompt and wait for the operator's answer
    fn ask(&mut self, prompt: &str) -> Result<String>;

    /// Show an informational message
    fn notify(&mut self, message: &str);
}

impl<T: SampleSource + ?Sized> SampleSource for &mut T {
    fn sample(&mut self) -> Result<RawSample> {
        (**self).sample()
    }
}

impl<T: FrameSink + ?Sized> FrameSink for &mut T {
    fn send(&mut self, frame: &Frame) -> Result<()> {
        (**self).send(frame)
    }
}

impl<T: Prompter + ?Sized> Prompter for &mut T {
    fn ask(&mut self, prompt: &str) -> Result<String> {
        (**self).ask(prompt)
    }

    fn notify(&mut self, message: &str) {
        (**self).notify(message)
    }
}
