//! Polling loop
//!
//! Ties a sample source, the translation engine and a frame sink together.
//! Each cycle runs a pending recalibration first, then reads one status
//! vector and sends whatever frames the engine produced.

use crate::calibration::CalibrationStore;
use crate::commands::CommandTable;
use crate::config::EngineConfig;
use crate::engine::Engine;
use crate::io::{FrameSink, Prompter, SampleSource};
use crate::types::{RawSample, Result};
use crate::workflow::CalibrationWorkflow;
use std::time::Instant;

/// Counters kept across the session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BridgeStats {
    pub cycles: u64,
    pub skipped: u64,
    pub frames_sent: u64,
    pub send_failures: u64,
    pub calibrations: u64,
}

/// What happened during one cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// A sample was processed and this many frames were sent
    Processed(usize),
    /// The sample was unusable; nothing changed
    Skipped,
}

/// A running console-to-simulator session
pub struct Bridge<S, K, P> {
    source: S,
    sink: K,
    prompter: P,
    table: CommandTable,
    store: CalibrationStore,
    engine: Engine,
    stats: BridgeStats,
}

impl<S, K, P> Bridge<S, K, P>
where
    S: SampleSource,
    K: FrameSink,
    P: Prompter,
{
    /// Read the first usable sample and prime the engine from it.
    ///
    /// Transient read errors are skipped; any other source error is returned.
    pub fn start(
        mut source: S,
        sink: K,
        prompter: P,
        table: CommandTable,
        config: EngineConfig,
        store: CalibrationStore,
        now: Instant,
    ) -> Result<Self> {
        let first = first_sample(&mut source)?;
        let engine = Engine::new(&table, config, store.calibration().clone(), &first, now)?;

        Ok(Self {
            source,
            sink,
            prompter,
            table,
            store,
            engine,
            stats: BridgeStats::default(),
        })
    }

    /// Run one polling cycle with the given timestamp
    pub fn run_cycle(&mut self, now: Instant) -> Result<CycleOutcome> {
        if self.engine.take_calibration_request() {
            self.recalibrate();
        }

        self.stats.cycles += 1;
        let sample = match self.source.sample() {
            Ok(sample) => sample,
            Err(e) if e.is_transient() => {
                log::debug!("Skipping cycle: {}", e);
                self.stats.skipped += 1;
                return Ok(CycleOutcome::Skipped);
            }
            Err(e) => return Err(e),
        };

        let frames = match self.engine.process(&sample, now) {
            Ok(frames) => frames,
            Err(e) if e.is_transient() => {
                log::warn!("Skipping cycle: {}", e);
                self.stats.skipped += 1;
                return Ok(CycleOutcome::Skipped);
            }
            Err(e) => return Err(e),
        };

        let mut sent = 0;
        for frame in &frames {
            match self.sink.send(frame) {
                Ok(()) => sent += 1,
                Err(e) => {
                    log::warn!("Failed to send {}: {}", frame, e);
                    self.stats.send_failures += 1;
                }
            }
        }
        self.stats.frames_sent += sent as u64;
        Ok(CycleOutcome::Processed(sent))
    }

    /// Poll until the source fails with a non-transient error
    pub fn run(&mut self) -> Result<()> {
        log::info!("Bridge running");
        loop {
            self.run_cycle(Instant::now())?;
        }
    }

    fn recalibrate(&mut self) {
        let mut workflow = CalibrationWorkflow::new(&self.table, self.engine.config());
        match workflow.run(&mut self.source, &mut self.prompter, &mut self.store) {
            Ok(calibration) => {
                log::info!("Calibration updated");
                self.engine.set_calibration(calibration);
                self.stats.calibrations += 1;
            }
            Err(e) => log::warn!("Calibration not applied: {}", e),
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn store(&self) -> &CalibrationStore {
        &self.store
    }

    pub fn stats(&self) -> &BridgeStats {
        &self.stats
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn prompter(&self) -> &P {
        &self.prompter
    }
}

fn first_sample<S: SampleSource>(source: &mut S) -> Result<RawSample> {
    loop {
        match source.sample() {
            Ok(sample) => return Ok(sample),
            Err(e) if e.is_transient() => log::debug!("Waiting for first sample: {}", e),
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Frame;
    use crate::types::BridgeError;
    use std::collections::VecDeque;
    use tempfile::TempDir;

    struct Feed(VecDeque<Result<RawSample>>);

    impl SampleSource for Feed {
        fn sample(&mut self) -> Result<RawSample> {
            self.0.pop_front().unwrap_or_else(|| {
                Err(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "feed exhausted").into())
            })
        }
    }

    #[derive(Default)]
    struct Flaky {
        sent: Vec<Frame>,
        fail_next: bool,
    }

    impl FrameSink for Flaky {
        fn send(&mut self, frame: &Frame) -> Result<()> {
            if std::mem::take(&mut self.fail_next) {
                return Err(std::io::Error::new(std::io::ErrorKind::Other, "dropped").into());
            }
            self.sent.push(*frame);
            Ok(())
        }
    }

    struct Silent;

    impl Prompter for Silent {
        fn ask(&mut self, _prompt: &str) -> Result<String> {
            Ok("c".to_string())
        }

        fn notify(&mut self, _message: &str) {}
    }

    fn start(
        samples: Vec<Result<RawSample>>,
        dir: &TempDir,
    ) -> Result<Bridge<Feed, Flaky, Silent>> {
        let store = CalibrationStore::load_or_create(&dir.path().join("miniRD.cal"))?;
        Bridge::start(
            Feed(samples.into()),
            Flaky::default(),
            Silent,
            CommandTable::minird(),
            EngineConfig::new(),
            store,
            Instant::now(),
        )
    }

    #[test]
    fn test_start_skips_transient_errors() {
        let dir = TempDir::new().unwrap();
        let bridge = start(
            vec![Err(BridgeError::Timeout), Err(BridgeError::EmptySample), Ok(vec![0; 24])],
            &dir,
        );
        assert!(bridge.is_ok());
    }

    #[test]
    fn test_start_fails_on_closed_source() {
        let dir = TempDir::new().unwrap();
        let err = start(vec![], &dir).err().unwrap();
        assert!(matches!(err, BridgeError::IoError(_)));
    }

    #[test]
    fn test_malformed_cycle_is_skipped() {
        let dir = TempDir::new().unwrap();
        let mut bridge = start(
            vec![Ok(vec![0; 24]), Err(BridgeError::EmptySample), Ok(vec![1, 2])],
            &dir,
        )
        .unwrap();

        let now = Instant::now();
        assert_eq!(bridge.run_cycle(now).unwrap(), CycleOutcome::Skipped);
        assert_eq!(bridge.run_cycle(now).unwrap(), CycleOutcome::Skipped);
        assert_eq!(bridge.stats().skipped, 2);
        assert!(bridge.sink().sent.is_empty());
    }

    #[test]
    fn test_send_failure_is_not_fatal() {
        let dir = TempDir::new().unwrap();
        let mut bell = vec![0; 24];
        bell[13] = 1;
        let samples = vec![Ok(vec![0; 24]), Ok(bell.clone()), Ok(vec![0; 24])];
        let mut bridge = start(samples, &dir).unwrap();

        bridge.sink.fail_next = true;
        let now = Instant::now();
        assert_eq!(bridge.run_cycle(now).unwrap(), CycleOutcome::Processed(0));
        assert_eq!(bridge.run_cycle(now).unwrap(), CycleOutcome::Processed(1));
        assert_eq!(bridge.stats().send_failures, 1);
        assert_eq!(bridge.stats().frames_sent, 1);
    }

    #[test]
    fn test_run_stops_on_source_failure() {
        let dir = TempDir::new().unwrap();
        let mut bridge = start(vec![Ok(vec![0; 24]), Ok(vec![0; 24])], &dir).unwrap();
        let err = bridge.run().unwrap_err();
        assert!(matches!(err, BridgeError::IoError(_)));
        assert_eq!(bridge.stats().cycles, 2);
    }
}
