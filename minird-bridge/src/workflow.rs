//! Interactive recalibration
//!
//! The operator picks what to calibrate, then follows a series of prompts.
//! After each prompt one status vector is sampled. Once every prompt has been
//! answered the new ranges are computed and written through the calibration
//! store.
//!
//! ```text
//! Idle -> AwaitingPrompt(0) -> Sampled(0) -> AwaitingPrompt(1) -> ...
//!      -> Sampled(n) -> Computed -> Persisted
//! ```
//!
//! Lever calibration takes two samples at opposite extremes. Throttle
//! calibration walks up through all nine notches and back down again, so
//! each notch gets a band wide enough to cover mechanical hysteresis.

use crate::calibration::{Calibration, CalibrationRange, CalibrationStore, Lever, NOTCH_COUNT};
use crate::commands::{Command, CommandTable};
use crate::config::EngineConfig;
use crate::io::{Prompter, SampleSource};
use crate::types::{BridgeError, RawSample, Result};
use std::time::Duration;

const SCOPE_PROMPT: &str = "Calibrate (b)rake levers, (t)hrottle notches, (a)ll, or (c)ancel?";

/// What the operator chose to calibrate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Levers,
    Throttle,
    All,
}

impl Scope {
    /// Parse an operator answer; `Some(None)` means cancel, `None` an
    /// unrecognised answer
    pub fn parse(answer: &str) -> Option<Option<Scope>> {
        match answer.trim().to_ascii_lowercase().as_str() {
            "b" => Some(Some(Scope::Levers)),
            "t" => Some(Some(Scope::Throttle)),
            "a" => Some(Some(Scope::All)),
            "c" => Some(None),
            _ => None,
        }
    }

    fn includes_levers(self) -> bool {
        matches!(self, Scope::Levers | Scope::All)
    }

    fn includes_throttle(self) -> bool {
        matches!(self, Scope::Throttle | Scope::All)
    }
}

/// What a prompt asks the operator to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    LeverExtreme(usize),
    NotchUp(usize),
    NotchDown(usize),
}

impl Target {
    fn prompt(self) -> String {
        match self {
            Target::LeverExtreme(0) => {
                "Move all levers to one extreme and press return".to_string()
            }
            Target::LeverExtreme(_) => {
                "Move all levers to their other extremes and press return".to_string()
            }
            Target::NotchUp(n) => format!("Move the throttle UP to notch {} and press return", n),
            Target::NotchDown(n) => {
                format!("Move the throttle DOWN to notch {} and press return", n)
            }
        }
    }
}

/// Progress of the workflow
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowState {
    Idle,
    AwaitingPrompt(usize),
    Sampled(usize),
    Computed(Calibration),
    Persisted,
    Cancelled,
    Failed(String),
}

/// Status-vector positions the workflow reads
#[derive(Debug, Clone, Copy)]
struct Positions {
    levers: [(Lever, Option<usize>); 3],
    reverser: Option<usize>,
    throttle: Option<usize>,
}

impl Positions {
    fn from_table(table: &CommandTable) -> Self {
        Self {
            levers: [
                (Lever::Auto, table.channel_of(Command::AutoBrake)),
                (Lever::Indy, table.channel_of(Command::IndyBrake)),
                (Lever::Dyn, table.channel_of(Command::DynBrake)),
            ],
            reverser: table.channel_of(Command::Reverser),
            throttle: table.channel_of(Command::Throttle),
        }
    }
}

/// Blocking, prompt-driven calibration procedure
#[derive(Debug)]
pub struct CalibrationWorkflow {
    positions: Positions,
    channel_count: usize,
    retries: u32,
    settle: Duration,
    state: WorkflowState,
    plan: Vec<Target>,
    samples: Vec<RawSample>,
}

impl CalibrationWorkflow {
    pub fn new(table: &CommandTable, config: &EngineConfig) -> Self {
        Self {
            positions: Positions::from_table(table),
            channel_count: table.len(),
            retries: config.calibration_sample_retries.max(1),
            settle: config.calibration_settle(),
            state: WorkflowState::Idle,
            plan: Vec::new(),
            samples: Vec::new(),
        }
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    /// Run the whole procedure and persist the result.
    ///
    /// On any error the store keeps its previous ranges.
    pub fn run<S, P>(
        &mut self,
        source: &mut S,
        prompter: &mut P,
        store: &mut CalibrationStore,
    ) -> Result<Calibration>
    where
        S: SampleSource + ?Sized,
        P: Prompter + ?Sized,
    {
        let result = self.drive(source, prompter, store);
        if let Err(e) = &result {
            match e {
                BridgeError::CalibrationCancelled => {
                    self.state = WorkflowState::Cancelled;
                    prompter.notify("Calibration cancelled, keeping previous ranges");
                }
                other => {
                    log::error!("Calibration failed: {}", other);
                    self.state = WorkflowState::Failed(other.to_string());
                    prompter.notify(&format!(
                        "Calibration failed ({}), keeping previous ranges",
                        other
                    ));
                }
            }
        }
        result
    }

    fn drive<S, P>(
        &mut self,
        source: &mut S,
        prompter: &mut P,
        store: &mut CalibrationStore,
    ) -> Result<Calibration>
    where
        S: SampleSource + ?Sized,
        P: Prompter + ?Sized,
    {
        loop {
            let next = match std::mem::replace(&mut self.state, WorkflowState::Idle) {
                WorkflowState::Idle
                | WorkflowState::Persisted
                | WorkflowState::Cancelled
                | WorkflowState::Failed(_) => {
                    prompter.notify("MiniRD recalibration requested");
                    let scope = select_scope(prompter)?;
                    self.plan = build_plan(scope);
                    self.samples.clear();
                    WorkflowState::AwaitingPrompt(0)
                }
                WorkflowState::AwaitingPrompt(step) => {
                    prompter.ask(&self.plan[step].prompt())?;
                    let sample = self.take_sample(source)?;
                    self.samples.push(sample);
                    WorkflowState::Sampled(step)
                }
                WorkflowState::Sampled(step) => {
                    if step + 1 < self.plan.len() {
                        WorkflowState::AwaitingPrompt(step + 1)
                    } else {
                        WorkflowState::Computed(self.compute(store.calibration()))
                    }
                }
                WorkflowState::Computed(calibration) => {
                    prompter.notify(&format!("Old calibration: {:?}", store.calibration()));
                    prompter.notify(&format!("New calibration: {:?}", calibration));
                    store.save(calibration.clone())?;
                    prompter.notify(&format!(
                        "New calibration saved to {}",
                        store.path().display()
                    ));
                    self.state = WorkflowState::Persisted;
                    return Ok(calibration);
                }
            };
            self.state = next;
        }
    }

    fn take_sample<S>(&self, source: &mut S) -> Result<RawSample>
    where
        S: SampleSource + ?Sized,
    {
        if !self.settle.is_zero() {
            std::thread::sleep(self.settle);
        }

        let mut attempt = 0;
        loop {
            attempt += 1;
            let sample = source.sample().and_then(|s| {
                if s.len() < self.channel_count {
                    Err(BridgeError::SampleLength {
                        expected: self.channel_count,
                        actual: s.len(),
                    })
                } else {
                    Ok(s)
                }
            });
            match sample {
                Ok(s) => {
                    log::debug!("Calibration sample: {:?}", s);
                    return Ok(s);
                }
                Err(e) if e.is_transient() && attempt < self.retries => {
                    log::warn!("Calibration sample attempt {} failed: {}", attempt, e);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Derive new ranges from the collected samples
    fn compute(&self, previous: &Calibration) -> Calibration {
        let mut calibration = previous.clone();
        let range_at = |a: usize, b: usize, position: usize| {
            CalibrationRange::from_samples(self.samples[a][position], self.samples[b][position])
        };

        let extreme = |which: usize| {
            self.plan
                .iter()
                .position(|t| *t == Target::LeverExtreme(which))
        };
        if let (Some(a), Some(b)) = (extreme(0), extreme(1)) {
            for (lever, position) in self.positions.levers {
                if let Some(p) = position {
                    calibration.set_lever(lever, range_at(a, b, p));
                }
            }
            if let Some(p) = self.positions.reverser {
                calibration.reverser = range_at(a, b, p);
            }
        }

        if let Some(p) = self.positions.throttle {
            for notch in 0..NOTCH_COUNT {
                let up = self.plan.iter().position(|t| *t == Target::NotchUp(notch));
                let down = self.plan.iter().position(|t| *t == Target::NotchDown(notch));
                if let (Some(a), Some(b)) = (up, down) {
                    calibration.notches[notch] = range_at(a, b, p);
                }
            }
        }

        calibration
    }
}

fn select_scope<P: Prompter + ?Sized>(prompter: &mut P) -> Result<Scope> {
    loop {
        let answer = prompter.ask(SCOPE_PROMPT)?;
        match Scope::parse(&answer) {
            Some(Some(scope)) => return Ok(scope),
            Some(None) => return Err(BridgeError::CalibrationCancelled),
            None => prompter.notify(&format!("Unrecognised choice {:?}", answer.trim())),
        }
    }
}

fn build_plan(scope: Scope) -> Vec<Target> {
    let mut plan = Vec::new();
    if scope.includes_levers() {
        plan.push(Target::LeverExtreme(0));
        plan.push(Target::LeverExtreme(1));
    }
    if scope.includes_throttle() {
        plan.extend((0..NOTCH_COUNT).map(Target::NotchUp));
        plan.extend((0..NOTCH_COUNT).rev().map(Target::NotchDown));
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use tempfile::TempDir;

    struct Canned(VecDeque<Result<RawSample>>);

    impl SampleSource for Canned {
        fn sample(&mut self) -> Result<RawSample> {
            self.0.pop_front().unwrap_or(Err(BridgeError::Timeout))
        }
    }

    #[derive(Default)]
    struct Script {
        answers: VecDeque<String>,
        asked: Vec<String>,
        notes: Vec<String>,
    }

    impl Script {
        fn new(answers: &[&str]) -> Self {
            Self {
                answers: answers.iter().map(|a| a.to_string()).collect(),
                ..Default::default()
            }
        }
    }

    impl Prompter for Script {
        fn ask(&mut self, prompt: &str) -> Result<String> {
            self.asked.push(prompt.to_string());
            Ok(self.answers.pop_front().unwrap_or_default())
        }

        fn notify(&mut self, message: &str) {
            self.notes.push(message.to_string());
        }
    }

    fn vector(auto: i32, indy: i32, dyn_brake: i32, throttle: i32, reverser: i32) -> RawSample {
        let mut v = vec![0; 24];
        v[0] = auto;
        v[1] = indy;
        v[2] = dyn_brake;
        v[3] = throttle;
        v[4] = reverser;
        v
    }

    fn workflow() -> CalibrationWorkflow {
        let config = EngineConfig::new().with_calibration_settle(Duration::ZERO);
        CalibrationWorkflow::new(&CommandTable::minird(), &config)
    }

    #[test]
    fn test_scope_parse() {
        assert_eq!(Scope::parse("b"), Some(Some(Scope::Levers)));
        assert_eq!(Scope::parse(" T \n"), Some(Some(Scope::Throttle)));
        assert_eq!(Scope::parse("a"), Some(Some(Scope::All)));
        assert_eq!(Scope::parse("c"), Some(None));
        assert_eq!(Scope::parse("x"), None);
        assert_eq!(Scope::parse(""), None);
    }

    #[test]
    fn test_plan_lengths() {
        assert_eq!(build_plan(Scope::Levers).len(), 2);
        assert_eq!(build_plan(Scope::Throttle).len(), 18);
        assert_eq!(build_plan(Scope::All).len(), 20);
        assert_eq!(build_plan(Scope::Throttle)[9], Target::NotchDown(8));
    }

    #[test]
    fn test_lever_calibration_is_order_independent() {
        let dir = TempDir::new().unwrap();
        let mut store = CalibrationStore::load_or_create(&dir.path().join("cal")).unwrap();
        let mut source = Canned(VecDeque::from(vec![
            Ok(vector(900, 20, 1000, 0, 50)),
            Ok(vector(15, 980, 3, 0, 10100)),
        ]));
        let mut prompter = Script::new(&["x", "b", "", ""]);

        let mut wf = workflow();
        let cal = wf.run(&mut source, &mut prompter, &mut store).unwrap();

        assert_eq!(cal.auto, CalibrationRange::new(15, 900));
        assert_eq!(cal.indy, CalibrationRange::new(20, 980));
        assert_eq!(cal.dyn_brake, CalibrationRange::new(3, 1000));
        assert_eq!(cal.reverser, CalibrationRange::new(50, 10100));
        assert_eq!(cal.notches, Calibration::default().notches);
        assert_eq!(store.calibration(), &cal);
        assert_eq!(wf.state(), &WorkflowState::Persisted);
        assert!(prompter.notes.iter().any(|n| n.contains("Unrecognised")));
    }

    #[test]
    fn test_throttle_calibration_uses_both_passes() {
        let dir = TempDir::new().unwrap();
        let mut store = CalibrationStore::load_or_create(&dir.path().join("cal")).unwrap();

        let mut samples = VecDeque::new();
        for n in 0..9 {
            samples.push_back(Ok(vector(0, 0, 0, n * 100 + 10, 0)));
        }
        for n in (0..9).rev() {
            samples.push_back(Ok(vector(0, 0, 0, n * 100 - 5, 0)));
        }
        let mut source = Canned(samples);
        let mut prompter = Script::new(&["t"]);

        let cal = workflow().run(&mut source, &mut prompter, &mut store).unwrap();
        assert_eq!(cal.notches[0], CalibrationRange::new(-5, 10));
        assert_eq!(cal.notches[4], CalibrationRange::new(395, 410));
        assert_eq!(cal.notches[8], CalibrationRange::new(795, 810));
        assert_eq!(cal.auto, Calibration::default().auto);
        assert_eq!(prompter.asked.len(), 19);
        assert!(prompter.asked[1].contains("UP to notch 0"));
        assert!(prompter.asked[10].contains("DOWN to notch 8"));
    }

    #[test]
    fn test_cancel_keeps_previous() {
        let dir = TempDir::new().unwrap();
        let mut store = CalibrationStore::load_or_create(&dir.path().join("cal")).unwrap();
        let mut source = Canned(VecDeque::new());
        let mut prompter = Script::new(&["c"]);

        let mut wf = workflow();
        let err = wf.run(&mut source, &mut prompter, &mut store).unwrap_err();
        assert!(matches!(err, BridgeError::CalibrationCancelled));
        assert_eq!(wf.state(), &WorkflowState::Cancelled);
        assert_eq!(store.calibration(), &Calibration::default());
    }

    #[test]
    fn test_transient_sample_errors_are_retried() {
        let dir = TempDir::new().unwrap();
        let mut store = CalibrationStore::load_or_create(&dir.path().join("cal")).unwrap();
        let mut source = Canned(VecDeque::from(vec![
            Err(BridgeError::EmptySample),
            Ok(vec![1, 2, 3]),
            Ok(vector(0, 0, 0, 0, 0)),
            Ok(vector(1000, 1000, 1000, 0, 1000)),
        ]));
        let mut prompter = Script::new(&["b"]);

        let cal = workflow().run(&mut source, &mut prompter, &mut store).unwrap();
        assert_eq!(cal.auto, CalibrationRange::new(0, 1000));
    }

    #[test]
    fn test_zero_span_is_not_persisted() {
        let dir = TempDir::new().unwrap();
        let mut store = CalibrationStore::load_or_create(&dir.path().join("cal")).unwrap();
        let mut source = Canned(VecDeque::from(vec![
            Ok(vector(500, 0, 0, 0, 0)),
            Ok(vector(500, 1000, 1000, 0, 1000)),
        ]));
        let mut prompter = Script::new(&["b"]);

        let mut wf = workflow();
        let err = wf.run(&mut source, &mut prompter, &mut store).unwrap_err();
        assert!(matches!(err, BridgeError::ZeroSpan(_)));
        assert!(matches!(wf.state(), WorkflowState::Failed(_)));
        assert_eq!(store.calibration(), &Calibration::default());
        assert!(prompter.notes.iter().any(|n| n.contains("keeping previous")));
    }

    #[test]
    fn test_exhausted_retries_abort() {
        let dir = TempDir::new().unwrap();
        let mut store = CalibrationStore::load_or_create(&dir.path().join("cal")).unwrap();
        let mut source = Canned(VecDeque::new());
        let mut prompter = Script::new(&["b"]);

        let err = workflow().run(&mut source, &mut prompter, &mut store).unwrap_err();
        assert!(matches!(err, BridgeError::Timeout));
        assert_eq!(store.calibration(), &Calibration::default());
    }
}
