//! Translation engine
//!
//! Turns each freshly sampled status vector into the simulator frames needed
//! to bring the virtual cab in line with the physical console. All session
//! state lives here and is mutated only by [`Engine::process`].
//!
//! A channel is only looked at when its raw value differs from the previous
//! sample. Calibration changes therefore apply to a channel the next time
//! that channel moves.

use crate::calibration::{Calibration, Lever};
use crate::channel::{lever_command, Channel, ChannelMap, ShiftedKind, ToggleKind};
use crate::codec::{Frame, MessageClass};
use crate::commands::{
    Command, CommandTable, REVERSER_FORWARD, REVERSER_NEUTRAL, REVERSER_REVERSE,
};
use crate::config::{EngineConfig, LeverConfig};
use crate::scaler::{scale, SIM_MAX};
use crate::types::{BridgeError, RawSample, Result};
use std::collections::HashMap;
use std::time::Instant;

/// Raw value of a released push-button
pub const BUTTON_UP: i32 = 0;
/// Raw value of a pressed push-button
pub const BUTTON_DOWN: i32 = 1;

/// Rotary counter switch positions
pub const COUNTER_CENTER: i32 = 0;
pub const COUNTER_UP: i32 = 1;
pub const COUNTER_DOWN: i32 = 2;

/// DPU selector positions
pub const SELECT_NONE: i32 = 0;
pub const SELECT_INCREASE: i32 = 1;
pub const SELECT_DECREASE: i32 = 2;

/// Reverser handle position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Reverse,
    Neutral,
    Forward,
}

impl Direction {
    /// Split the 0-255 scale into thirds
    pub fn classify(scaled: u8) -> Self {
        let third = SIM_MAX / 3;
        if scaled < third {
            Direction::Reverse
        } else if scaled < third * 2 {
            Direction::Neutral
        } else {
            Direction::Forward
        }
    }

    /// Value sent to the simulator
    pub fn value(self) -> u8 {
        match self {
            Direction::Reverse => REVERSER_REVERSE,
            Direction::Neutral => REVERSER_NEUTRAL,
            Direction::Forward => REVERSER_FORWARD,
        }
    }
}

#[derive(Debug, Clone)]
struct AlerterTimer {
    armed: bool,
    pressed: bool,
    last_press: Instant,
}

/// Per-session state, primed from the first sample
#[derive(Debug, Clone)]
struct SessionState {
    last_seen: RawSample,
    levers: HashMap<Lever, u8>,
    reverser_scaled: u8,
    reverser: Direction,
    notch: usize,
    toggles: HashMap<ToggleKind, u8>,
    handbrake_latched: bool,
    alerter: AlerterTimer,
    calibration_requested: bool,
}

/// The polling translation engine
#[derive(Debug)]
pub struct Engine {
    channels: ChannelMap,
    config: EngineConfig,
    calibration: Calibration,
    state: SessionState,
}

impl Engine {
    /// Build an engine and prime its state from the first sample
    pub fn new(
        table: &CommandTable,
        config: EngineConfig,
        calibration: Calibration,
        first_sample: &[i32],
        now: Instant,
    ) -> Result<Self> {
        let channels = ChannelMap::from_table(table);
        check_length(&channels, first_sample)?;

        let state = SessionState {
            last_seen: first_sample[..channels.len()].to_vec(),
            levers: HashMap::new(),
            reverser_scaled: 0,
            reverser: Direction::Neutral,
            notch: 0,
            toggles: HashMap::new(),
            handbrake_latched: false,
            alerter: AlerterTimer {
                armed: false,
                pressed: false,
                last_press: now,
            },
            calibration_requested: false,
        };

        let mut engine = Self {
            channels,
            config,
            calibration,
            state,
        };
        engine.prime(first_sample);

        log::info!("Engine primed with {} channels", engine.channels.len());
        Ok(engine)
    }

    /// Derive the continuous-control baselines from a sample
    fn prime(&mut self, sample: &[i32]) {
        for index in 0..self.channels.len() {
            let raw = sample[index];
            match self.channels.get(index) {
                Channel::Lever(lever) => {
                    let value = self.filtered_lever(lever, raw);
                    self.state.levers.insert(lever, value);
                }
                Channel::Reverser => {
                    let scaled = scale(self.calibration.reverser, raw);
                    self.state.reverser_scaled = scaled;
                    self.state.reverser = Direction::classify(scaled);
                }
                Channel::Throttle => {
                    if let Some(notch) = self.lookup_notch(raw) {
                        self.state.notch = notch;
                    }
                }
                _ => {}
            }
        }
    }

    /// Process one sample and return the frames to send
    pub fn process(&mut self, sample: &[i32], now: Instant) -> Result<Vec<Frame>> {
        check_length(&self.channels, sample)?;
        log::trace!("Sample: {:?}", sample);

        let mut out = Vec::new();
        self.service_alerter(now, &mut out);

        let alt = self
            .channels
            .alt_channel()
            .map(|i| sample[i] != 0)
            .unwrap_or(false);

        for index in 0..self.channels.len() {
            let raw = sample[index];
            if raw == self.state.last_seen[index] {
                continue;
            }
            self.state.last_seen[index] = raw;
            let channel = self.channels.get(index);
            self.dispatch(channel, raw, alt, now, &mut out);
        }

        for frame in &out {
            log::debug!("-> {}", frame);
        }
        Ok(out)
    }

    fn dispatch(
        &mut self,
        channel: Channel,
        raw: i32,
        alt: bool,
        now: Instant,
        out: &mut Vec<Frame>,
    ) {
        match channel {
            Channel::Throttle => self.update_throttle(raw, out),
            Channel::Lever(lever) => self.update_lever(lever, raw, out),
            Channel::Reverser => self.update_reverser(raw, out),
            Channel::Toggle(kind) => {
                if raw == BUTTON_DOWN {
                    let state = self.state.toggles.entry(kind).or_insert(0);
                    *state = (*state + 1) % kind.states();
                    out.push(Frame::sound(kind.command(), *state));
                }
            }
            Channel::HandbrakeLatch => self.update_handbrake(raw, out),
            Channel::Shifted(kind) => self.update_shifted(kind, raw, alt, now, out),
            Channel::Passthrough(command) => passthrough(command, raw, out),
            Channel::PairedIncDec { inc, dec } => match raw {
                SELECT_NONE => {
                    out.push(Frame::sound(inc, 0));
                    out.push(Frame::sound(dec, 0));
                }
                SELECT_INCREASE => {
                    out.push(Frame::sound(dec, 0));
                    out.push(Frame::sound(inc, 1));
                }
                SELECT_DECREASE => {
                    out.push(Frame::sound(inc, 0));
                    out.push(Frame::sound(dec, 1));
                }
                other => log::warn!("Unexpected {} selector value {}", inc, other),
            },
            Channel::Ignored => {}
        }
    }

    fn lookup_notch(&self, raw: i32) -> Option<usize> {
        let margin = self.config.notch_margin;
        let notches = &self.calibration.notches;
        if notches[self.state.notch].contains_with_margin(raw, margin) {
            return Some(self.state.notch);
        }
        notches.iter().position(|n| n.contains_with_margin(raw, margin))
    }

    fn update_throttle(&mut self, raw: i32, out: &mut Vec<Frame>) {
        match self.lookup_notch(raw) {
            Some(notch) if notch != self.state.notch => {
                self.state.notch = notch;
                out.push(Frame::sound(Command::Throttle, notch as u8));
            }
            Some(_) => {}
            None => log::trace!("Throttle raw {} outside every notch band", raw),
        }
    }

    fn lever_config(&self, lever: Lever) -> LeverConfig {
        match lever {
            Lever::Auto => self.config.auto_brake,
            Lever::Indy => self.config.indy_brake,
            Lever::Dyn => self.config.dyn_brake,
        }
    }

    fn oriented_lever(&self, lever: Lever, raw: i32) -> u8 {
        let scaled = scale(self.calibration.lever(lever), raw);
        if self.lever_config(lever).inverted {
            SIM_MAX - scaled
        } else {
            scaled
        }
    }

    fn filtered_lever(&self, lever: Lever, raw: i32) -> u8 {
        let value = self.oriented_lever(lever, raw);
        match self.lever_config(lever).snap_to_zero_at {
            Some(threshold) if value <= threshold => 0,
            _ => value,
        }
    }

    fn update_lever(&mut self, lever: Lever, raw: i32, out: &mut Vec<Frame>) {
        let scaled = self.oriented_lever(lever, raw);
        let last = self.state.levers.get(&lever).copied().unwrap_or(0);
        if scaled.abs_diff(last) > self.lever_config(lever).deadband {
            let value = self.filtered_lever(lever, raw);
            self.state.levers.insert(lever, value);
            out.push(Frame::sound(lever_command(lever), value));
        }
    }

    fn update_reverser(&mut self, raw: i32, out: &mut Vec<Frame>) {
        let scaled = scale(self.calibration.reverser, raw);
        if scaled.abs_diff(self.state.reverser_scaled) <= self.config.reverser_deadband {
            return;
        }
        self.state.reverser_scaled = scaled;
        let direction = Direction::classify(scaled);
        if direction != self.state.reverser {
            self.state.reverser = direction;
            out.push(Frame::sound(Command::Reverser, direction.value()));
        }
    }

    fn update_handbrake(&mut self, raw: i32, out: &mut Vec<Frame>) {
        if raw == BUTTON_DOWN {
            self.state.handbrake_latched = !self.state.handbrake_latched;
            out.push(Frame::sound(self.handbrake_command(), 1));
        } else if raw == BUTTON_UP {
            out.push(Frame::sound(self.handbrake_command(), 0));
        }
    }

    fn handbrake_command(&self) -> Command {
        if self.state.handbrake_latched {
            Command::ParkBrakeSet
        } else {
            Command::ParkBrakeRelease
        }
    }

    fn update_shifted(
        &mut self,
        kind: ShiftedKind,
        raw: i32,
        alt: bool,
        now: Instant,
        out: &mut Vec<Frame>,
    ) {
        if !alt {
            passthrough(kind.command(), raw, out);
            return;
        }

        match kind {
            ShiftedKind::Sand => {}
            ShiftedKind::Horn => {
                if raw == BUTTON_DOWN {
                    log::info!("Recalibration requested from console");
                    self.state.calibration_requested = true;
                }
            }
            ShiftedKind::Bail => {
                if raw == BUTTON_UP {
                    self.toggle_auto_alerter(now, out);
                }
            }
            ShiftedKind::Counter => match raw {
                COUNTER_UP => out.push(Frame::sound(Command::ParkBrakeSet, 1)),
                COUNTER_DOWN => out.push(Frame::sound(Command::ParkBrakeRelease, 1)),
                COUNTER_CENTER => {
                    out.push(Frame::sound(Command::ParkBrakeSet, 0));
                    out.push(Frame::sound(Command::ParkBrakeRelease, 0));
                }
                other => log::warn!("Unexpected counter position {}", other),
            },
        }
    }

    fn toggle_auto_alerter(&mut self, now: Instant, out: &mut Vec<Frame>) {
        let alerter = &mut self.state.alerter;
        alerter.armed = !alerter.armed;
        alerter.last_press = now;
        if !alerter.armed && alerter.pressed {
            alerter.pressed = false;
            out.push(Frame::quiet(Command::Alerter, 0));
        }
        log::info!("Auto-alerter {}", if alerter.armed { "armed" } else { "disarmed" });
    }

    fn service_alerter(&mut self, now: Instant, out: &mut Vec<Frame>) {
        let interval = self.config.alerter_interval();
        let hold = self.config.alerter_hold();
        let alerter = &mut self.state.alerter;
        if !alerter.armed {
            return;
        }

        let elapsed = now.saturating_duration_since(alerter.last_press);
        if alerter.pressed {
            if elapsed >= interval + hold {
                alerter.pressed = false;
                alerter.last_press = now;
                out.push(Frame::quiet(Command::Alerter, 0));
            }
        } else if elapsed >= interval {
            alerter.pressed = true;
            out.push(Frame::quiet(Command::Alerter, 1));
        }
    }

    /// True once the operator asked for recalibration
    pub fn calibration_requested(&self) -> bool {
        self.state.calibration_requested
    }

    /// Consume a pending recalibration request
    pub fn take_calibration_request(&mut self) -> bool {
        std::mem::take(&mut self.state.calibration_requested)
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    /// Replace the ranges used for scaling and notch lookup
    pub fn set_calibration(&mut self, calibration: Calibration) {
        self.calibration = calibration;
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn auto_alerter_armed(&self) -> bool {
        self.state.alerter.armed
    }

    pub fn current_notch(&self) -> usize {
        self.state.notch
    }

    pub fn reverser(&self) -> Direction {
        self.state.reverser
    }

    pub fn toggle_state(&self, kind: ToggleKind) -> u8 {
        self.state.toggles.get(&kind).copied().unwrap_or(0)
    }

    pub fn handbrake_latched(&self) -> bool {
        self.state.handbrake_latched
    }
}

fn check_length(channels: &ChannelMap, sample: &[i32]) -> Result<()> {
    if sample.len() < channels.len() {
        return Err(BridgeError::SampleLength {
            expected: channels.len(),
            actual: sample.len(),
        });
    }
    Ok(())
}

fn passthrough(command: Command, raw: i32, out: &mut Vec<Frame>) {
    match Frame::new(MessageClass::Sound, command, raw) {
        Ok(frame) => out.push(frame),
        Err(e) => log::warn!("Dropping {} update: {}", command, e),
    }
}
