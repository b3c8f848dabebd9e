//! Logical channel variants
//!
//! Each position of the status vector is classified once, at startup, into
//! the behavior the engine applies when that position changes.

use crate::calibration::Lever;
use crate::commands::{Command, CommandTable};

/// Multi-state buttons that advance one state per press
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToggleKind {
    Wiper,
    HeadlightFront,
    HeadlightRear,
    SlowSpeed,
    GaugeLight,
    CabLight,
}

impl ToggleKind {
    pub fn command(self) -> Command {
        match self {
            ToggleKind::Wiper => Command::Wiper,
            ToggleKind::HeadlightFront => Command::HeadlightFront,
            ToggleKind::HeadlightRear => Command::HeadlightRear,
            ToggleKind::SlowSpeed => Command::SlowSpeedToggle,
            ToggleKind::GaugeLight => Command::GaugeLight,
            ToggleKind::CabLight => Command::CabLight,
        }
    }

    /// Number of positions the simulator control cycles through
    pub fn states(self) -> u8 {
        match self {
            ToggleKind::Wiper => 4,
            ToggleKind::HeadlightFront | ToggleKind::HeadlightRear => 3,
            ToggleKind::SlowSpeed | ToggleKind::GaugeLight | ToggleKind::CabLight => 2,
        }
    }
}

/// Buttons whose meaning changes while the alerter is held
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShiftedKind {
    Sand,
    Horn,
    Bail,
    Counter,
}

impl ShiftedKind {
    pub fn command(self) -> Command {
        match self {
            ShiftedKind::Sand => Command::Sand,
            ShiftedKind::Horn => Command::Horn,
            ShiftedKind::Bail => Command::Bail,
            ShiftedKind::Counter => Command::Counter,
        }
    }
}

/// Behavior attached to one status-vector position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Throttle,
    Lever(Lever),
    Reverser,
    Toggle(ToggleKind),
    HandbrakeLatch,
    Shifted(ShiftedKind),
    Passthrough(Command),
    PairedIncDec { inc: Command, dec: Command },
    Ignored,
}

impl Channel {
    /// Classify the command reported at a status-vector position
    pub fn for_command(command: Command) -> Self {
        match command {
            Command::Throttle => Channel::Throttle,
            Command::AutoBrake => Channel::Lever(Lever::Auto),
            Command::IndyBrake => Channel::Lever(Lever::Indy),
            Command::DynBrake => Channel::Lever(Lever::Dyn),
            Command::Reverser => Channel::Reverser,
            Command::Wiper => Channel::Toggle(ToggleKind::Wiper),
            Command::HeadlightFront => Channel::Toggle(ToggleKind::HeadlightFront),
            Command::HeadlightRear => Channel::Toggle(ToggleKind::HeadlightRear),
            Command::SlowSpeedToggle => Channel::Toggle(ToggleKind::SlowSpeed),
            Command::GaugeLight => Channel::Toggle(ToggleKind::GaugeLight),
            Command::CabLight => Channel::Toggle(ToggleKind::CabLight),
            Command::ParkBrakeSet => Channel::HandbrakeLatch,
            Command::Sand => Channel::Shifted(ShiftedKind::Sand),
            Command::Horn => Channel::Shifted(ShiftedKind::Horn),
            Command::Bail => Channel::Shifted(ShiftedKind::Bail),
            Command::Counter => Channel::Shifted(ShiftedKind::Counter),
            Command::Bell
            | Command::Alerter
            | Command::BreakerEngineRun
            | Command::BreakerGenField
            | Command::BreakerControl
            | Command::DpuDynSetup => Channel::Passthrough(command),
            Command::DpuFenceIncrease => Channel::PairedIncDec {
                inc: Command::DpuFenceIncrease,
                dec: Command::DpuFenceDecrease,
            },
            Command::DpuThrottleIncrease => Channel::PairedIncDec {
                inc: Command::DpuThrottleIncrease,
                dec: Command::DpuThrottleDecrease,
            },
            _ => Channel::Ignored,
        }
    }
}

/// Simulator command driven by a brake lever
pub fn lever_command(lever: Lever) -> Command {
    match lever {
        Lever::Auto => Command::AutoBrake,
        Lever::Indy => Command::IndyBrake,
        Lever::Dyn => Command::DynBrake,
    }
}

/// Dispatch table built from the command table
#[derive(Debug, Clone)]
pub struct ChannelMap {
    channels: Vec<Channel>,
    alt_channel: Option<usize>,
}

impl ChannelMap {
    pub fn from_table(table: &CommandTable) -> Self {
        let channels = table
            .entries()
            .iter()
            .map(|e| Channel::for_command(e.command))
            .collect();
        Self {
            channels,
            alt_channel: table.channel_of(Command::Alerter),
        }
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn get(&self, index: usize) -> Channel {
        self.channels.get(index).copied().unwrap_or(Channel::Ignored)
    }

    /// Position of the modifier ("alt") button
    pub fn alt_channel(&self) -> Option<usize> {
        self.alt_channel
    }
}
