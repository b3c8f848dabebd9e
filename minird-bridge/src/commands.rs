//! Simulator command table
//!
//! Command numbers follow the simulator's UDP control API. The controller
//! reports its channels in a fixed order; [`CHANNEL_ORDER`] maps each
//! position of the raw status vector to the command it drives.

use std::fmt;

/// Message class byte: update without cab sound
pub const CLASS_QUIET: u8 = 96;
/// Message class byte: update and play the cab sound
pub const CLASS_SOUND: u8 = 224;

/// Discrete reverser values understood by the simulator
pub const REVERSER_REVERSE: u8 = 0;
pub const REVERSER_NEUTRAL: u8 = 127;
pub const REVERSER_FORWARD: u8 = 255;

/// Simulator control commands
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Alerter = 1,
    Bell = 2,
    Counter = 3,
    DynBrake = 4,
    HeadlightFront = 5,
    HeadlightRear = 6,
    MuHeadlight = 7,
    Horn = 8,
    IndyBrake = 9,
    Bail = 10,
    IsoSwitch = 11,
    ParkBrakeSet = 12,
    ParkBrakeRelease = 13,
    Reverser = 14,
    Sand = 15,
    Throttle = 16,
    TractionMotors = 17,
    AutoBrake = 18,
    Wiper = 19,
    Dtmf0 = 20,
    Dtmf1 = 21,
    Dtmf2 = 22,
    Dtmf3 = 23,
    Dtmf4 = 24,
    Dtmf5 = 25,
    Dtmf6 = 26,
    Dtmf7 = 27,
    Dtmf8 = 28,
    Dtmf9 = 29,
    DtmfPound = 30,
    DtmfStar = 31,
    RadioVolumeUp = 32,
    RadioVolumeDown = 33,
    RadioMute = 34,
    RadioChannelMode = 35,
    RadioDtmfMode = 36,
    BreakerControl = 37,
    BreakerDynBrake = 38,
    BreakerEngineRun = 39,
    BreakerGenField = 40,
    CabLight = 41,
    StepLight = 42,
    GaugeLight = 43,
    EmergencyStop = 44,
    AutoStart = 45,
    AutoMu = 46,
    AutoCircuitBreakers = 47,
    AutoAirBrake = 48,
    AutoEot = 49,
    EngineStart = 50,
    EngineStop = 51,
    HepSwitch = 52,
    TrainBrakeCutoff = 53,
    ServiceSelect = 54,
    SlowSpeedToggle = 55,
    SlowSpeedIncrease = 56,
    SlowSpeedDecrease = 57,
    DpuThrottleIncrease = 58,
    DpuThrottleDecrease = 59,
    DpuDynSetup = 60,
    DpuFenceIncrease = 61,
    DpuFenceDecrease = 62,
}

impl Command {
    /// Protocol command code
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Human-readable name used in logs
    pub fn name(self) -> &'static str {
        match self {
            Command::Alerter => "alerter",
            Command::Bell => "bell",
            Command::Counter => "counter",
            Command::DynBrake => "dyn_brake",
            Command::HeadlightFront => "headlight_front",
            Command::HeadlightRear => "headlight_rear",
            Command::MuHeadlight => "mu_headlight",
            Command::Horn => "horn",
            Command::IndyBrake => "indy_brake",
            Command::Bail => "bail",
            Command::IsoSwitch => "iso_switch",
            Command::ParkBrakeSet => "park_brake_set",
            Command::ParkBrakeRelease => "park_brake_release",
            Command::Reverser => "reverser",
            Command::Sand => "sand",
            Command::Throttle => "throttle",
            Command::TractionMotors => "traction_motors",
            Command::AutoBrake => "auto_brake",
            Command::Wiper => "wiper",
            Command::Dtmf0 => "dtmf_0",
            Command::Dtmf1 => "dtmf_1",
            Command::Dtmf2 => "dtmf_2",
            Command::Dtmf3 => "dtmf_3",
            Command::Dtmf4 => "dtmf_4",
            Command::Dtmf5 => "dtmf_5",
            Command::Dtmf6 => "dtmf_6",
            Command::Dtmf7 => "dtmf_7",
            Command::Dtmf8 => "dtmf_8",
            Command::Dtmf9 => "dtmf_9",
            Command::DtmfPound => "dtmf_pound",
            Command::DtmfStar => "dtmf_star",
            Command::RadioVolumeUp => "radio_vol_up",
            Command::RadioVolumeDown => "radio_vol_down",
            Command::RadioMute => "radio_mute",
            Command::RadioChannelMode => "radio_ch_mode",
            Command::RadioDtmfMode => "radio_dtmf_mode",
            Command::BreakerControl => "control",
            Command::BreakerDynBrake => "cktbrk_dyn_brake",
            Command::BreakerEngineRun => "eng_run",
            Command::BreakerGenField => "gen_field",
            Command::CabLight => "cab_light",
            Command::StepLight => "step_light",
            Command::GaugeLight => "gauge_light",
            Command::EmergencyStop => "emergency_stop",
            Command::AutoStart => "auto_start",
            Command::AutoMu => "auto_mu",
            Command::AutoCircuitBreakers => "auto_cb",
            Command::AutoAirBrake => "auto_ab",
            Command::AutoEot => "auto_eot",
            Command::EngineStart => "engine_start",
            Command::EngineStop => "engine_stop",
            Command::HepSwitch => "hep_switch",
            Command::TrainBrakeCutoff => "train_brake_cutoff",
            Command::ServiceSelect => "service_select",
            Command::SlowSpeedToggle => "slow_speed_toggle",
            Command::SlowSpeedIncrease => "slow_speed_inc",
            Command::SlowSpeedDecrease => "slow_speed_dec",
            Command::DpuThrottleIncrease => "dpu_thr_inc",
            Command::DpuThrottleDecrease => "dpu_thr_dec",
            Command::DpuDynSetup => "dpu_dyn_setup",
            Command::DpuFenceIncrease => "dpu_fence_inc",
            Command::DpuFenceDecrease => "dpu_fence_dec",
        }
    }

    /// Look up a command by its protocol code
    pub fn from_code(code: u8) -> Option<Self> {
        ALL_COMMANDS.iter().copied().find(|c| c.code() == code)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Every command in code order
pub const ALL_COMMANDS: [Command; 62] = [
    Command::Alerter,
    Command::Bell,
    Command::Counter,
    Command::DynBrake,
    Command::HeadlightFront,
    Command::HeadlightRear,
    Command::MuHeadlight,
    Command::Horn,
    Command::IndyBrake,
    Command::Bail,
    Command::IsoSwitch,
    Command::ParkBrakeSet,
    Command::ParkBrakeRelease,
    Command::Reverser,
    Command::Sand,
    Command::Throttle,
    Command::TractionMotors,
    Command::AutoBrake,
    Command::Wiper,
    Command::Dtmf0,
    Command::Dtmf1,
    Command::Dtmf2,
    Command::Dtmf3,
    Command::Dtmf4,
    Command::Dtmf5,
    Command::Dtmf6,
    Command::Dtmf7,
    Command::Dtmf8,
    Command::Dtmf9,
    Command::DtmfPound,
    Command::DtmfStar,
    Command::RadioVolumeUp,
    Command::RadioVolumeDown,
    Command::RadioMute,
    Command::RadioChannelMode,
    Command::RadioDtmfMode,
    Command::BreakerControl,
    Command::BreakerDynBrake,
    Command::BreakerEngineRun,
    Command::BreakerGenField,
    Command::CabLight,
    Command::StepLight,
    Command::GaugeLight,
    Command::EmergencyStop,
    Command::AutoStart,
    Command::AutoMu,
    Command::AutoCircuitBreakers,
    Command::AutoAirBrake,
    Command::AutoEot,
    Command::EngineStart,
    Command::EngineStop,
    Command::HepSwitch,
    Command::TrainBrakeCutoff,
    Command::ServiceSelect,
    Command::SlowSpeedToggle,
    Command::SlowSpeedIncrease,
    Command::SlowSpeedDecrease,
    Command::DpuThrottleIncrease,
    Command::DpuThrottleDecrease,
    Command::DpuDynSetup,
    Command::DpuFenceIncrease,
    Command::DpuFenceDecrease,
];

/// Position of each channel in the controller's status vector.
///
/// The DPU fence and DPU throttle positions carry a tri-state selector and
/// are listed under their "increase" command.
pub const CHANNEL_ORDER: [Command; 24] = [
    Command::AutoBrake,
    Command::IndyBrake,
    Command::DynBrake,
    Command::Throttle,
    Command::Reverser,
    Command::Counter,
    Command::DpuFenceIncrease,
    Command::DpuThrottleIncrease,
    Command::DpuDynSetup,
    Command::SlowSpeedToggle,
    Command::ParkBrakeSet,
    Command::Wiper,
    Command::Sand,
    Command::Bell,
    Command::Alerter,
    Command::GaugeLight,
    Command::CabLight,
    Command::BreakerEngineRun,
    Command::BreakerGenField,
    Command::BreakerControl,
    Command::Bail,
    Command::Horn,
    Command::HeadlightFront,
    Command::HeadlightRear,
];

/// One row of the command table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandEntry {
    /// Position in the raw status vector
    pub channel: usize,
    /// Command driven by that position
    pub command: Command,
}

impl CommandEntry {
    pub fn name(&self) -> &'static str {
        self.command.name()
    }
}

/// Table of controller channels, in status-vector order
#[derive(Debug, Clone)]
pub struct CommandTable {
    entries: Vec<CommandEntry>,
}

impl CommandTable {
    /// Build a table from an explicit channel order
    pub fn new(order: &[Command]) -> Self {
        let entries = order
            .iter()
            .enumerate()
            .map(|(channel, &command)| CommandEntry { channel, command })
            .collect();
        Self { entries }
    }

    /// Channel layout of the miniRD console firmware
    pub fn minird() -> Self {
        Self::new(&CHANNEL_ORDER)
    }

    pub fn entries(&self) -> &[CommandEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Status-vector position of a command, if the console has it
    pub fn channel_of(&self, command: Command) -> Option<usize> {
        self.entries
            .iter()
            .find(|e| e.command == command)
            .map(|e| e.channel)
    }
}

impl Default for CommandTable {
    fn default() -> Self {
        Self::minird()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_codes_are_unique_and_sequential() {
        let codes: HashSet<u8> = ALL_COMMANDS.iter().map(|c| c.code()).collect();
        assert_eq!(codes.len(), ALL_COMMANDS.len());
        for (i, cmd) in ALL_COMMANDS.iter().enumerate() {
            assert_eq!(cmd.code() as usize, i + 1);
        }
    }

    #[test]
    fn test_from_code() {
        assert_eq!(Command::from_code(18), Some(Command::AutoBrake));
        assert_eq!(Command::from_code(62), Some(Command::DpuFenceDecrease));
        assert_eq!(Command::from_code(0), None);
        assert_eq!(Command::from_code(63), None);
    }

    #[test]
    fn test_minird_channel_layout() {
        let table = CommandTable::minird();
        assert_eq!(table.len(), 24);
        assert_eq!(table.channel_of(Command::AutoBrake), Some(0));
        assert_eq!(table.channel_of(Command::Throttle), Some(3));
        assert_eq!(table.channel_of(Command::Alerter), Some(14));
        assert_eq!(table.channel_of(Command::HeadlightRear), Some(23));
        assert_eq!(table.channel_of(Command::Dtmf0), None);
        assert_eq!(table.entries()[21].name(), "horn");
    }
}
