//! Wire codec for simulator frames and controller status lines
//!
//! Outbound frames are five bytes:
//! ```text
//! [0]  class    : u8  (96 = quiet, 224 = sound)
//! [1]  reserved : u8  = 0
//! [2]  code     : u8  command number
//! [3]  value    : u8
//! [4]  checksum : u8  class ^ code ^ value
//! ```
//!
//! Inbound status lines are ASCII, comma separated, one integer per channel.

use crate::commands::{Command, CLASS_QUIET, CLASS_SOUND};
use crate::types::{BridgeError, RawSample, Result};
use std::fmt;

/// Size of an encoded frame in bytes
pub const FRAME_LEN: usize = 5;

/// Whether the simulator should play the cab sound for an update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageClass {
    Quiet,
    Sound,
}

impl MessageClass {
    pub fn byte(self) -> u8 {
        match self {
            MessageClass::Quiet => CLASS_QUIET,
            MessageClass::Sound => CLASS_SOUND,
        }
    }

    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            CLASS_QUIET => Some(MessageClass::Quiet),
            CLASS_SOUND => Some(MessageClass::Sound),
            _ => None,
        }
    }
}

/// A single simulator state update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub class: MessageClass,
    pub code: u8,
    pub value: u8,
}

impl Frame {
    /// Build a frame for a known command, validating the value range
    pub fn new(class: MessageClass, command: Command, value: i32) -> Result<Self> {
        let value = u8::try_from(value).map_err(|_| BridgeError::ValueOutOfRange(value))?;
        Ok(Self {
            class,
            code: command.code(),
            value,
        })
    }

    /// Sound-class frame for a command
    pub fn sound(command: Command, value: u8) -> Self {
        Self {
            class: MessageClass::Sound,
            code: command.code(),
            value,
        }
    }

    /// Quiet-class frame for a command
    pub fn quiet(command: Command, value: u8) -> Self {
        Self {
            class: MessageClass::Quiet,
            code: command.code(),
            value,
        }
    }

    pub fn command(&self) -> Option<Command> {
        Command::from_code(self.code)
    }

    pub fn checksum(&self) -> u8 {
        checksum(&[self.class.byte(), self.code, self.value])
    }

    pub fn encode(&self) -> [u8; FRAME_LEN] {
        [self.class.byte(), 0, self.code, self.value, self.checksum()]
    }

    /// Decode a five-byte frame, verifying layout and checksum
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() != FRAME_LEN {
            return Err(BridgeError::InvalidFrame(format!(
                "expected {} bytes, got {}",
                FRAME_LEN,
                buf.len()
            )));
        }
        let class = MessageClass::from_byte(buf[0]).ok_or_else(|| {
            BridgeError::InvalidFrame(format!("unknown message class {}", buf[0]))
        })?;
        if buf[1] != 0 {
            return Err(BridgeError::InvalidFrame(format!(
                "reserved byte is {}",
                buf[1]
            )));
        }
        let frame = Self {
            class,
            code: buf[2],
            value: buf[3],
        };
        if frame.checksum() != buf[4] {
            return Err(BridgeError::InvalidFrame(format!(
                "checksum mismatch: 0x{:02X} != 0x{:02X}",
                frame.checksum(),
                buf[4]
            )));
        }
        Ok(frame)
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.command() {
            Some(cmd) => write!(f, "{} {}", cmd, self.value),
            None => write!(f, "cmd#{} {}", self.code, self.value),
        }
    }
}

/// Running XOR over the given bytes
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |acc, b| acc ^ b)
}

/// Encode a frame from loosely typed inputs.
///
/// Rejects values outside 0-255 and codes that do not fit a byte.
pub fn encode(class: MessageClass, code: u32, value: i32) -> Result<[u8; FRAME_LEN]> {
    let code = u8::try_from(code).map_err(|_| BridgeError::InvalidCommandCode(code))?;
    let value = u8::try_from(value).map_err(|_| BridgeError::ValueOutOfRange(value))?;
    Ok(Frame { class, code, value }.encode())
}

/// Split a comma-separated status line into channel values
pub fn decode_vector(line: &str) -> Result<RawSample> {
    let line = line.trim();
    if line.is_empty() {
        return Err(BridgeError::EmptySample);
    }

    line.split(',')
        .enumerate()
        .map(|(index, field)| {
            let field = field.trim();
            match field.parse::<i32>() {
                Ok(v) if v >= 0 => Ok(v),
                _ => Err(BridgeError::MalformedSample {
                    index,
                    field: field.to_string(),
                }),
            }
        })
        .collect()
}
