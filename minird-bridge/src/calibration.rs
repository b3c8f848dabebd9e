//! Calibration store
//!
//! Holds the raw ADC ranges of the three brake levers, the reverser and the
//! nine throttle notches, and persists them as a JSON document:
//!
//! ```text
//! {
//!   "auto": { "min": 0, "max": 1023 },
//!   "indy": { "min": 0, "max": 1023 },
//!   "dyn":  { "min": 0, "max": 1023 },
//!   "rev":  { "min": 0, "max": 1023 },
//!   "thr0": { "min": 0, "max": 113 },
//!   ...
//!   "thr8": { "min": 909, "max": 1023 }
//! }
//! ```
//!
//! Older files only carry a coarse `thr` range and no `rev`; those are
//! upgraded in place the first time they are loaded.

use crate::types::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Number of throttle notches (0-8)
pub const NOTCH_COUNT: usize = 9;

/// Range used when nothing has been calibrated yet (10-bit ADC)
pub const DEFAULT_RANGE: CalibrationRange = CalibrationRange { min: 0, max: 1023 };

const KEY_AUTO: &str = "auto";
const KEY_INDY: &str = "indy";
const KEY_DYN: &str = "dyn";
const KEY_REVERSER: &str = "rev";
const KEY_LEGACY_THROTTLE: &str = "thr";

fn notch_key(notch: usize) -> String {
    format!("thr{}", notch)
}

/// Raw bounds of one lever or one throttle notch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalibrationRange {
    pub min: i32,
    pub max: i32,
}

impl CalibrationRange {
    pub const fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }

    /// Range spanned by two samples, in either order
    pub fn from_samples(a: i32, b: i32) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    pub fn span(&self) -> i32 {
        self.max - self.min
    }

    /// Inclusive containment after widening both ends by `margin`
    pub fn contains_with_margin(&self, raw: i32, margin: i32) -> bool {
        raw >= self.min - margin && raw <= self.max + margin
    }

    /// A range used as a scaling divisor must be ordered and non-empty
    fn check_scaling(&self, key: &str) -> Result<()> {
        if self.max < self.min {
            return Err(BridgeError::InvertedRange {
                key: key.to_string(),
                min: self.min,
                max: self.max,
            });
        }
        if self.span() == 0 {
            return Err(BridgeError::ZeroSpan(key.to_string()));
        }
        Ok(())
    }

    /// Notch bands may collapse to a single raw value, but not invert
    fn check_band(&self, key: &str) -> Result<()> {
        if self.max < self.min {
            return Err(BridgeError::InvertedRange {
                key: key.to_string(),
                min: self.min,
                max: self.max,
            });
        }
        Ok(())
    }
}

/// The three continuous brake levers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lever {
    Auto,
    Indy,
    Dyn,
}

impl Lever {
    pub fn key(self) -> &'static str {
        match self {
            Lever::Auto => KEY_AUTO,
            Lever::Indy => KEY_INDY,
            Lever::Dyn => KEY_DYN,
        }
    }
}

/// Full set of calibrated ranges
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Calibration {
    pub auto: CalibrationRange,
    pub indy: CalibrationRange,
    pub dyn_brake: CalibrationRange,
    pub reverser: CalibrationRange,
    pub notches: [CalibrationRange; NOTCH_COUNT],
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            auto: DEFAULT_RANGE,
            indy: DEFAULT_RANGE,
            dyn_brake: DEFAULT_RANGE,
            reverser: DEFAULT_RANGE,
            notches: even_notches(DEFAULT_RANGE),
        }
    }
}

impl Calibration {
    pub fn lever(&self, lever: Lever) -> CalibrationRange {
        match lever {
            Lever::Auto => self.auto,
            Lever::Indy => self.indy,
            Lever::Dyn => self.dyn_brake,
        }
    }

    pub fn set_lever(&mut self, lever: Lever, range: CalibrationRange) {
        match lever {
            Lever::Auto => self.auto = range,
            Lever::Indy => self.indy = range,
            Lever::Dyn => self.dyn_brake = range,
        }
    }

    /// Reject ranges that cannot be used for scaling or lookup
    pub fn validate(&self) -> Result<()> {
        for lever in [Lever::Auto, Lever::Indy, Lever::Dyn] {
            self.lever(lever).check_scaling(lever.key())?;
        }
        self.reverser.check_scaling(KEY_REVERSER)?;
        for (i, notch) in self.notches.iter().enumerate() {
            notch.check_band(&notch_key(i))?;
        }
        Ok(())
    }

    /// Build from the persisted key map.
    ///
    /// Returns the calibration and whether a legacy layout was upgraded.
    pub fn from_map(map: &BTreeMap<String, CalibrationRange>) -> Result<(Self, bool)> {
        let required = |key: &str| {
            map.get(key)
                .copied()
                .ok_or_else(|| BridgeError::MissingCalibrationKey(key.to_string()))
        };

        let mut migrated = false;

        let reverser = match map.get(KEY_REVERSER) {
            Some(range) => *range,
            None => {
                log::info!("No reverser calibration found, using default range");
                migrated = true;
                DEFAULT_RANGE
            }
        };

        let stored: Option<Vec<CalibrationRange>> = (0..NOTCH_COUNT)
            .map(|i| map.get(&notch_key(i)).copied())
            .collect();
        let notches = match stored {
            Some(list) => {
                let mut notches = [DEFAULT_RANGE; NOTCH_COUNT];
                notches.copy_from_slice(&list);
                notches
            }
            None => {
                let coarse = map.get(KEY_LEGACY_THROTTLE).copied().unwrap_or(DEFAULT_RANGE);
                log::info!(
                    "Deriving throttle notches from coarse range {}..{}",
                    coarse.min,
                    coarse.max
                );
                coarse.check_scaling(KEY_LEGACY_THROTTLE)?;
                migrated = true;
                even_notches(coarse)
            }
        };

        let calibration = Self {
            auto: required(KEY_AUTO)?,
            indy: required(KEY_INDY)?,
            dyn_brake: required(KEY_DYN)?,
            reverser,
            notches,
        };
        calibration.validate()?;

        Ok((calibration, migrated))
    }

    /// Key map in the persisted layout
    pub fn to_map(&self) -> BTreeMap<String, CalibrationRange> {
        let mut map = BTreeMap::new();
        map.insert(KEY_AUTO.to_string(), self.auto);
        map.insert(KEY_INDY.to_string(), self.indy);
        map.insert(KEY_DYN.to_string(), self.dyn_brake);
        map.insert(KEY_REVERSER.to_string(), self.reverser);
        for (i, notch) in self.notches.iter().enumerate() {
            map.insert(notch_key(i), *notch);
        }
        map
    }
}

/// Split a coarse throttle range into nine even, touching bands
pub fn even_notches(range: CalibrationRange) -> [CalibrationRange; NOTCH_COUNT] {
    let span = i64::from(range.span());
    let edge = |i: usize| range.min + (span * i as i64 / NOTCH_COUNT as i64) as i32;
    let mut notches = [DEFAULT_RANGE; NOTCH_COUNT];
    for (i, notch) in notches.iter_mut().enumerate() {
        *notch = CalibrationRange::new(edge(i), edge(i + 1));
    }
    notches
}

/// Calibration ranges backed by a file on disk
#[derive(Debug)]
pub struct CalibrationStore {
    path: PathBuf,
    calibration: Calibration,
}

impl CalibrationStore {
    /// Load the store, creating a default file when none exists
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::warn!("Calibration file {:?} not found - creating default", path);
            let calibration = Calibration::default();
            if let Err(e) = write_calibration(path, &calibration) {
                log::error!("Could not create calibration file {:?}: {}", path, e);
            }
            return Ok(Self {
                path: path.to_path_buf(),
                calibration,
            });
        }

        let content = fs::read_to_string(path)?;
        let map: BTreeMap<String, CalibrationRange> = serde_json::from_str(&content)?;
        let (calibration, migrated) = Calibration::from_map(&map)?;

        if migrated {
            log::info!("Upgrading calibration file {:?}", path);
            if let Err(e) = write_calibration(path, &calibration) {
                log::error!("Could not upgrade calibration file {:?}: {}", path, e);
            }
        }

        log::info!("Calibration loaded from {:?}", path);
        Ok(Self {
            path: path.to_path_buf(),
            calibration,
        })
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Validate and persist new ranges.
    ///
    /// The in-memory copy only changes once the file has been written.
    pub fn save(&mut self, calibration: Calibration) -> Result<()> {
        calibration.validate()?;
        write_calibration(&self.path, &calibration)?;
        self.calibration = calibration;
        log::info!("Calibration saved to {:?}", self.path);
        Ok(())
    }
}

fn write_calibration(path: &Path, calibration: &Calibration) -> Result<()> {
    let json = serde_json::to_string_pretty(&calibration.to_map())?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
