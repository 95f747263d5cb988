// Turning raw bytes into volts. The resolver only ever proposes numbers; which
// one becomes the active calibration is always the operator's call.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::devices::rigol::Acquisition;
use crate::error::{Result, ScopeError};

// The scope's front-panel calibration output
pub const CALIBRATION_AMPLITUDE_V:f64 = 3.0;
pub const CALIBRATION_FREQUENCY_HZ:f64 = 1_000.0;

// Byte counts per vertical division, as a scale factor divisor
pub const COUNTS_PER_DIVISION:f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScaleSource {
    // amplitude / byte_range
    ByteRange,
    // volts per division / 20
    VoltsPerDivision,
    // y_increment straight from the preamble
    YIncrement,
}

impl ScaleSource {
    pub fn describe(self) -> &'static str {
        match self {
            ScaleSource::ByteRange        => "3.0 / byteRange",
            ScaleSource::VoltsPerDivision => "voltscale / 20",
            ScaleSource::YIncrement       => "y_increment",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScaleCandidate {
    pub source: ScaleSource,
    pub value: f64,
}

impl ScaleCandidate {
    pub fn is_usable(&self) -> bool { self.value.is_finite() && self.value > 0.0 }
}

// Three independent scale estimates and one offset estimate, unranked
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibrationCandidates {
    pub byte_range: u8,
    pub scales: [ScaleCandidate; 3],
    pub offset_bytes: u8,
}

impl CalibrationCandidates {

    pub fn from_parts(byte_range:u8, volt_scale_per_division:f64, y_increment:f64, min_sample:u8) -> Self {
        CalibrationCandidates {
            byte_range,
            scales: [
                ScaleCandidate{ source: ScaleSource::ByteRange, value: CALIBRATION_AMPLITUDE_V / f64::from(byte_range) },
                ScaleCandidate{ source: ScaleSource::VoltsPerDivision, value: volt_scale_per_division / COUNTS_PER_DIVISION },
                ScaleCandidate{ source: ScaleSource::YIncrement, value: y_increment },
            ],
            offset_bytes: min_sample,
        }
    }

    // Assumes `acq` is the calibration waveform and that its minimum sits at zero volts
    pub fn compute(acq:&Acquisition) -> Result<Self> {
        let min_sample:u8 = acq.raw.min()
            .ok_or_else(|| ScopeError::InvalidCalibration("capture has no samples".to_owned()))?;
        Ok(Self::from_parts(acq.byte_range(), acq.volt_scale(), acq.y_increment(), min_sample))
    }

    pub fn scale_values(&self) -> [f64; 3] { [self.scales[0].value, self.scales[1].value, self.scales[2].value] }

    pub fn scale(&self, index:usize) -> Result<ScaleCandidate> {
        self.scales.get(index).copied()
            .ok_or_else(|| ScopeError::InvalidCalibration(format!("there is no scale candidate {}", index + 1)))
    }

}

impl fmt::Display for CalibrationCandidates {
    fn fmt(&self, f:&mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Assuming a {}V {}Hz wave, we detected scale factors:", CALIBRATION_AMPLITUDE_V, CALIBRATION_FREQUENCY_HZ)?;
        writeln!(f, "Byte range = {}", self.byte_range)?;
        for (idx, c) in self.scales.iter().enumerate() {
            writeln!(f, "  [{}] {:.6} V/byte ({})", idx + 1, c.value, c.source.describe())?;
        }
        write!(f, "Assuming minimum was zero volts: offset = {} bytes", self.offset_bytes)
    }
}

// The scale and offset used to render captures. Starts neutral (1.0, 0) and
// records which half the operator has actually confirmed, so the neutral
// values can't pass for a calibration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationChoice {
    pub scale_v_per_byte: f64,
    pub offset_bytes: f64,
    #[serde(default)]
    pub scale_selected: bool,
    #[serde(default)]
    pub offset_selected: bool,
}

impl Default for CalibrationChoice {
    fn default() -> Self {
        Self{ scale_v_per_byte: 1.0, offset_bytes: 0.0, scale_selected: false, offset_selected: false }
    }
}

impl CalibrationChoice {

    pub fn is_calibrated(&self) -> bool { self.scale_selected && self.offset_selected }

    pub fn with_scale(self, scale_v_per_byte:f64) -> Result<Self> {
        if !(scale_v_per_byte.is_finite() && scale_v_per_byte > 0.0) {
            return Err(ScopeError::InvalidCalibration(format!("scale {} V/byte is not a positive number", scale_v_per_byte)));
        }
        Ok(Self{ scale_v_per_byte, scale_selected: true, ..self })
    }

    pub fn with_offset(self, offset_bytes:f64) -> Result<Self> {
        if !offset_bytes.is_finite() {
            return Err(ScopeError::InvalidCalibration(format!("offset {} bytes is not a number", offset_bytes)));
        }
        Ok(Self{ offset_bytes, offset_selected: true, ..self })
    }

    // voltage = (raw - offset) * scale
    pub fn voltage(&self, raw:u8) -> f64 {
        (f64::from(raw) - self.offset_bytes) * self.scale_v_per_byte
    }

    pub fn load(path:&Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| ScopeError::Config(format!("Unable to read {}: {}", path.display(), e)))?;
        let choice:Self = toml::from_str(&text)
            .map_err(|e| ScopeError::Config(format!("{}: {}", path.display(), e)))?;
        // Re-validate so a hand-edited file can't smuggle in a bad scale
        let checked = Self::default();
        let checked = if choice.scale_selected { checked.with_scale(choice.scale_v_per_byte)? } else { checked };
        let checked = if choice.offset_selected { checked.with_offset(choice.offset_bytes)? } else { checked };
        Ok(checked)
    }

    pub fn save(&self, path:&Path) -> Result<()> {
        let text = toml::to_string(self).map_err(|e| ScopeError::Config(e.to_string()))?;
        fs::write(path, text).map_err(|e| ScopeError::persistence(path, e))
    }

}

impl fmt::Display for CalibrationChoice {
    fn fmt(&self, f:&mut fmt::Formatter) -> fmt::Result {
        if self.scale_selected {
            write!(f, "Selected scale factor: {:.6} V/byte", self.scale_v_per_byte)?;
        } else {
            write!(f, "Scale factor not selected yet")?;
        }
        if self.offset_selected {
            write!(f, ", selected offset: {:.6} bytes", self.offset_bytes)
        } else {
            write!(f, ", offset not selected yet")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a:f64, b:f64) -> bool { (a - b).abs() < 1e-12 }

    #[test]
    fn three_scale_candidates_in_order() {
        let c = CalibrationCandidates::from_parts(250, 1.0, 0.0118, 3);
        let [a, b, y] = c.scale_values();
        assert!(close(a, 0.012));
        assert!(close(b, 0.05));
        assert!(close(y, 0.0118));
        assert_eq!(c.scales[0].source, ScaleSource::ByteRange);
        assert_eq!(c.scales[1].source, ScaleSource::VoltsPerDivision);
        assert_eq!(c.scales[2].source, ScaleSource::YIncrement);
        assert_eq!(c.offset_bytes, 3);
    }

    #[test]
    fn flat_capture_gives_an_unusable_candidate() {
        let c = CalibrationCandidates::from_parts(0, 1.0, 0.0118, 128);
        assert!(!c.scales[0].is_usable());
        assert!(c.scales[2].is_usable());
        assert!(CalibrationChoice::default().with_scale(c.scales[0].value).is_err());
    }

    #[test]
    fn candidate_index_out_of_range() {
        let c = CalibrationCandidates::from_parts(250, 1.0, 0.0118, 3);
        assert!(c.scale(2).is_ok());
        assert!(matches!(c.scale(3), Err(ScopeError::InvalidCalibration(_))));
    }

    #[test]
    fn rescale_is_linear() {
        let choice = CalibrationChoice::default().with_scale(2.0).unwrap().with_offset(10.0).unwrap();
        assert_eq!(choice.voltage(138), 256.0);
        assert_eq!(choice.voltage(10), 0.0);
        assert_eq!(choice.voltage(0), -20.0);
    }

    #[test]
    fn default_is_neutral_and_uncalibrated() {
        let choice = CalibrationChoice::default();
        assert_eq!(choice.voltage(200), 200.0);
        assert!(!choice.is_calibrated());
        let half = choice.with_scale(0.012).unwrap();
        assert!(!half.is_calibrated());
        assert!(half.with_offset(2.0).unwrap().is_calibrated());
    }

    #[test]
    fn saved_choice_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calibration.toml");
        let choice = CalibrationChoice::default().with_scale(0.012).unwrap().with_offset(2.0).unwrap();
        choice.save(&path).unwrap();
        assert_eq!(CalibrationChoice::load(&path).unwrap(), choice);
    }

    #[test]
    fn hand_edited_bad_scale_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calibration.toml");
        std::fs::write(&path, "scale_v_per_byte = -1.0\noffset_bytes = 0.0\nscale_selected = true\n").unwrap();
        assert!(matches!(CalibrationChoice::load(&path), Err(ScopeError::InvalidCalibration(_))));
    }
}
