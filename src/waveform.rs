use serde::{Deserialize, Serialize};

// Unsigned 8-bit samples straight out of the waveform block, plus the spread
// between the largest and smallest of them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCapture {
    samples: Vec<u8>,
    byte_range: u8,
}

impl RawCapture {

    pub fn new(samples: Vec<u8>) -> Self {
        let byte_range = match (samples.iter().max(), samples.iter().min()) {
            (Some(hi), Some(lo)) => hi - lo,
            _ => 0,
        };
        Self { samples, byte_range }
    }

    pub fn samples(&self) -> &[u8] { &self.samples }
    pub fn len(&self) -> usize { self.samples.len() }
    pub fn is_empty(&self) -> bool { self.samples.is_empty() }
    pub fn byte_range(&self) -> u8 { self.byte_range }
    pub fn min(&self) -> Option<u8> { self.samples.iter().copied().min() }
    pub fn max(&self) -> Option<u8> { self.samples.iter().copied().max() }

    // time[i] = i * dt
    pub fn time_axis(&self, time_increment_s: f64) -> Vec<f64> {
        (0..self.samples.len()).map(|i| i as f64 * time_increment_s).collect()
    }

}

// A capture in physical units. Always produced from a RawCapture and the
// calibration in force at the time, never stored on its own.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhysicalTrace {
    pub time_s: Vec<f64>,
    pub voltage_v: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TraceSummary {
    pub points: usize,
    pub duration_s: f64,
    pub min_v: f64,
    pub max_v: f64,
}

impl PhysicalTrace {

    pub fn len(&self) -> usize { self.voltage_v.len() }
    pub fn is_empty(&self) -> bool { self.voltage_v.is_empty() }

    pub fn summary(&self) -> TraceSummary {
        let min_v = self.voltage_v.iter().copied().fold(f64::INFINITY, f64::min);
        let max_v = self.voltage_v.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        TraceSummary {
            points: self.len(),
            duration_s: self.time_s.last().copied().unwrap_or(0.0),
            min_v: if self.is_empty() { 0.0 } else { min_v },
            max_v: if self.is_empty() { 0.0 } else { max_v },
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_range_is_max_minus_min() {
        let raw = RawCapture::new(vec![40, 200, 12, 90]);
        assert_eq!(raw.byte_range(), 188);
        assert_eq!(raw.min(), Some(12));
        assert_eq!(raw.max(), Some(200));
        assert_eq!(RawCapture::new(vec![]).byte_range(), 0);
    }

    #[test]
    fn time_axis_steps_by_increment() {
        let raw = RawCapture::new(vec![0; 4]);
        assert_eq!(raw.time_axis(0.5), vec![0.0, 0.5, 1.0, 1.5]);
    }

    #[test]
    fn summary_of_a_trace() {
        let trace = PhysicalTrace { time_s: vec![0.0, 1e-3, 2e-3], voltage_v: vec![0.5, -1.0, 3.0] };
        let s = trace.summary();
        assert_eq!(s.points, 3);
        assert_eq!(s.duration_s, 2e-3);
        assert_eq!(s.min_v, -1.0);
        assert_eq!(s.max_v, 3.0);
    }
}
