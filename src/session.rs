// The stateful surface a front-end drives. Owns the calibration in force and
// the most recent capture; every trace it hands back is computed fresh from
// those two.

use std::path::Path;

use log::{info, warn};

use crate::calibration::{CalibrationCandidates, CalibrationChoice};
use crate::config::AcquisitionConfig;
use crate::devices::rigol::{Acquisition, RigolScope};
use crate::devices::CancelToken;
use crate::error::Result;
use crate::storage;
use crate::transport::InstrumentSource;
use crate::waveform::PhysicalTrace;

// voltage[i] = (raw[i] - offset) * scale, time[i] = i * dt
pub fn render_with(acq:&Acquisition, choice:&CalibrationChoice) -> PhysicalTrace {
    PhysicalTrace {
        time_s: acq.time_s.clone(),
        voltage_v: acq.raw.samples().iter().map(|&b| choice.voltage(b)).collect(),
    }
}

pub struct Session<S: InstrumentSource> {
    source: S,
    config: AcquisitionConfig,
    calibration: CalibrationChoice,
    last_capture: Option<Acquisition>,
    cancel: CancelToken,
}

impl<S: InstrumentSource> Session<S> {

    pub fn new(source:S, config:AcquisitionConfig) -> Self {
        Self{ source, config, calibration: CalibrationChoice::default(), last_capture: None, cancel: CancelToken::new() }
    }

    // Hand a clone to whatever should be able to abort a trigger wait
    pub fn cancel_token(&self) -> CancelToken { self.cancel.clone() }

    pub fn calibration(&self) -> CalibrationChoice { self.calibration }

    pub fn last_capture(&self) -> Option<&Acquisition> { self.last_capture.as_ref() }

    // Opens the instrument, captures once, and closes it again. A failed
    // capture keeps the previous one.
    pub fn acquire(&mut self) -> Result<&Acquisition> {
        self.cancel.reset();
        let instrument = self.source.open_instrument()?;
        info!("Starting acquisition on {}", instrument.resource());

        let acq = RigolScope::new(instrument, self.config.clone())
            .with_cancel_token(self.cancel.clone())
            .acquire()?;

        Ok(self.last_capture.insert(acq))
    }

    // Captures the calibration waveform and proposes values. Nothing is applied.
    pub fn calibrate(&mut self) -> Result<CalibrationCandidates> {
        let acq = self.acquire()?;
        CalibrationCandidates::compute(acq)
    }

    // `index` counts from zero in the order the candidates were presented
    pub fn select_scale(&mut self, candidates:&CalibrationCandidates, index:usize) -> Result<()> {
        let candidate = candidates.scale(index)?;
        self.set_scale(candidate.value)
    }

    pub fn set_scale(&mut self, scale_v_per_byte:f64) -> Result<()> {
        self.calibration = self.calibration.with_scale(scale_v_per_byte)?;
        info!("Selected scale factor: {} V/byte", scale_v_per_byte);
        Ok(())
    }

    pub fn confirm_offset(&mut self, candidates:&CalibrationCandidates) -> Result<()> {
        self.set_offset(f64::from(candidates.offset_bytes))
    }

    pub fn set_offset(&mut self, offset_bytes:f64) -> Result<()> {
        self.calibration = self.calibration.with_offset(offset_bytes)?;
        info!("Selected offset: {} bytes", offset_bytes);
        Ok(())
    }

    // Replaces the whole choice, e.g. one loaded from disk. Only the halves
    // marked as selected are taken.
    pub fn apply(&mut self, choice:CalibrationChoice) -> Result<()> {
        let mut next = self.calibration;
        if choice.scale_selected { next = next.with_scale(choice.scale_v_per_byte)?; }
        if choice.offset_selected { next = next.with_offset(choice.offset_bytes)?; }
        self.calibration = next;
        info!("{}", self.calibration);
        Ok(())
    }

    pub fn render(&self, acq:&Acquisition) -> PhysicalTrace { render_with(acq, &self.calibration) }

    pub fn render_last(&self) -> Option<PhysicalTrace> { self.last_capture.as_ref().map(|acq| self.render(acq)) }

    // Fresh capture, rendered with the current calibration, written to `dest`
    pub fn collect_and_persist(&mut self, dest:&Path, label:&str, include_header:bool) -> Result<PhysicalTrace> {
        if !self.calibration.is_calibrated() {
            warn!("Collecting with an incomplete calibration ({})", self.calibration);
        }

        let choice = self.calibration;
        let acq = self.acquire()?;
        let trace = render_with(acq, &choice);
        storage::save_capture(dest, acq, &trace, label, include_header)?;
        Ok(trace)
    }

}
