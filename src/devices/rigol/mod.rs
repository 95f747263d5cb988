// Single-shot capture from a Rigol DS1000Z-style scope: raw byte waveform of one
// channel, read through the :WAV subsystem after a :SING trigger

use std::fmt;
use std::str::FromStr;
use std::thread;
use std::time::Instant;

use chrono::{DateTime, Local};
use log::{debug, info};
use serde::Serialize;

use crate::block::decode_block;
use crate::config::AcquisitionConfig;
use crate::error::{Result, ScopeError};
use crate::transport::Instrument;
use crate::waveform::RawCapture;

use super::{CancelToken, Identity};

pub mod preamble;

pub use self::preamble::Preamble;

pub const TRIGGER_STATUS_QUERY:&str = ":TRIG:STAT?";
pub const DATA_QUERY:&str = ":WAV:DATA?";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionState {
	Idle,
	Configuring,
	Armed,
	Polling,
	Triggered,
	MetadataRead,
	DataRequested,
	Complete,
	Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TriggerStatus { Td, Wait, Run, Auto, Stop }

impl TriggerStatus {
	// STOP after :SING means the one capture has been taken, TD that the trigger fired
	pub fn is_complete(self) -> bool { matches!(self, TriggerStatus::Stop | TriggerStatus::Td) }

	pub fn as_str(self) -> &'static str {
		match self {
			TriggerStatus::Td   => "TD",
			TriggerStatus::Wait => "WAIT",
			TriggerStatus::Run  => "RUN",
			TriggerStatus::Auto => "AUTO",
			TriggerStatus::Stop => "STOP",
		}
	}
}

impl FromStr for TriggerStatus {
	type Err = ScopeError;

	fn from_str(s:&str) -> Result<Self> {
		match s.trim() {
			"TD"   => Ok(TriggerStatus::Td),
			"WAIT" => Ok(TriggerStatus::Wait),
			"RUN"  => Ok(TriggerStatus::Run),
			"AUTO" => Ok(TriggerStatus::Auto),
			"STOP" => Ok(TriggerStatus::Stop),
			other  => Err(ScopeError::protocol(TRIGGER_STATUS_QUERY, format!("unrecognised trigger status '{}'", other))),
		}
	}
}

impl fmt::Display for TriggerStatus {
	fn fmt(&self, f:&mut fmt::Formatter) -> fmt::Result { f.write_str(self.as_str()) }
}

// Everything known about one capture apart from the samples. Written once when
// the capture completes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AcquisitionMetadata {
	pub sample_rate_hz: f64,
	pub time_increment_s: f64,
	pub volt_scale_per_division: f64,
	pub volt_offset_v: f64,
	pub preamble: Preamble,
	pub memory_depth: String,
	pub trigger_status: TriggerStatus,
	pub instrument_identity: String,
	pub resource: String,
	pub channel_id: String,
	pub timestamp: DateTime<Local>,
}

impl AcquisitionMetadata {
	pub fn identity(&self) -> Option<Identity> { Identity::parse(&self.instrument_identity) }
}

impl fmt::Display for AcquisitionMetadata {
	fn fmt(&self, f:&mut fmt::Formatter) -> fmt::Result {
		writeln!(f, "Instrument: {}", self.instrument_identity)?;
		writeln!(f, "Resource: {}", self.resource)?;
		writeln!(f, "Channel: {}", self.channel_id)?;
		writeln!(f, "Timestamp: {}", self.timestamp.to_rfc3339())?;
		writeln!(f, "Trigger status: {}", self.trigger_status)?;
		writeln!(f, "Memory depth: {}", self.memory_depth)?;
		writeln!(f, "Sample rate [Sa/s]: {}", self.sample_rate_hz)?;
		writeln!(f, "Time increment [s]: {}", self.time_increment_s)?;
		writeln!(f, "Volt scale [V/div]: {}", self.volt_scale_per_division)?;
		writeln!(f, "Volt offset [V]: {}", self.volt_offset_v)?;
		write!(f, "{}", self.preamble)
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct Acquisition {
	pub time_s: Vec<f64>,
	pub raw: RawCapture,
	pub metadata: AcquisitionMetadata,
}

impl Acquisition {
	pub fn byte_range(&self) -> u8 { self.raw.byte_range() }
	pub fn y_increment(&self) -> f64 { self.metadata.preamble.y_increment }
	pub fn volt_scale(&self) -> f64 { self.metadata.volt_scale_per_division }
	pub fn metadata_text(&self) -> String { self.metadata.to_string() }
}

// Owns the instrument for as long as the capture takes
pub struct RigolScope<I: Instrument> {
	instrument: I,
	config: AcquisitionConfig,
	cancel: CancelToken,
	state: AcquisitionState,
	history: Vec<AcquisitionState>,
}

impl<I: Instrument> RigolScope<I> {

	pub fn new(instrument:I, config:AcquisitionConfig) -> Self {
		Self{ instrument, config, cancel: CancelToken::new(), state: AcquisitionState::Idle, history: vec![AcquisitionState::Idle] }
	}

	pub fn with_cancel_token(mut self, cancel:CancelToken) -> Self {
		self.cancel = cancel;
		self
	}

	pub fn state(&self) -> AcquisitionState { self.state }

	// States visited by the most recent acquire(), starting from Idle
	pub fn history(&self) -> &[AcquisitionState] { &self.history }

	fn enter(&mut self, next:AcquisitionState) {
		debug!("Acquisition {:?} -> {:?}", self.state, next);
		self.state = next;
		self.history.push(next);
	}

	// Runs the whole sequence. Any failure leaves the scope in Failed and
	// nothing captured so far is returned.
	pub fn acquire(&mut self) -> Result<Acquisition> {
		self.state = AcquisitionState::Idle;
		self.history = vec![AcquisitionState::Idle];

		match self.run() {
			Ok(acq) => {
				self.enter(AcquisitionState::Complete);
				info!("Captured {} points from {} at {} Sa/s", acq.raw.len(), acq.metadata.channel_id, acq.metadata.sample_rate_hz);
				Ok(acq)
			},
			Err(e) => {
				self.enter(AcquisitionState::Failed);
				Err(e)
			}
		}
	}

	fn run(&mut self) -> Result<Acquisition> {
		self.enter(AcquisitionState::Configuring);
		let memory_depth:String = self.configure()?;

		self.enter(AcquisitionState::Armed);
		self.instrument.write(":SING")?;

		self.enter(AcquisitionState::Polling);
		let trigger_status:TriggerStatus = self.wait_for_trigger()?;
		self.enter(AcquisitionState::Triggered);
		let timestamp:DateTime<Local> = Local::now();

		self.enter(AcquisitionState::MetadataRead);
		let metadata = self.read_metadata(memory_depth, trigger_status, timestamp)?;

		self.enter(AcquisitionState::DataRequested);
		let raw:RawCapture = self.fetch_waveform()?;

		if metadata.preamble.points as usize != raw.len() {
			debug!("Preamble announced {} points but the block held {}", metadata.preamble.points, raw.len());
		}

		let time_s:Vec<f64> = raw.time_axis(metadata.time_increment_s);
		Ok(Acquisition{ time_s, raw, metadata })
	}

	fn configure(&mut self) -> Result<String> {
		self.instrument.write(":WAV:MODE RAW")?;
		self.instrument.write(":WAV:FORM BYTE")?;
		self.instrument.write(&format!(":WAV:SOUR {}", self.config.channel))?;

		let memory_depth:String = self.instrument.query(":ACQ:MDEP?")?.trim().to_owned();
		debug!("Memory depth (points): {}", memory_depth);
		Ok(memory_depth)
	}

	pub fn wait_for_trigger(&mut self) -> Result<TriggerStatus> {
		let timeout = self.config.trigger_timeout();
		let interval = self.config.poll_interval();
		let start = Instant::now();

		loop {
			let status:TriggerStatus = self.instrument.query(TRIGGER_STATUS_QUERY)?.parse()?;
			if status.is_complete() {
				debug!("Triggered after {:?}, status {}", start.elapsed(), status);
				return Ok(status);
			}
			if start.elapsed() > timeout {
				return Err(ScopeError::TriggerTimeout{ timeout, last_status: status.to_string() });
			}
			if self.cancel.is_cancelled() {
				return Err(ScopeError::Cancelled);
			}
			thread::sleep(interval);
		}
	}

	fn query_f64(&mut self, command:&str) -> Result<f64> {
		let reply:String = self.instrument.query(command)?;
		reply.trim()
			.parse::<f64>()
			.ok()
			.filter(|v| v.is_finite())
			.ok_or_else(|| ScopeError::protocol(command, format!("expected a number but got '{}'", reply.trim())))
	}

	fn read_metadata(&mut self, memory_depth:String, trigger_status:TriggerStatus, timestamp:DateTime<Local>) -> Result<AcquisitionMetadata> {
		let sample_rate_hz:f64 = self.query_f64(":ACQuire:SRATe?")?;
		if sample_rate_hz <= 0.0 {
			return Err(ScopeError::protocol(":ACQuire:SRATe?", format!("sample rate must be positive, got {}", sample_rate_hz)));
		}

		let channel:String = self.config.channel.clone();
		let volt_scale_per_division:f64 = self.query_f64(&format!(":{}:SCAL?", channel))?;
		let volt_offset_v:f64 = self.query_f64(&format!(":{}:OFFS?", channel))?;
		let instrument_identity:String = self.instrument.query("*IDN?")?.trim().to_owned();

		self.instrument.write(":WAV:STAR 1")?;
		self.instrument.write(&format!(":WAV:STOP {}", self.config.stop_point))?;
		let preamble = Preamble::parse(&self.instrument.query(preamble::PREAMBLE_QUERY)?)?;

		Ok(AcquisitionMetadata {
			sample_rate_hz,
			time_increment_s: 1.0 / sample_rate_hz,
			volt_scale_per_division,
			volt_offset_v,
			preamble,
			memory_depth,
			trigger_status,
			instrument_identity,
			resource: self.instrument.resource().to_owned(),
			channel_id: channel,
			timestamp,
		})
	}

	fn fetch_waveform(&mut self) -> Result<RawCapture> {
		self.instrument.write(DATA_QUERY)?;
		let samples:Vec<u8> = decode_block(&self.instrument.read_raw()?)?;
		if samples.is_empty() {
			return Err(ScopeError::protocol(DATA_QUERY, "instrument returned an empty waveform"));
		}
		Ok(RawCapture::new(samples))
	}

}
