// External data representation, a protocol for serializing data to be sent over the network
pub mod xdr;

// Remote procedure call, a protocol build on top of XDR to provide something like C-style function calls over the network
pub mod rpc;

// A protocol using RPC that's meant to communicate with instruments like oscilloscopes, power supplies, waveform generators, etc
pub mod vxi11;

pub mod error;
pub mod config;

// Opening instruments by resource string, over VXI-11, VISA or an in-memory script
pub mod transport;

// IEEE 488.2 definite-length binary blocks
pub mod block;

pub mod waveform;

// Drivers for instruments reached through transport::Instrument
pub mod devices;

// Candidate volts-per-byte scales and offsets, and the operator's choice among them
pub mod calibration;

pub mod storage;

// The state a front-end drives: calibration in force, last capture, collect-and-save
pub mod session;

pub use crate::calibration::{CalibrationCandidates, CalibrationChoice};
pub use crate::config::ScopeConfig;
pub use crate::devices::rigol::{Acquisition, AcquisitionMetadata, RigolScope};
pub use crate::devices::CancelToken;
pub use crate::error::{Result, ScopeError};
pub use crate::session::Session;
pub use crate::transport::{Instrument, InstrumentSource, MockInstrument, ResourceManager};
pub use crate::waveform::{PhysicalTrace, RawCapture};
