// Drivers for specific instruments, written against transport::Instrument so
// they don't care how the instrument is connected

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

pub mod rigol;

lazy_static! {
	static ref IDN_RE: Regex = Regex::new("^([^,]+),([^,]+),([^,]+),([^,\\s]+)").unwrap();
}

// Shared flag for stopping a blocking wait from another thread (a UI's
// cancel button, a signal handler). Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
	pub fn new() -> Self { Self::default() }
	pub fn cancel(&self) { self.0.store(true, Ordering::SeqCst); }
	pub fn is_cancelled(&self) -> bool { self.0.load(Ordering::SeqCst) }
	pub fn reset(&self) { self.0.store(false, Ordering::SeqCst); }
}

// The four comma separated fields of a *IDN? reply
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Identity {
	pub manufacturer: String,
	pub model: String,
	pub serial_num: String,
	pub fw_version: String,
}

impl Identity {
	pub fn parse(idn:&str) -> Option<Self> {
		let caps = IDN_RE.captures(idn.trim())?;
		Some(Identity {
			manufacturer: caps.get(1)?.as_str().trim().to_owned(),
			model:        caps.get(2)?.as_str().trim().to_owned(),
			serial_num:   caps.get(3)?.as_str().trim().to_owned(),
			fw_version:   caps.get(4)?.as_str().trim().to_owned(),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn identity_fields() {
		let id = Identity::parse("RIGOL TECHNOLOGIES,DS1104Z,DS1ZA000000001,00.04.04.SP3\n").unwrap();
		assert_eq!(id.manufacturer, "RIGOL TECHNOLOGIES");
		assert_eq!(id.model, "DS1104Z");
		assert_eq!(id.serial_num, "DS1ZA000000001");
		assert_eq!(id.fw_version, "00.04.04.SP3");
		assert_eq!(Identity::parse("just a name"), None);
	}

	#[test]
	fn cancel_is_seen_by_clones() {
		let token = CancelToken::new();
		let other = token.clone();
		assert!(!other.is_cancelled());
		token.cancel();
		assert!(other.is_cancelled());
		other.reset();
		assert!(!token.is_cancelled());
	}
}
