use std::fs;

use scope_capture::config::AcquisitionConfig;
use scope_capture::{CalibrationChoice, MockInstrument, ScopeError, Session};

fn session() -> Session<MockInstrument> {
	Session::new(MockInstrument::calibration_wave(), AcquisitionConfig::default())
}

#[test]
fn calibrate_then_collect() {
	let dir = tempfile::tempdir().unwrap();
	let mut session = session();

	let candidates = session.calibrate().unwrap();
	session.select_scale(&candidates, 0).unwrap();
	session.confirm_offset(&candidates).unwrap();

	let saved = dir.path().join("calibration.toml");
	session.calibration().save(&saved).unwrap();

	// A later run picks the saved choice back up
	let mut later = self::session();
	later.apply(CalibrationChoice::load(&saved).unwrap()).unwrap();
	assert_eq!(later.calibration(), session.calibration());

	let out = dir.path().join("capture.csv");
	let trace = later.collect_and_persist(&out, "calibration check", true).unwrap();
	let summary = trace.summary();
	assert_eq!(summary.points, 12_000);
	assert!(summary.min_v.abs() < 1e-9);
	assert!((summary.max_v - 3.0).abs() < 1e-9);

	let text = fs::read_to_string(&out).unwrap();
	assert!(text.starts_with("Instrument: RIGOL TECHNOLOGIES,DS1104Z"));
	assert!(text.contains("\n---\nParameters:,calibration check\n\nTime [s],Voltage [V],byteval\n"));
}

#[test]
fn header_toggle() {
	let dir = tempfile::tempdir().unwrap();
	let mut session = session();

	let bare = dir.path().join("bare.csv");
	session.collect_and_persist(&bare, "ignored", false).unwrap();
	let text = fs::read_to_string(&bare).unwrap();
	assert_eq!(text.lines().next(), Some("Time [s],Voltage [V],byteval"));
	assert!(!text.contains("ignored"));

	let full = dir.path().join("full.csv");
	session.collect_and_persist(&full, "run 7", true).unwrap();
	let text = fs::read_to_string(&full).unwrap();
	let first = text.lines().next().unwrap();
	assert!(first.starts_with("Instrument: "));
	assert!(text.lines().any(|l| l == "---"));
	assert!(text.lines().any(|l| l == "Parameters:,run 7"));
}

#[test]
fn failed_collect_writes_nothing() {
	let dir = tempfile::tempdir().unwrap();
	let mock = MockInstrument::calibration_wave().with_trigger_statuses(&["WAIT"]);
	let config = AcquisitionConfig{ poll_interval_ms: 10, trigger_timeout_ms: 50, ..AcquisitionConfig::default() };
	let mut session = Session::new(mock, config);

	let out = dir.path().join("capture.csv");
	assert!(matches!(session.collect_and_persist(&out, "", true), Err(ScopeError::TriggerTimeout{ .. })));
	assert!(!out.exists());
	assert!(session.last_capture().is_none());
}

#[test]
fn cancelling_from_another_thread() {
	let mock = MockInstrument::calibration_wave().with_trigger_statuses(&["WAIT"]);
	let mut session = Session::new(mock, AcquisitionConfig{ poll_interval_ms: 10, ..AcquisitionConfig::default() });
	let token = session.cancel_token();

	let canceller = std::thread::spawn(move || {
		std::thread::sleep(std::time::Duration::from_millis(100));
		token.cancel();
	});
	assert!(matches!(session.acquire(), Err(ScopeError::Cancelled)));
	canceller.join().unwrap();
}
