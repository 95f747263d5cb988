use std::error::Error;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use log::warn;
use serde::Serialize;

use scope_capture::transport::mock::MOCK_RESOURCE;
use scope_capture::{CalibrationCandidates, CalibrationChoice, InstrumentSource, MockInstrument, ResourceManager, ScopeConfig, Session};

#[derive(Parser)]
#[command(name = "scope_capture")]
#[command(about = "Single-shot oscilloscope capture with operator calibration", long_about = None)]
struct Cli {
	/// TOML configuration file
	#[arg(long, global = true)]
	config: Option<PathBuf>,

	/// Use a simulated scope showing the 3V 1kHz calibration signal
	#[arg(long, global = true)]
	simulate: bool,

	#[command(subcommand)]
	command: Commands,
}

#[derive(Subcommand)]
enum Commands {
	/// List instrument resources
	Discover,

	/// Capture the calibration signal and choose a scale and offset
	Calibrate {
		/// Scale candidate to use (1-3), asked for when omitted
		#[arg(long, value_parser = clap::value_parser!(u8).range(1..=3))]
		scale: Option<u8>,

		/// Take the minimum sample as the zero-volt offset without asking
		#[arg(long)]
		accept_offset: bool,

		/// Where to store the chosen calibration
		#[arg(long)]
		save: Option<PathBuf>,

		/// Print candidates and choice as JSON
		#[arg(long)]
		json: bool,
	},

	/// Capture once and write time, voltage and raw bytes to a file
	Collect {
		#[arg(long, short)]
		output: PathBuf,

		/// Experiment label written into the header
		#[arg(long, default_value = "")]
		label: String,

		#[arg(long)]
		no_header: bool,

		/// Calibration saved by `calibrate --save`
		#[arg(long)]
		calibration: Option<PathBuf>,
	},
}

#[derive(Serialize)]
struct CalibrationReport<'a> {
	candidates: &'a CalibrationCandidates,
	choice: CalibrationChoice,
}

fn main() -> ExitCode {
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

	match run(Cli::parse()) {
		Ok(()) => ExitCode::SUCCESS,
		Err(e) => {
			eprintln!("Error: {}", e);
			ExitCode::FAILURE
		}
	}
}

fn run(cli:Cli) -> Result<(), Box<dyn Error>> {
	let config = ScopeConfig::load_or_default(cli.config.as_deref())?;

	if let Commands::Discover = cli.command {
		let found:Vec<String> = if cli.simulate {
			vec![MOCK_RESOURCE.to_owned()]
		} else {
			ResourceManager::new(config.transport.clone()).discover()?
		};
		if found.is_empty() { println!("No instruments found"); }
		for resource in found { println!("{}", resource); }
		return Ok(());
	}

	if cli.simulate {
		let session = Session::new(MockInstrument::calibration_wave(), config.acquisition.clone());
		dispatch(session, cli.command)
	} else {
		let session = Session::new(ResourceManager::new(config.transport.clone()), config.acquisition.clone());
		dispatch(session, cli.command)
	}
}

fn dispatch<S: InstrumentSource>(mut session:Session<S>, command:Commands) -> Result<(), Box<dyn Error>> {
	match command {
		Commands::Discover => Ok(()),
		Commands::Calibrate{ scale, accept_offset, save, json } => calibrate(&mut session, scale, accept_offset, save.as_deref(), json),
		Commands::Collect{ output, label, no_header, calibration } => collect(&mut session, &output, &label, !no_header, calibration.as_deref()),
	}
}

fn prompt(question:&str) -> io::Result<String> {
	eprint!("{}", question);
	io::stderr().flush()?;
	let mut line = String::new();
	io::stdin().lock().read_line(&mut line)?;
	Ok(line.trim().to_owned())
}

fn calibrate<S: InstrumentSource>(session:&mut Session<S>, scale:Option<u8>, accept_offset:bool, save:Option<&Path>, json:bool) -> Result<(), Box<dyn Error>> {
	let candidates = session.calibrate()?;
	if !json { println!("{}", candidates); }

	let index:usize = match scale {
		Some(n) => usize::from(n) - 1,
		None => {
			let answer = prompt("Select scale factor [1-3]: ")?;
			let n:usize = answer.parse().map_err(|_| format!("'{}' is not a candidate number", answer))?;
			n.checked_sub(1).ok_or("candidates are numbered from 1")?
		}
	};
	session.select_scale(&candidates, index)?;

	let take_offset = accept_offset || {
		let answer = prompt(&format!("Use {} bytes as the zero-volt offset? [y/N]: ", candidates.offset_bytes))?;
		answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes")
	};
	if take_offset {
		session.confirm_offset(&candidates)?;
	}

	let choice = session.calibration();
	if json {
		println!("{}", serde_json::to_string_pretty(&CalibrationReport{ candidates: &candidates, choice })?);
	} else {
		println!("{}", choice);
	}

	if let Some(path) = save {
		choice.save(path)?;
		if !json { println!("Saved calibration to {}", path.display()); }
	}
	Ok(())
}

fn collect<S: InstrumentSource>(session:&mut Session<S>, output:&Path, label:&str, include_header:bool, calibration:Option<&Path>) -> Result<(), Box<dyn Error>> {
	match calibration {
		Some(path) => session.apply(CalibrationChoice::load(path)?)?,
		None => warn!("No calibration file given, voltages are raw byte values"),
	}

	let trace = session.collect_and_persist(output, label, include_header)?;
	let summary = trace.summary();
	println!("Wrote {} points to {}", summary.points, output.display());
	println!("Duration: {:.6} s", summary.duration_s);
	println!("Voltage: {:.4} V to {:.4} V", summary.min_v, summary.max_v);
	Ok(())
}
