use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScopeError};

pub const PREAMBLE_QUERY:&str = ":WAV:PRE?";
pub const PREAMBLE_FIELDS:[&str; 10] = [
	"format", "type", "points", "count",
	"x_increment", "x_origin", "x_reference",
	"y_increment", "y_origin", "y_reference",
];

// Reply to :WAV:PRE?, ten comma separated numbers describing the waveform
// that :WAV:DATA? is about to return
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Preamble {
	pub format: f64,
	pub kind: f64,
	pub points: f64,
	pub count: f64,
	pub x_increment: f64,
	pub x_origin: f64,
	pub x_reference: f64,
	pub y_increment: f64,
	pub y_origin: f64,
	pub y_reference: f64,
}

impl Preamble {

	pub fn parse(reply:&str) -> Result<Self> {
		let fields:Vec<&str> = reply.trim().split(',').map(str::trim).collect();
		if fields.len() != PREAMBLE_FIELDS.len() {
			return Err(ScopeError::protocol(PREAMBLE_QUERY, format!("expected {} fields but got {} in '{}'", PREAMBLE_FIELDS.len(), fields.len(), reply.trim())));
		}

		let mut values = [0.0f64; 10];
		for (idx, (field, name)) in fields.iter().zip(PREAMBLE_FIELDS.iter()).enumerate() {
			values[idx] = field.parse::<f64>()
				.ok()
				.filter(|v| v.is_finite())
				.ok_or_else(|| ScopeError::protocol(PREAMBLE_QUERY, format!("field {} ({}) is not a number: '{}'", idx, name, field)))?;
		}

		Ok(Preamble {
			format: values[0],
			kind: values[1],
			points: values[2],
			count: values[3],
			x_increment: values[4],
			x_origin: values[5],
			x_reference: values[6],
			y_increment: values[7],
			y_origin: values[8],
			y_reference: values[9],
		})
	}

	pub fn format_name(&self) -> &'static str {
		match self.format as i64 {
			0 => "BYTE",
			1 => "WORD",
			2 => "ASC",
			_ => "UNKNOWN",
		}
	}

	pub fn kind_name(&self) -> &'static str {
		match self.kind as i64 {
			0 => "NORM",
			1 => "MAX",
			2 => "RAW",
			_ => "UNKNOWN",
		}
	}

}

impl fmt::Display for Preamble {
	fn fmt(&self, f:&mut fmt::Formatter) -> fmt::Result {
		writeln!(f, "Format: {} ({})", self.format, self.format_name())?;
		writeln!(f, "Type: {} ({})", self.kind, self.kind_name())?;
		writeln!(f, "Points: {}", self.points)?;
		writeln!(f, "Count: {}", self.count)?;
		writeln!(f, "X increment: {}", self.x_increment)?;
		writeln!(f, "X origin: {}", self.x_origin)?;
		writeln!(f, "X reference: {}", self.x_reference)?;
		writeln!(f, "Y increment: {}", self.y_increment)?;
		writeln!(f, "Y origin: {}", self.y_origin)?;
		write!(f, "Y reference: {}", self.y_reference)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const DS1054Z_REPLY:&str = "0,2,1200,1,1.000000e-09,-6.000000e-07,0,1.181102e-02,0,127\n";

	#[test]
	fn parses_all_ten_fields() {
		let p = Preamble::parse(DS1054Z_REPLY).unwrap();
		assert_eq!(p.format, 0.0);
		assert_eq!(p.kind_name(), "RAW");
		assert_eq!(p.points, 1200.0);
		assert_eq!(p.x_increment, 1e-9);
		assert_eq!(p.x_origin, -6e-7);
		assert_eq!(p.y_increment, 1.181102e-2);
		assert_eq!(p.y_reference, 127.0);
	}

	#[test]
	fn format_codes_follow_wav_form() {
		let p = Preamble::parse(DS1054Z_REPLY).unwrap();
		assert_eq!(p.format_name(), "BYTE");
		assert!(p.to_string().starts_with("Format: 0 (BYTE)\n"));
		assert_eq!(Preamble::parse("1,2,1200,1,1e-9,0,0,0.01,0,127").unwrap().format_name(), "WORD");
		assert_eq!(Preamble::parse("2,2,1200,1,1e-9,0,0,0.01,0,127").unwrap().format_name(), "ASC");
	}

	#[test]
	fn wrong_field_count_is_protocol_error() {
		let e = Preamble::parse("0,2,1200,1,1e-9").unwrap_err();
		assert!(matches!(e, ScopeError::Protocol{ .. }));
		assert!(e.to_string().contains(":WAV:PRE?"));
	}

	#[test]
	fn non_numeric_field_names_the_field() {
		let e = Preamble::parse("1,2,1200,1,1e-9,0,0,oops,0,127").unwrap_err();
		let msg = e.to_string();
		assert!(msg.contains("y_increment"), "{}", msg);
		assert!(msg.contains("oops"), "{}", msg);
	}

	#[test]
	fn nan_is_not_a_number_here() {
		assert!(Preamble::parse("1,2,1200,1,NaN,0,0,0.01,0,127").is_err());
	}
}
