// Flat delimited-text capture files. Optional header: metadata block, a `---`
// line, the experiment label, a blank row. Then the column header and one
// (time, voltage, raw byte) row per sample.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use log::info;

use crate::devices::rigol::Acquisition;
use crate::error::{Result, ScopeError};
use crate::waveform::PhysicalTrace;

pub const HEADER_SEPARATOR:&str = "---";
pub const LABEL_FIELD:&str = "Parameters:";
// Read as three CSV fields, no padding after the delimiter
pub const COLUMNS:[&str; 3] = ["Time [s]", "Voltage [V]", "byteval"];

pub fn write_capture<W: Write>(mut out:W, acq:&Acquisition, trace:&PhysicalTrace, label:&str, include_header:bool) -> io::Result<()> {
    if trace.len() != acq.raw.len() {
        return Err(io::Error::new(io::ErrorKind::InvalidInput,
            format!("trace has {} points but the capture has {}", trace.len(), acq.raw.len())));
    }

    if include_header {
        writeln!(out, "{}", acq.metadata_text())?;
        writeln!(out, "{}", HEADER_SEPARATOR)?;
        {
            // Quotes the label if it carries a delimiter
            let mut wtr = csv::WriterBuilder::new().flexible(true).from_writer(&mut out);
            wtr.write_record([LABEL_FIELD, label])?;
            wtr.flush()?;
        }
        writeln!(out)?;
    }

    let mut wtr = csv::Writer::from_writer(&mut out);
    wtr.write_record(COLUMNS)?;
    for ((t, v), b) in trace.time_s.iter().zip(&trace.voltage_v).zip(acq.raw.samples()) {
        wtr.serialize((t, v, b))?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn save_capture(path:&Path, acq:&Acquisition, trace:&PhysicalTrace, label:&str, include_header:bool) -> Result<()> {
    let file = File::create(path).map_err(|e| ScopeError::persistence(path, e))?;
    let mut out = BufWriter::new(file);
    write_capture(&mut out, acq, trace, label, include_header)
        .and_then(|_| out.flush())
        .map_err(|e| ScopeError::persistence(path, e))?;

    info!("Wrote {} points to {}", trace.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::CalibrationChoice;
    use crate::config::AcquisitionConfig;
    use crate::devices::rigol::RigolScope;
    use crate::session::render_with;
    use crate::transport::MockInstrument;

    fn capture() -> Acquisition {
        RigolScope::new(MockInstrument::rigol(&[10, 20, 30]), AcquisitionConfig::default()).acquire().unwrap()
    }

    fn written(acq:&Acquisition, label:&str, include_header:bool) -> String {
        let trace = render_with(acq, &CalibrationChoice::default());
        let mut buf:Vec<u8> = vec![];
        write_capture(&mut buf, acq, &trace, label, include_header).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn without_header_the_column_row_comes_first() {
        let text = written(&capture(), "run 1", false);
        let lines:Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Time [s],Voltage [V],byteval");
        assert_eq!(lines[1], "0.0,10.0,10");
        assert_eq!(lines.len(), 4);
        assert!(!text.contains("run 1"));
    }

    #[test]
    fn header_precedes_the_column_row() {
        let acq = capture();
        let text = written(&acq, "bias, 3V", true);
        let meta_lines = acq.metadata_text().lines().count();
        let lines:Vec<&str> = text.lines().collect();

        assert!(lines[0].starts_with("Instrument: "));
        assert_eq!(lines[meta_lines], "---");
        assert_eq!(lines[meta_lines + 1], "Parameters:,\"bias, 3V\"");
        assert_eq!(lines[meta_lines + 2], "");
        assert_eq!(lines[meta_lines + 3], "Time [s],Voltage [V],byteval");
        assert_eq!(lines.len(), meta_lines + 4 + 3);
    }

    #[test]
    fn mismatched_trace_is_refused() {
        let acq = capture();
        let trace = PhysicalTrace{ time_s: vec![0.0], voltage_v: vec![1.0] };
        assert!(write_capture(Vec::new(), &acq, &trace, "", false).is_err());
    }

    #[test]
    fn unwritable_destination_is_a_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        let acq = capture();
        let trace = render_with(&acq, &CalibrationChoice::default());
        let path = dir.path().join("missing").join("capture.csv");
        assert!(matches!(save_capture(&path, &acq, &trace, "", true), Err(ScopeError::Persistence{ .. })));
    }
}
