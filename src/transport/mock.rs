// Scripted stand-in for a Rigol scope. Clones share one script and one command
// log, so a test can keep a handle while the code under test owns another.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::block::encode_block;
use crate::error::{Result, ScopeError};

use super::{Instrument, InstrumentSource};

pub const MOCK_RESOURCE:&str = "USB0::0x1AB1::0x04CE::DS1ZA000000001::INSTR";
pub const MOCK_IDN:&str = "RIGOL TECHNOLOGIES,DS1104Z,DS1ZA000000001,00.04.04.SP3";

// What an unanswered query would have waited for on real hardware
const MOCK_TIMEOUT:Duration = Duration::from_millis(5000);

const TRIGGER_STATUS_QUERY:&str = ":TRIG:STAT?";
const DATA_QUERY:&str = ":WAV:DATA?";

#[derive(Default)]
struct Script {
    replies: HashMap<String, String>,
    trigger_statuses: VecDeque<String>,
    block: Vec<u8>,
    block_requested: bool,
    commands: Vec<String>,
    status_query_times: Vec<Instant>,
}

#[derive(Clone)]
pub struct MockInstrument {
    resource: String,
    script: Rc<RefCell<Script>>,
}

impl MockInstrument {

    pub fn new(resource:&str) -> Self {
        Self { resource: resource.to_owned(), script: Rc::new(RefCell::new(Script::default())) }
    }

    // A scope that triggers immediately and returns `samples` on CHAN1
    pub fn rigol(samples:&[u8]) -> Self {
        Self::new(MOCK_RESOURCE)
            .with_reply(":ACQ:MDEP?", "12000")
            .with_reply(":ACQuire:SRATe?", "1.000000e+09")
            .with_reply(":CHAN1:SCAL?", "1.000000e+00")
            .with_reply(":CHAN1:OFFS?", "0.000000e+00")
            .with_reply("*IDN?", MOCK_IDN)
            .with_trigger_statuses(&["STOP"])
            .with_samples(samples)
    }

    // The front-panel calibration output as seen on CHAN1 at 1 MSa/s: a 1 kHz
    // square wave spanning 250 counts
    pub fn calibration_wave() -> Self {
        const LOW:u8 = 2;
        const HIGH:u8 = 252;
        let samples:Vec<u8> = (0..12_000usize).map(|i| if (i / 500) % 2 == 0 { HIGH } else { LOW }).collect();

        Self::rigol(&samples).with_reply(":ACQuire:SRATe?", "1.000000e+06")
    }

    pub fn with_reply(self, command:&str, reply:&str) -> Self {
        self.script.borrow_mut().replies.insert(command.to_owned(), reply.to_owned());
        self
    }

    // Replayed in order, the last one repeats forever
    pub fn with_trigger_statuses(self, statuses:&[&str]) -> Self {
        self.script.borrow_mut().trigger_statuses = statuses.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_block(self, block:Vec<u8>) -> Self {
        self.script.borrow_mut().block = block;
        self
    }

    // Wraps the samples in a definite-length block and keeps the preamble's point count in step
    pub fn with_samples(self, samples:&[u8]) -> Self {
        let mut block = encode_block(samples);
        block.push(b'\n');
        let preamble = format!("0,2,{},1,1.000000e-09,0,0,0.0118,0,127", samples.len());
        self.with_block(block).with_reply(":WAV:PRE?", &preamble)
    }

    // Every write and query, in order
    pub fn commands(&self) -> Vec<String> { self.script.borrow().commands.clone() }

    pub fn status_query_times(&self) -> Vec<Instant> { self.script.borrow().status_query_times.clone() }

}

fn no_reply(command:&str) -> ScopeError {
    ScopeError::TransportTimeout { command: command.to_owned(), timeout: MOCK_TIMEOUT }
}

impl Instrument for MockInstrument {

    fn resource(&self) -> &str { &self.resource }

    fn write(&mut self, command:&str) -> Result<()> {
        let mut script = self.script.borrow_mut();
        script.commands.push(command.to_owned());
        if command == DATA_QUERY {
            script.block_requested = true;
        }
        Ok(())
    }

    fn query(&mut self, command:&str) -> Result<String> {
        let mut script = self.script.borrow_mut();
        script.commands.push(command.to_owned());

        if command == TRIGGER_STATUS_QUERY {
            script.status_query_times.push(Instant::now());
            let status = if script.trigger_statuses.len() > 1 {
                script.trigger_statuses.pop_front()
            } else {
                script.trigger_statuses.front().cloned()
            };
            return status.ok_or_else(|| no_reply(command));
        }

        script.replies.get(command).cloned().ok_or_else(|| no_reply(command))
    }

    fn read_raw(&mut self) -> Result<Vec<u8>> {
        let mut script = self.script.borrow_mut();
        if !script.block_requested {
            return Err(no_reply("read_raw"));
        }
        script.block_requested = false;
        Ok(script.block.clone())
    }

}

impl InstrumentSource for MockInstrument {
    fn open_instrument(&mut self) -> Result<Box<dyn Instrument>> { Ok(Box::new(self.clone())) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::decode_block;

    #[test]
    fn unknown_queries_time_out() {
        let mut mock = MockInstrument::new(MOCK_RESOURCE);
        assert!(matches!(mock.query(":MEAS:VPP?"), Err(ScopeError::TransportTimeout{ .. })));
    }

    #[test]
    fn block_only_after_data_query() {
        let mut mock = MockInstrument::rigol(&[5, 6, 7]);
        assert!(mock.read_raw().is_err());
        mock.write(":WAV:DATA?").unwrap();
        assert_eq!(decode_block(&mock.read_raw().unwrap()).unwrap(), vec![5, 6, 7]);
        assert!(mock.read_raw().is_err());
    }

    #[test]
    fn last_status_repeats() {
        let mut mock = MockInstrument::rigol(&[1]).with_trigger_statuses(&["RUN", "STOP"]);
        assert_eq!(mock.query(":TRIG:STAT?").unwrap(), "RUN");
        assert_eq!(mock.query(":TRIG:STAT?").unwrap(), "STOP");
        assert_eq!(mock.query(":TRIG:STAT?").unwrap(), "STOP");
    }

    #[test]
    fn calibration_wave_spans_250_counts() {
        let mut mock = MockInstrument::calibration_wave();
        mock.write(":WAV:DATA?").unwrap();
        let samples = decode_block(&mock.read_raw().unwrap()).unwrap();
        assert_eq!(samples.len(), 12_000);
        assert_eq!(samples.iter().max().unwrap() - samples.iter().min().unwrap(), 250);
    }
}
