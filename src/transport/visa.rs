use std::ffi::CString;
use std::io::{BufRead, BufReader, Read, Write};
use std::time::Duration;

use log::debug;
use visa_rs::prelude::*;

use crate::config::TransportConfig;
use crate::error::{Result, ScopeError};

use super::Instrument;

fn visa_err(command:&str, e:visa_rs::Error) -> ScopeError {
    ScopeError::Transport { command: command.to_owned(), source: std::io::Error::new(std::io::ErrorKind::Other, e.to_string()) }
}

fn visa_string(s:&str) -> Result<VisaString> {
    CString::new(s)
        .map(VisaString::from)
        .map_err(|_| ScopeError::Config(format!("Resource string '{}' contains a NUL byte", s)))
}

pub fn list_resources() -> Result<Vec<String>> {
    let rm = DefaultRM::new().map_err(|e| visa_err("viOpenDefaultRM", e))?;
    let mut list = rm.find_res_list(&visa_string("?*INSTR")?).map_err(|e| visa_err("viFindRsrc", e))?;

    let mut found:Vec<String> = vec![];
    while let Some(res) = list.find_next().map_err(|e| visa_err("viFindNext", e))? {
        found.push(res.to_string());
    }
    Ok(found)
}

// USB/GPIB/serial resources, anything the VISA library can open
pub struct VisaInstrument {
    resource: String,
    instr: visa_rs::Instrument,
    io_timeout: Duration,
    chunk_size: usize,
    write_termination: String,
    read_termination: String,
}

impl VisaInstrument {

    pub fn open(resource:&str, config:&TransportConfig) -> Result<Self> {
        let rm = DefaultRM::new().map_err(|e| visa_err("viOpenDefaultRM", e))?;
        let instr = rm
            .open(&visa_string(resource)?, AccessMode::NO_LOCK, config.open_timeout())
            .map_err(|e| visa_err("viOpen", e))?;

        let io_timeout_ms = u32::try_from(config.io_timeout_ms).unwrap_or(u32::MAX);
        let tmo = AttrTmoValue::new_checked(io_timeout_ms)
            .ok_or_else(|| ScopeError::Config(format!("io_timeout_ms {} out of range for VISA", io_timeout_ms)))?;
        instr.set_attr(tmo).map_err(|e| visa_err("viSetAttribute", e))?;

        Ok(Self {
            resource: resource.to_owned(),
            instr,
            io_timeout: config.io_timeout(),
            chunk_size: config.chunk_size.max(1),
            write_termination: config.write_termination.clone(),
            read_termination: config.read_termination.clone(),
        })
    }

}

impl Instrument for VisaInstrument {

    fn resource(&self) -> &str { &self.resource }

    fn write(&mut self, command:&str) -> Result<()> {
        debug!("{} <- {}", self.resource, command);
        let msg:String = format!("{}{}", command, self.write_termination);
        (&self.instr).write_all(msg.as_bytes()).map_err(|e| ScopeError::from_io(command, self.io_timeout, e))
    }

    fn query(&mut self, command:&str) -> Result<String> {
        self.write(command)?;

        let mut reply = String::new();
        BufReader::new(&self.instr)
            .read_line(&mut reply)
            .map_err(|e| ScopeError::from_io(command, self.io_timeout, e))?;

        let reply:&str = reply.strip_suffix(self.read_termination.as_str()).unwrap_or(&reply);
        debug!("{} -> {}", self.resource, reply);
        Ok(reply.to_owned())
    }

    // A read shorter than the buffer means the instrument asserted END
    fn read_raw(&mut self) -> Result<Vec<u8>> {
        let mut ans:Vec<u8> = vec![];
        let mut chunk:Vec<u8> = vec![0; self.chunk_size];
        loop {
            let n:usize = (&self.instr).read(&mut chunk).map_err(|e| ScopeError::from_io("read_raw", self.io_timeout, e))?;
            ans.extend_from_slice(&chunk[..n]);
            if n < chunk.len() { break; }
        }
        debug!("{} -> {} raw bytes", self.resource, ans.len());
        Ok(ans)
    }

}
