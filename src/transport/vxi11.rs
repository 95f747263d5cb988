use std::str;
use std::time::Duration;

use log::{debug, warn};

use crate::config::TransportConfig;
use crate::error::{Result, ScopeError};
use crate::vxi11::CoreClient;

use super::Instrument;

// An instrument reached through a VXI-11 core link (LAN scopes and anything
// exposing TCPIP::...::INSTR)
pub struct Vxi11Instrument {
    resource: String,
    core: CoreClient,
    io_timeout: Duration,
    chunk_size: u32,
    write_termination: String,
    read_termination: String,
    term_char: Option<u8>,
}

impl Vxi11Instrument {

    pub fn open(resource:&str, host:&str, device:&str, config:&TransportConfig) -> Result<Self> {
        let io_timeout = config.io_timeout();
        let mut core = CoreClient::new(host, config.open_timeout(), io_timeout)
            .map_err(|e| ScopeError::from_io("open", config.open_timeout(), e))?;

        let link = core.create_link(device)
            .map_err(|e| ScopeError::from_io("create_link", config.open_timeout(), e))?;

        // Ask for no more than the device says it can buffer in one go
        let chunk_size:u32 = u32::try_from(config.chunk_size).unwrap_or(u32::MAX).max(1);
        let chunk_size:u32 = if link.max_recv_size > 0 { chunk_size.min(link.max_recv_size) } else { chunk_size };

        Ok(Self {
            resource: resource.to_owned(),
            core,
            io_timeout,
            chunk_size,
            write_termination: config.write_termination.clone(),
            read_termination: config.read_termination.clone(),
            term_char: config.read_term_char(),
        })
    }

    fn io_err(&self, command:&str, e:std::io::Error) -> ScopeError {
        ScopeError::from_io(command, self.io_timeout, e)
    }

}

impl Instrument for Vxi11Instrument {

    fn resource(&self) -> &str { &self.resource }

    fn write(&mut self, command:&str) -> Result<()> {
        debug!("{} <- {}", self.resource, command);
        let msg:String = format!("{}{}", command, self.write_termination);
        self.core.write(msg.as_bytes()).map_err(|e| self.io_err(command, e))
    }

    fn query(&mut self, command:&str) -> Result<String> {
        self.write(command)?;
        let bytes:Vec<u8> = self.core.read(self.chunk_size, self.term_char).map_err(|e| self.io_err(command, e))?;

        let reply:&str = str::from_utf8(&bytes)
            .map_err(|_| ScopeError::protocol(command, "Unable to parse response as UTF-8"))?;
        let reply:&str = reply.strip_suffix(self.read_termination.as_str()).unwrap_or(reply);

        debug!("{} -> {}", self.resource, reply);
        Ok(reply.to_owned())
    }

    fn read_raw(&mut self) -> Result<Vec<u8>> {
        // No term char here, binary payloads contain newlines
        let bytes:Vec<u8> = self.core.read(self.chunk_size, None).map_err(|e| self.io_err("read_raw", e))?;
        debug!("{} -> {} raw bytes", self.resource, bytes.len());
        Ok(bytes)
    }

}

impl Drop for Vxi11Instrument {

    fn drop(&mut self) {
        if self.core.has_link() {
            if let Err(e) = self.core.destroy_link() {
                warn!("Unable to destroy link for {}: {}", self.resource, e);
            }
        }
    }

}
