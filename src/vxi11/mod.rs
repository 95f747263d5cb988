// Device core
pub const DEVICE_CORE_PROG:u32  = 0x0607af;
pub const DEVICE_CORE_VERS:u32  = 1;
pub const CREATE_LINK:u32       = 10;
pub const DEVICE_WRITE:u32      = 11;
pub const DEVICE_READ:u32       = 12;
pub const DESTROY_LINK:u32      = 23;

pub const CLIENT_ID:i32 = 3333;
pub const DEFAULT_LOCK_TIMEOUT:u32 = 10000;
pub const DEFAULT_DEVICE_NAME:&str = "inst0";

// Operation flags
pub const OPERATION_FLAGS_END:i32      = 8;
pub const OPERATION_FLAGS_TERMCHRSET:i32 = 128;

// Reason bits in a device_read reply
pub const REASON_REQCNT:i32 = 1;
pub const REASON_CHR:i32    = 2;
pub const REASON_END:i32    = 4;

// Headroom on top of the device-side timeout before the socket gives up
const SOCKET_TIMEOUT_MARGIN:Duration = Duration::from_secs(1);

use std::io::{self, Error, ErrorKind};
use std::time::Duration;

use log::{debug, trace};

use crate::rpc::port_mapping::{TcpPortMapperClient, Mapping, Protocol};
use crate::rpc::tcp_clients::TcpClient;

pub mod xdr_pack;

fn device_error(code:i32) -> io::Error {
    match code {
        1  => Error::new(ErrorKind::InvalidInput, "Syntax error"),
        3  => Error::new(ErrorKind::NotFound, "Device not accessible"),
        4  => Error::new(ErrorKind::NotConnected, "Invalid link identifier"),
        5  => Error::new(ErrorKind::InvalidInput, "Parameter error"),
        6  => Error::new(ErrorKind::NotConnected, "Channel not established"),
        8  => Error::new(ErrorKind::Unsupported, "Operation not supported"),
        9  => Error::new(ErrorKind::OutOfMemory, "Out of resources"),
        11 => Error::new(ErrorKind::PermissionDenied, "Device locked by another link"),
        12 => Error::new(ErrorKind::PermissionDenied, "No lock held by this link"),
        15 => Error::new(ErrorKind::TimedOut, "I/O timeout"),
        17 => Error::new(ErrorKind::Other, "I/O error"),
        21 => Error::new(ErrorKind::InvalidInput, "Invalid address"),
        23 => Error::new(ErrorKind::Interrupted, "Abort"),
        29 => Error::new(ErrorKind::AlreadyExists, "Channel already established"),
        x  => Error::new(ErrorKind::Other, format!("Unknown device error {}", x)),
    }
}

fn no_link() -> io::Error { Error::new(ErrorKind::NotConnected, "No link") }

#[derive(Debug, Clone, Copy)]
pub struct Link {
    pub link_id: i32,
    pub abort_port: u16,
    pub max_recv_size: u32,
}

// One core channel to one instrument. The abort and interrupt channels aren't
// used: a stuck transfer is bounded by io_timeout instead.
pub struct CoreClient {
    client: TcpClient,
    opt_link: Option<Link>,
    io_timeout: Duration,
}

impl CoreClient {

    pub fn new(host:&str, connect_timeout:Duration, io_timeout:Duration) -> io::Result<Self> {

        // Find the port to use for the core program
        let mut pmap_client = TcpPortMapperClient::new(host, connect_timeout)?;

        let mapping = Mapping {
            program: DEVICE_CORE_PROG,
            version: DEVICE_CORE_VERS,
            protocol: Protocol::TCP,
            port: 0,
        };

        let port = pmap_client.get_port(&mapping)?;
        if port == 0 {
            return Err(Error::new(ErrorKind::NotFound, "Host does not export the VXI-11 core program"));
        }
        debug!("VXI-11 core channel for {} is on port {}", host, port);

        let mut client = TcpClient::connect((host, port), DEVICE_CORE_PROG, DEVICE_CORE_VERS, connect_timeout)?;
        client.set_read_timeout(io_timeout + SOCKET_TIMEOUT_MARGIN)?;

        Ok(CoreClient { client, opt_link: None, io_timeout })
    }

    fn get_link(&self) -> io::Result<Link> { self.opt_link.ok_or_else(no_link) }

    fn io_timeout_ms(&self) -> u32 { u32::try_from(self.io_timeout.as_millis()).unwrap_or(u32::MAX) }

    pub fn create_link(&mut self, device:&str) -> io::Result<Link> {
        if self.opt_link.is_some() {
            return Err(Error::new(ErrorKind::AlreadyExists, "Already connected to a link"));
        }

        self.client.start_call(CREATE_LINK)?;
        xdr_pack::pack_create_link_parms(&mut self.client.packer, CLIENT_ID, false, DEFAULT_LOCK_TIMEOUT, device)?;
        self.client.do_call()?;

        let error:i32         = self.client.unpacker.unpack_i32()?;
        let link_id:i32       = self.client.unpacker.unpack_i32()?;
        let abort_port:u32    = self.client.unpacker.unpack_u32()?;
        let max_recv_size:u32 = self.client.unpacker.unpack_u32()?;

        if error != 0 { return Err(device_error(error)); }

        let link = Link{ link_id, abort_port: abort_port as u16, max_recv_size };
        debug!("Created VXI-11 link {:?} to {}", link, device);
        self.opt_link = Some(link);
        Ok(link)
    }

    // Writes are split to respect the device's max_recv_size and only the last
    // chunk carries END
    pub fn write(&mut self, data:&[u8]) -> io::Result<()> {
        let link = self.get_link()?;
        let chunk_len:usize = (link.max_recv_size as usize).max(1);
        let chunks:Vec<&[u8]> = if data.is_empty() { vec![data] } else { data.chunks(chunk_len).collect() };
        let last_idx:usize = chunks.len() - 1;
        let timeout_ms:u32 = self.io_timeout_ms();

        for (idx, chunk) in chunks.into_iter().enumerate() {
            let flags:i32 = if idx == last_idx { OPERATION_FLAGS_END } else { 0 };

            self.client.start_call(DEVICE_WRITE)?;
            xdr_pack::pack_device_write_parms(&mut self.client.packer, link.link_id, timeout_ms, DEFAULT_LOCK_TIMEOUT, flags, chunk)?;
            self.client.do_call()?;

            let error:i32 = self.client.unpacker.unpack_i32()?;
            let size:u32  = self.client.unpacker.unpack_u32()?;

            if error != 0 { return Err(device_error(error)); }
            if size as usize != chunk.len() {
                return Err(Error::new(ErrorKind::WriteZero, "Number of bytes in confirmation doesn't match number of bytes sent"));
            }
        }

        Ok(())
    }

    // Reads one message. With a term_char the device may stop early at that
    // character, otherwise only END finishes the message.
    pub fn read(&mut self, request_size:u32, term_char:Option<u8>) -> io::Result<Vec<u8>> {
        let link = self.get_link()?;
        let (flags, term):(i32, i32) = match term_char {
            Some(c) => (OPERATION_FLAGS_TERMCHRSET, c as i32),
            None    => (0, 0),
        };

        let timeout_ms:u32 = self.io_timeout_ms();

        let mut ans:Vec<u8> = vec![];
        loop {
            self.client.start_call(DEVICE_READ)?;
            xdr_pack::pack_device_read_parms(&mut self.client.packer, link.link_id, request_size, timeout_ms, DEFAULT_LOCK_TIMEOUT, flags, term)?;
            self.client.do_call()?;

            let error:i32    = self.client.unpacker.unpack_i32()?;
            let reason:i32   = self.client.unpacker.unpack_i32()?;
            let data:Vec<u8> = self.client.unpacker.unpack_variable_len_opaque()?;

            if error != 0 { return Err(device_error(error)); }
            trace!("device_read got {} bytes, reason={:#x}", data.len(), reason);
            ans.extend_from_slice(&data);

            if reason & (REASON_END | REASON_CHR) != 0 {
                return Ok(ans);
            } else if reason & REASON_REQCNT == 0 {
                return Err(Error::new(ErrorKind::InvalidData, "Expected one of three reason bits to be set"));
            }
            // Request size reached, the rest of the message is still waiting
        }
    }

    pub fn destroy_link(&mut self) -> io::Result<()> {
        let link = self.opt_link.take().ok_or_else(no_link)?;

        self.client.start_call(DESTROY_LINK)?;
        xdr_pack::pack_device_link(&mut self.client.packer, link.link_id)?;
        self.client.do_call()?;

        match self.client.unpacker.unpack_i32()? {
            0 => Ok(()),
            e => Err(device_error(e)),
        }
    }

    pub fn has_link(&self) -> bool { self.opt_link.is_some() }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_timeout_maps_to_timed_out() {
        assert_eq!(device_error(15).kind(), ErrorKind::TimedOut);
        assert_eq!(device_error(11).kind(), ErrorKind::PermissionDenied);
        assert!(device_error(99).to_string().contains("99"));
    }
}
