use std::io::{self, Read, Write, Error, ErrorKind};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use byteorder::{BigEndian, WriteBytesExt, ReadBytesExt};
use log::trace;

use crate::xdr::{Packer, Unpacker};
use super::{xdr_pack, xdr_unpack, LAST_FRAGMENT};

pub struct TcpClient {
	stream: TcpStream,
	pub prog: u32,
	pub vers: u32,
	pub lastxid: u32,
	pub packer: Packer,
	pub unpacker: Unpacker,
}

impl TcpClient {

	pub fn connect<A: ToSocketAddrs>(addr:A, prog:u32, vers:u32, timeout:Duration) -> io::Result<Self> {
		let sock_addr = addr.to_socket_addrs()?
			.next()
			.ok_or_else(|| Error::new(ErrorKind::NotFound, "Address did not resolve"))?;

		let stream = TcpStream::connect_timeout(&sock_addr, timeout)?;
		stream.set_read_timeout(Some(timeout))?;
		stream.set_write_timeout(Some(timeout))?;
		stream.set_nodelay(true)?;

		Ok(Self{ stream, prog, vers, lastxid: 0, packer: Packer::new(), unpacker: Unpacker::new() })
	}

	// The device may legitimately take longer than the socket default, so callers
	// stretch the read timeout to cover whatever they asked the device to wait
	pub fn set_read_timeout(&mut self, timeout:Duration) -> io::Result<()> {
		self.stream.set_read_timeout(Some(timeout))
	}

	pub fn start_call(&mut self, prc:u32) -> io::Result<()> {
		self.lastxid = self.lastxid.wrapping_add(1);
		self.packer.reset();
		xdr_pack::pack_callheader_no_auth(&mut self.packer, self.lastxid, self.prog, self.vers, prc)
	}

	// Sends whatever has been packed since start_call and loads the matching reply
	// into the unpacker, positioned after the reply header
	pub fn do_call(&mut self) -> io::Result<()> {
		let call:&[u8] = self.packer.as_bytes();
		let len:u32 = u32::try_from(call.len()).map_err(|_| Error::new(ErrorKind::InvalidInput, "RPC call too long"))?;

		let mut send_bytes:Vec<u8> = Vec::with_capacity(call.len() + 4);
		send_bytes.write_u32::<BigEndian>(len | LAST_FRAGMENT)?;
		send_bytes.extend_from_slice(call);
		self.stream.write_all(&send_bytes)?;

		loop {
			let reply:Vec<u8> = self.read_record()?;
			self.unpacker.reset(&reply);

			let (xid, _) = xdr_unpack::unpack_replyheader(&mut self.unpacker)?;
			if xid == self.lastxid {
				return Ok(());
			} else if xid < self.lastxid {
				// Stale reply to a call we already gave up on
				trace!("Discarding stale RPC reply xid={} (expecting {})", xid, self.lastxid);
				continue;
			} else {
				return Err(Error::new(ErrorKind::InvalidData, "Received a reply for an xid that hasn't been sent"));
			}
		}
	}

	fn read_record(&mut self) -> io::Result<Vec<u8>> {
		let mut record:Vec<u8> = vec![];

		let mut last:bool = false;
		while !last {
			let header:u32 = self.stream.read_u32::<BigEndian>()?;
			last = (header & LAST_FRAGMENT) != 0;

			let n:usize = (header & !LAST_FRAGMENT) as usize;
			let start:usize = record.len();
			record.resize(start + n, 0);
			self.stream.read_exact(&mut record[start..])?;
		}

		Ok(record)
	}

}
