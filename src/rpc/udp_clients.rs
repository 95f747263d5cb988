use std::io::{self, Error, ErrorKind};
use std::net::{SocketAddr, UdpSocket};
use std::time::{Duration, Instant};

use log::debug;

use crate::xdr::{Packer, Unpacker};
use super::{xdr_pack, xdr_unpack};

const RECV_BUFF_LEN:usize = 8192;

// Sends one RPC call to the broadcast address and gathers every reply that
// arrives before the listen window closes
pub struct BroadcastUdpClient {
	socket: UdpSocket,
	pub prog: u32,
	pub vers: u32,
	pub port: u16,
	pub lastxid: u32,
	pub packer: Packer,
	pub unpacker: Unpacker,
	recv_buff: Vec<u8>,
}

impl BroadcastUdpClient {

	pub fn bind(port:u16, prog:u32, vers:u32) -> io::Result<Self> {
		let socket:UdpSocket = UdpSocket::bind("0.0.0.0:0")?;
		socket.set_broadcast(true)?;

		Ok(Self{ socket, prog, vers, port, lastxid: 0, packer: Packer::new(), unpacker: Unpacker::new(), recv_buff: vec![0; RECV_BUFF_LEN] })
	}

	pub fn start_call(&mut self, prc:u32) -> io::Result<()> {
		self.lastxid = self.lastxid.wrapping_add(1);
		self.packer.reset();
		xdr_pack::pack_callheader_no_auth(&mut self.packer, self.lastxid, self.prog, self.vers, prc)
	}

	// Returns the sender of each reply along with the procedure results that followed its header
	pub fn make_call(&mut self, listen:Duration) -> io::Result<Vec<(SocketAddr, Vec<u8>)>> {
		let call:&[u8] = self.packer.as_bytes();
		let n:usize = self.socket.send_to(call, ("255.255.255.255", self.port))?;
		if n != call.len() {
			return Err(Error::new(ErrorKind::WriteZero, "Sent the wrong number of bytes"));
		}

		let deadline = Instant::now() + listen;
		let mut replies:Vec<(SocketAddr, Vec<u8>)> = vec![];

		loop {
			let remaining = deadline.saturating_duration_since(Instant::now());
			if remaining.is_zero() { break; }
			self.socket.set_read_timeout(Some(remaining))?;

			let (n, addr) = match self.socket.recv_from(&mut self.recv_buff) {
				Ok(x) => x,
				Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut => break,
				Err(e) => return Err(e),
			};

			self.unpacker.reset(&self.recv_buff[..n]);
			match xdr_unpack::unpack_replyheader(&mut self.unpacker) {
				Ok((xid, _)) if xid == self.lastxid => replies.push((addr, self.unpacker.remaining().to_vec())),
				Ok(_)  => { },
				Err(e) => debug!("Ignoring unusable broadcast reply from {}: {}", addr, e),
			}
		}

		Ok(replies)
	}

}
