pub const PMAP_PROG:u32 = 100000;
pub const PMAP_VERS:u32 = 2;
pub const PMAP_PORT:u16 = 111;

pub const PMAPPROC_GETPORT:u32 = 3;     // (mapping) -> unsigned int

use std::io::{self, Error, ErrorKind};
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use crate::xdr::Unpacker;

use super::{IPPROTO_TCP, IPPROTO_UDP};
use super::xdr_pack;
use super::tcp_clients::TcpClient;
use super::udp_clients::BroadcastUdpClient;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Protocol {
	TCP,
	UDP,
}

impl Protocol {
	pub fn to_u32(self) -> u32 { match self {
		Protocol::TCP => IPPROTO_TCP,
		Protocol::UDP => IPPROTO_UDP,
	}}
}

#[derive(Debug, Clone)]
pub struct Mapping {
	pub program: u32,
	pub version: u32,
	pub protocol: Protocol,
	pub port: u32,
}

fn unpack_port(unpacker:&mut Unpacker) -> io::Result<u16> {
	let port:u32 = unpacker.unpack_u32()?;
	if !unpacker.all_data_consumed() {
		return Err(Error::new(ErrorKind::InvalidData, "Data unexpectedly left over after unpacking port"));
	}
	u16::try_from(port).map_err(|_| Error::new(ErrorKind::InvalidData, "Port mapper returned a port out of range"))
}

pub struct TcpPortMapperClient {
	client: TcpClient,
}

impl TcpPortMapperClient {

	pub fn new(host:&str, timeout:Duration) -> io::Result<Self> {
		Ok(Self{ client: TcpClient::connect((host, PMAP_PORT), PMAP_PROG, PMAP_VERS, timeout)? })
	}

	// Zero means the program isn't registered
	pub fn get_port(&mut self, m:&Mapping) -> io::Result<u16> {
		self.client.start_call(PMAPPROC_GETPORT)?;
		xdr_pack::pack_mapping(&mut self.client.packer, m.program, m.version, m.protocol.to_u32(), m.port)?;
		self.client.do_call()?;

		unpack_port(&mut self.client.unpacker)
	}

}

// Asks every port mapper on the local broadcast domain where it serves the given
// program. Hosts that reply with a nonzero port are the ones exporting it.
pub fn broadcast_get_port(m:&Mapping, listen:Duration) -> io::Result<Vec<(IpAddr, u16)>> {
	let mut client = BroadcastUdpClient::bind(PMAP_PORT, PMAP_PROG, PMAP_VERS)?;
	client.start_call(PMAPPROC_GETPORT)?;
	xdr_pack::pack_mapping(&mut client.packer, m.program, m.version, m.protocol.to_u32(), m.port)?;

	let mut found:Vec<(IpAddr, u16)> = vec![];
	for (addr, results) in client.make_call(listen)? {
		let mut unpacker = Unpacker::new();
		unpacker.reset(&results);
		match unpack_port(&mut unpacker) {
			Ok(0) => { },
			Ok(port) if addr.ip() != IpAddr::V4(Ipv4Addr::UNSPECIFIED) => found.push((addr.ip(), port)),
			_ => { },
		}
	}

	found.sort();
	found.dedup();
	Ok(found)
}
