use std::io::{self, Error, ErrorKind};

use crate::xdr::Unpacker;
use crate::rpc::{REPLY, MSG_DENIED, RPC_MISMATCH, AUTH_ERROR, MSG_ACCEPTED, PROG_UNAVAIL, PROG_MISMATCH, PROC_UNAVAIL, GARBAGE_ARGS, SUCCESS};

fn rejected(msg:&str) -> io::Error { Error::new(ErrorKind::ConnectionRefused, msg) }

pub struct Auth {
	pub flavor: i32,
	pub body: Vec<u8>,
}

pub fn unpack_auth(unpacker:&mut Unpacker) -> io::Result<Auth> {
	let flavor:i32  = unpacker.unpack_enum()?;
	let body:Vec<u8> = unpacker.unpack_variable_len_opaque()?;
	Ok(Auth{ flavor, body })
}

// Leaves the unpacker positioned at the procedure's results
pub fn unpack_replyheader(unpacker:&mut Unpacker) -> io::Result<(u32, Auth)> {
	let xid:u32 = unpacker.unpack_u32()?;

	if unpacker.unpack_enum()? != REPLY {
		return Err(Error::new(ErrorKind::InvalidData, "Expected REPLY message type"));
	}

	match unpacker.unpack_enum()? {
		MSG_DENIED => {
			return match unpacker.unpack_enum()? {
				RPC_MISMATCH => {
					let low:u32  = unpacker.unpack_u32()?;
					let high:u32 = unpacker.unpack_u32()?;
					Err(rejected(&format!("Message denied, RPC version mismatch (supported {}..{})", low, high)))
				},
				AUTH_ERROR => {
					let stat:u32 = unpacker.unpack_u32()?;
					Err(rejected(&format!("Message denied, authentication error {}", stat)))
				},
				_ => Err(rejected("Message denied for an unknown reason")),
			};
		},
		MSG_ACCEPTED => { },
		_ => return Err(Error::new(ErrorKind::InvalidData, "Neither MSG_DENIED nor MSG_ACCEPTED in reply")),
	}

	let verf = unpack_auth(unpacker)?;

	match unpacker.unpack_enum()? {
		SUCCESS       => Ok((xid, verf)),
		PROG_UNAVAIL  => Err(rejected("Program unavailable")),
		PROG_MISMATCH => {
			let low:u32  = unpacker.unpack_u32()?;
			let high:u32 = unpacker.unpack_u32()?;
			Err(rejected(&format!("Program version mismatch (supported {}..{})", low, high)))
		},
		PROC_UNAVAIL  => Err(rejected("Procedure unavailable")),
		GARBAGE_ARGS  => Err(rejected("Garbage args")),
		_             => Err(rejected("Call failed for an unknown reason")),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::xdr::Packer;

	fn reply(xid:u32, accept:i32, stat:i32) -> Vec<u8> {
		let mut p = Packer::new();
		p.pack_u32(xid).unwrap();
		p.pack_enum(REPLY).unwrap();
		p.pack_enum(accept).unwrap();
		p.pack_enum(0).unwrap();
		p.pack_variable_len_opaque(&[]).unwrap();
		p.pack_enum(stat).unwrap();
		p.pack_u32(1234).unwrap();
		p.as_bytes().to_vec()
	}

	#[test]
	fn accepted_reply_leaves_results() {
		let mut u = Unpacker::new();
		u.reset(&reply(9, MSG_ACCEPTED, SUCCESS));
		let (xid, verf) = unpack_replyheader(&mut u).unwrap();
		assert_eq!(xid, 9);
		assert_eq!(verf.flavor, 0);
		assert!(verf.body.is_empty());
		assert_eq!(u.unpack_u32().unwrap(), 1234);
	}

	#[test]
	fn unavailable_program_is_an_error() {
		let mut u = Unpacker::new();
		u.reset(&reply(9, MSG_ACCEPTED, PROG_UNAVAIL));
		let e = unpack_replyheader(&mut u).err().unwrap();
		assert_eq!(e.kind(), ErrorKind::ConnectionRefused);
	}
}
