use std::io;

use crate::xdr::Packer;
use crate::rpc::{CALL, RPCVERSION};

// AUTH_NONE
const AUTH_NULL:i32 = 0;

pub fn pack_auth(packer:&mut Packer, flavor:i32, stuff:&[u8]) -> io::Result<()> {
	packer.pack_enum(flavor)?;
	packer.pack_variable_len_opaque(stuff)
}

pub fn pack_callheader(packer:&mut Packer, xid:u32, prog:u32, vers:u32, prc:u32, cred:(i32, &[u8]), verf:(i32, &[u8])) -> io::Result<()> {
	packer.pack_u32(xid)?;
	packer.pack_enum(CALL)?;
	packer.pack_u32(RPCVERSION)?;
	packer.pack_u32(prog)?;
	packer.pack_u32(vers)?;
	packer.pack_u32(prc)?;
	pack_auth(packer, cred.0, cred.1)?;
	pack_auth(packer, verf.0, verf.1)
}

pub fn pack_callheader_no_auth(packer:&mut Packer, xid:u32, prog:u32, vers:u32, prc:u32) -> io::Result<()> {
	pack_callheader(packer, xid, prog, vers, prc, (AUTH_NULL, &[]), (AUTH_NULL, &[]))
}

pub fn pack_mapping(packer:&mut Packer, prog:u32, vers:u32, prot:u32, port:u32) -> io::Result<()> {
	packer.pack_u32(prog)?;
	packer.pack_u32(vers)?;
	packer.pack_u32(prot)?;
	packer.pack_u32(port)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::xdr::Unpacker;

	#[test]
	fn call_header_layout() {
		let mut p = Packer::new();
		pack_callheader_no_auth(&mut p, 42, 0x0607af, 1, 11).unwrap();

		let mut u = Unpacker::new();
		u.reset(p.as_bytes());
		assert_eq!(u.unpack_u32().unwrap(), 42);
		assert_eq!(u.unpack_enum().unwrap(), CALL);
		assert_eq!(u.unpack_u32().unwrap(), RPCVERSION);
		assert_eq!(u.unpack_u32().unwrap(), 0x0607af);
		assert_eq!(u.unpack_u32().unwrap(), 1);
		assert_eq!(u.unpack_u32().unwrap(), 11);
		// cred and verf, both AUTH_NONE with empty bodies
		for _ in 0..2 {
			assert_eq!(u.unpack_enum().unwrap(), AUTH_NULL);
			assert!(u.unpack_variable_len_opaque().unwrap().is_empty());
		}
		assert!(u.all_data_consumed());
	}
}
