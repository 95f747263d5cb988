use std::io;

use crate::xdr::Packer;

pub fn pack_device_link(packer:&mut Packer, link:i32) -> io::Result<()> {
	packer.pack_i32(link)
}

pub fn pack_create_link_parms(packer:&mut Packer, id:i32, lock_device:bool, lock_timeout:u32, device:&str) -> io::Result<()> {
	packer.pack_i32(id)?;
	packer.pack_bool(lock_device)?;
	packer.pack_u32(lock_timeout)?;
	packer.pack_string(device)
}

pub fn pack_device_write_parms(packer:&mut Packer, link:i32, timeout:u32, lock_timeout:u32, flags:i32, data:&[u8]) -> io::Result<()> {
	packer.pack_i32(link)?;
	packer.pack_u32(timeout)?;
	packer.pack_u32(lock_timeout)?;
	packer.pack_i32(flags)?;
	packer.pack_variable_len_opaque(data)
}

pub fn pack_device_read_parms(packer:&mut Packer, link:i32, request_size:u32, timeout:u32, lock_timeout:u32, flags:i32, term_char:i32) -> io::Result<()> {
	packer.pack_i32(link)?;
	packer.pack_u32(request_size)?;
	packer.pack_u32(timeout)?;
	packer.pack_u32(lock_timeout)?;
	packer.pack_i32(flags)?;
	packer.pack_i32(term_char)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::xdr::Unpacker;

	#[test]
	fn read_parms_field_order() {
		let mut p = Packer::new();
		pack_device_read_parms(&mut p, 3, 1024, 5000, 10000, 0x80, b'\n' as i32).unwrap();

		let mut u = Unpacker::new();
		u.reset(p.as_bytes());
		assert_eq!(u.unpack_i32().unwrap(), 3);
		assert_eq!(u.unpack_u32().unwrap(), 1024);
		assert_eq!(u.unpack_u32().unwrap(), 5000);
		assert_eq!(u.unpack_u32().unwrap(), 10000);
		assert_eq!(u.unpack_i32().unwrap(), 0x80);
		assert_eq!(u.unpack_i32().unwrap(), 10);
		assert!(u.all_data_consumed());
	}

	#[test]
	fn create_link_rejects_non_ascii_device_names() {
		let mut p = Packer::new();
		assert!(pack_create_link_parms(&mut p, 1, false, 0, "inst\u{e9}").is_err());
	}
}
