use std::io::{self, Write, Error, ErrorKind, Cursor};

use byteorder::{BigEndian, WriteBytesExt, ReadBytesExt};

#[derive(Default)]
pub struct Packer {
	buff: Vec<u8>
}

#[derive(Default)]
pub struct Unpacker {
	buff: Vec<u8>
}

fn err(msg:&str) -> io::Error { Error::new(ErrorKind::InvalidData, msg) }

impl Packer {

	pub fn new() -> Self { Packer{ buff: Vec::new() } }

	pub fn reset(&mut self) { self.buff.clear(); }

	pub fn as_bytes(&self) -> &[u8] { &self.buff }

	// Every primitive below is a multiple of four bytes, so alignment only needs
	// attention after opaque data
	pub fn pack_u32(&mut self, x:u32) -> io::Result<()> { self.buff.write_u32::<BigEndian>(x) }
	pub fn pack_i32(&mut self, x:i32) -> io::Result<()> { self.buff.write_i32::<BigEndian>(x) }
	pub fn pack_enum(&mut self, x:i32) -> io::Result<()> { self.pack_i32(x) }

	pub fn pack_bool(&mut self, b:bool) -> io::Result<()> {
		self.pack_i32(if b { 1 } else { 0 })
	}

	pub fn pack_variable_len_opaque(&mut self, data:&[u8]) -> io::Result<()> {
		let len:u32 = u32::try_from(data.len()).map_err(|_| err("Opaque data too long for XDR"))?;
		self.pack_u32(len)?;
		self.buff.write_all(data)?;

		while self.buff.len() % 4 != 0 { self.buff.push(0); }
		Ok(())
	}

	pub fn pack_string(&mut self, s:&str) -> io::Result<()> {
		if !s.is_ascii() { return Err(err("XDR strings must be ASCII")); }
		self.pack_variable_len_opaque(s.as_bytes())
	}

}

impl Unpacker {

	pub fn new() -> Self { Unpacker{ buff: Vec::new() } }

	pub fn reset(&mut self, data:&[u8]) {
		self.buff.clear();
		self.buff.extend_from_slice(data);
	}

	pub fn all_data_consumed(&self) -> bool { self.buff.is_empty() }

	pub fn remaining(&self) -> &[u8] { &self.buff }

	fn skip(&mut self, n:usize) -> io::Result<()> {
		if n % 4 != 0 { return Err(err("Only skip multiples of four bytes in order to maintain alignment")); }
		if n > self.buff.len() { return Err(err("Tried to skip past the end of the buffer")); }
		self.buff.drain(..n);
		Ok(())
	}

	pub fn unpack_u32(&mut self) -> io::Result<u32> {
		let ans:u32 = Cursor::new(&self.buff).read_u32::<BigEndian>()?;
		self.skip(4)?;
		Ok(ans)
	}

	pub fn unpack_i32(&mut self) -> io::Result<i32> {
		let ans:i32 = Cursor::new(&self.buff).read_i32::<BigEndian>()?;
		self.skip(4)?;
		Ok(ans)
	}

	// Whether an enum value is in range depends on the procedure being called,
	// so at this level it's just an i32
	pub fn unpack_enum(&mut self) -> io::Result<i32> { self.unpack_i32() }

	pub fn unpack_bool(&mut self) -> io::Result<bool> {
		match self.unpack_i32()? {
			0 => Ok(false),
			1 => Ok(true),
			x => Err(Error::new(ErrorKind::InvalidData, format!("Expected 0 or 1 for an XDR bool but got {}", x))),
		}
	}

	pub fn unpack_variable_len_opaque(&mut self) -> io::Result<Vec<u8>> {
		let n:usize = self.unpack_u32()? as usize;
		if n > self.buff.len() { return Err(err("Opaque length runs past the end of the buffer")); }
		let ans:Vec<u8> = self.buff.drain(..n).collect();

		let pad:usize = (4 - n % 4) % 4;
		self.buff.drain(..pad.min(self.buff.len()));
		Ok(ans)
	}

}
