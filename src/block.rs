// IEEE 488.2 definite-length arbitrary block: '#', one digit n, n digits giving
// the payload length, then the payload. Anything after the payload (usually the
// instrument's newline terminator) is ignored.

use std::str;

use crate::error::{Result, ScopeError};

pub const BLOCK_START:u8 = b'#';

// Borrowing variant, returns the payload in place
pub fn block_payload(raw:&[u8]) -> Result<&[u8]> {
	let (&first, rest) = raw.split_first()
		.ok_or_else(|| ScopeError::InvalidBlockHeader("empty reply".to_owned()))?;

	if first != BLOCK_START {
		return Err(ScopeError::InvalidBlockHeader(format!("expected '#' but reply starts with byte {:#04x}", first)));
	}

	let (&digit, rest) = rest.split_first()
		.ok_or_else(|| ScopeError::InvalidBlockHeader("missing length digit".to_owned()))?;

	let num_digits:usize = match digit {
		b'1'..=b'9' => (digit - b'0') as usize,
		b'0' => return Err(ScopeError::InvalidBlockHeader("indefinite-length blocks are not supported".to_owned())),
		_    => return Err(ScopeError::InvalidBlockHeader(format!("length digit {:#04x} is not an ASCII digit", digit))),
	};

	if rest.len() < num_digits {
		return Err(ScopeError::InvalidBlockHeader(format!("byte count field needs {} digits but only {} bytes follow", num_digits, rest.len())));
	}
	let (count_field, body) = rest.split_at(num_digits);

	if !count_field.iter().all(u8::is_ascii_digit) {
		return Err(ScopeError::InvalidBlockHeader(format!("byte count field {:?} is not decimal", String::from_utf8_lossy(count_field))));
	}
	let num_bytes:usize = str::from_utf8(count_field)
		.ok()
		.and_then(|s| s.parse::<usize>().ok())
		.ok_or_else(|| ScopeError::InvalidBlockHeader("byte count does not fit in memory".to_owned()))?;

	if body.len() < num_bytes {
		return Err(ScopeError::TruncatedPayload{ declared: num_bytes, available: body.len() });
	}

	Ok(&body[..num_bytes])
}

// Samples are unsigned bytes, so the payload is the sample sequence
pub fn decode_block(raw:&[u8]) -> Result<Vec<u8>> {
	block_payload(raw).map(|p| p.to_vec())
}

pub fn encode_block(payload:&[u8]) -> Vec<u8> {
	let count:String = payload.len().to_string();
	let mut ans:Vec<u8> = Vec::with_capacity(payload.len() + count.len() + 2);
	ans.push(BLOCK_START);
	ans.push(b'0' + count.len() as u8);
	ans.extend_from_slice(count.as_bytes());
	ans.extend_from_slice(payload);
	ans
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn decodes_exactly_the_payload() {
		let payload:Vec<u8> = (0..=255u8).collect();
		let mut raw:Vec<u8> = b"#9000000256".to_vec();
		raw.extend_from_slice(&payload);
		raw.push(b'\n');

		assert_eq!(decode_block(&raw).unwrap(), payload);
	}

	#[test]
	fn every_header_width_decodes() {
		let payload:Vec<u8> = vec![0x0a, b'#', 0x00, 0xff, 0x80];
		for n in 1..=9usize {
			let mut raw:Vec<u8> = format!("#{}{:0width$}", n, payload.len(), width = n).into_bytes();
			raw.extend_from_slice(&payload);
			assert_eq!(decode_block(&raw).unwrap(), payload, "header width {}", n);
		}
	}

	#[test]
	fn zero_length_block_is_empty() {
		assert!(decode_block(b"#10").unwrap().is_empty());
	}

	#[test]
	fn wrong_first_byte_is_invalid_header() {
		for first in [b'$', b'1', 0u8, b' '] {
			let raw:Vec<u8> = vec![first, b'1', b'3', 1, 2, 3];
			assert!(matches!(decode_block(&raw), Err(ScopeError::InvalidBlockHeader(_))));
		}
		assert!(matches!(decode_block(&[]), Err(ScopeError::InvalidBlockHeader(_))));
	}

	#[test]
	fn short_payload_is_truncated() {
		match decode_block(b"#210abcd") {
			Err(ScopeError::TruncatedPayload{ declared, available }) => {
				assert_eq!(declared, 10);
				assert_eq!(available, 4);
			},
			other => panic!("unexpected {:?}", other),
		}
	}

	#[test]
	fn malformed_count_fields() {
		assert!(matches!(decode_block(b"#"), Err(ScopeError::InvalidBlockHeader(_))));
		assert!(matches!(decode_block(b"#x12"), Err(ScopeError::InvalidBlockHeader(_))));
		assert!(matches!(decode_block(b"#31"), Err(ScopeError::InvalidBlockHeader(_))));
		assert!(matches!(decode_block(b"#2a1xyz"), Err(ScopeError::InvalidBlockHeader(_))));
		assert!(matches!(decode_block(b"#0abc\n"), Err(ScopeError::InvalidBlockHeader(_))));
	}

	#[test]
	fn encode_matches_what_decode_expects() {
		let payload:Vec<u8> = vec![7; 1200];
		let raw:Vec<u8> = encode_block(&payload);
		assert_eq!(&raw[..6], b"#41200");
		assert_eq!(block_payload(&raw).unwrap(), payload.as_slice());
	}
}
