use byteorder::{LittleEndian, WriteBytesExt};
use primitives::bytes::Bytes;
use std::borrow::Borrow;
use std::io;

use bitcrypto::SHA256D;
use primitives::compact::Compact;

/// Serialize the transaction witness data.
pub const SERIALIZE_TRANSACTION_WITNESS: u32 = 0x4000_0000;

pub trait Serializable {
	fn serialize(&self, stream: &mut Stream);

	fn serialized_size(&self) -> usize {
		let mut stream = Stream::default();
		self.serialize(&mut stream);
		stream.out().len()
	}

	fn serialized_size_with_flags(&self, flags: u32) -> usize {
		let mut stream = Stream::with_flags(flags);
		self.serialize(&mut stream);
		stream.out().len()
	}
}

/// Stream used for serialization of Bitcoin structures
#[derive(Default)]
pub struct Stream {
	buffer: Vec<u8>,
	flags: u32,
}

impl Stream {
	pub fn new() -> Self {
		Stream::default()
	}

	pub fn with_flags(flags: u32) -> Self {
		Stream {
			buffer: Vec::new(),
			flags,
		}
	}

	pub fn include_transaction_witness(&self) -> bool {
		(self.flags & SERIALIZE_TRANSACTION_WITNESS) != 0
	}

	/// Serializes the struct and appends it to the end of stream.
	pub fn append<T>(&mut self, t: &T) -> &mut Self
	where
		T: Serializable,
	{
		t.serialize(self);
		self
	}

	/// Appends raw bytes to the end of the stream.
	pub fn append_slice(&mut self, bytes: &[u8]) -> &mut Self {
		self.buffer.extend_from_slice(bytes);
		self
	}

	/// Appends a list of serializable structs to the end of the stream.
	pub fn append_list<T, K>(&mut self, t: &[K]) -> &mut Self
	where
		T: Serializable,
		K: Borrow<T>,
	{
		CompactInteger::from(t.len()).serialize(self);
		for i in t {
			i.borrow().serialize(self);
		}
		self
	}

	/// Full stream.
	pub fn out(self) -> Bytes {
		self.buffer.into()
	}
}

impl io::Write for Stream {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		self.buffer.extend_from_slice(buf);
		Ok(buf.len())
	}

	fn flush(&mut self) -> io::Result<()> {
		Ok(())
	}
}

pub fn serialize<T>(t: &T) -> Bytes
where
	T: Serializable,
{
	let mut stream = Stream::default();
	stream.append(t);
	stream.out()
}

pub fn serialize_with_flags<T>(t: &T, flags: u32) -> Bytes
where
	T: Serializable,
{
	let mut stream = Stream::with_flags(flags);
	stream.append(t);
	stream.out()
}

/// Variable-length integer used for list length prefixes.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactInteger(u64);

impl From<usize> for CompactInteger {
	fn from(i: usize) -> Self {
		CompactInteger(i as u64)
	}
}

impl From<u32> for CompactInteger {
	fn from(i: u32) -> Self {
		CompactInteger(i as u64)
	}
}

impl From<u64> for CompactInteger {
	fn from(i: u64) -> Self {
		CompactInteger(i)
	}
}

impl Serializable for CompactInteger {
	fn serialize(&self, stream: &mut Stream) {
		match self.0 {
			0..=0xfc => stream.write_u8(self.0 as u8).unwrap(),
			0xfd..=0xffff => {
				stream.write_u8(0xfd).unwrap();
				stream.write_u16::<LittleEndian>(self.0 as u16).unwrap();
			}
			0x10000..=0xffff_ffff => {
				stream.write_u8(0xfe).unwrap();
				stream.write_u32::<LittleEndian>(self.0 as u32).unwrap();
			}
			_ => {
				stream.write_u8(0xff).unwrap();
				stream.write_u64::<LittleEndian>(self.0).unwrap();
			}
		}
	}

	fn serialized_size(&self) -> usize {
		match self.0 {
			0..=0xfc => 1,
			0xfd..=0xffff => 3,
			0x10000..=0xffff_ffff => 5,
			_ => 9,
		}
	}
}

impl Serializable for u8 {
	#[inline]
	fn serialize(&self, s: &mut Stream) {
		s.write_u8(*self).unwrap();
	}

	#[inline]
	fn serialized_size(&self) -> usize {
		1
	}
}

impl Serializable for u16 {
	#[inline]
	fn serialize(&self, s: &mut Stream) {
		s.write_u16::<LittleEndian>(*self).unwrap();
	}

	#[inline]
	fn serialized_size(&self) -> usize {
		2
	}
}

impl Serializable for u32 {
	#[inline]
	fn serialize(&self, s: &mut Stream) {
		s.write_u32::<LittleEndian>(*self).unwrap();
	}

	#[inline]
	fn serialized_size(&self) -> usize {
		4
	}
}

impl Serializable for u64 {
	#[inline]
	fn serialize(&self, s: &mut Stream) {
		s.write_u64::<LittleEndian>(*self).unwrap();
	}

	#[inline]
	fn serialized_size(&self) -> usize {
		8
	}
}

impl Serializable for i32 {
	#[inline]
	fn serialize(&self, s: &mut Stream) {
		s.write_i32::<LittleEndian>(*self).unwrap();
	}

	#[inline]
	fn serialized_size(&self) -> usize {
		4
	}
}

impl Serializable for i64 {
	#[inline]
	fn serialize(&self, s: &mut Stream) {
		s.write_i64::<LittleEndian>(*self).unwrap();
	}

	#[inline]
	fn serialized_size(&self) -> usize {
		8
	}
}

impl Serializable for SHA256D {
	#[inline]
	fn serialize(&self, s: &mut Stream) {
		s.append_slice(&self[..]);
	}

	#[inline]
	fn serialized_size(&self) -> usize {
		32
	}
}

impl Serializable for Compact {
	#[inline]
	fn serialize(&self, s: &mut Stream) {
		let raw: u32 = (*self).into();
		raw.serialize(s);
	}

	#[inline]
	fn serialized_size(&self) -> usize {
		4
	}
}

impl Serializable for Bytes {
	fn serialize(&self, s: &mut Stream) {
		CompactInteger::from(self.len()).serialize(s);
		s.append_slice(self);
	}

	fn serialized_size(&self) -> usize {
		CompactInteger::from(self.len()).serialized_size() + self.len()
	}
}
