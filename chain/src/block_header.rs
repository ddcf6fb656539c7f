use crate::ser::{serialize, Serializable, Stream};
use bitcrypto::{dhash256, SHA256D};
use primitives::compact::Compact;

#[derive(Debug, PartialEq, Clone, Default)]
pub struct BlockHeader {
	pub version: i32,
	pub previous_header_hash: SHA256D,
	pub merkle_root_hash: SHA256D,
	pub time: u32,
	pub bits: Compact,
	pub nonce: u32,
}

impl BlockHeader {
	pub fn hash(&self) -> SHA256D {
		block_header_hash(self)
	}
}

impl Serializable for BlockHeader {
	fn serialize(&self, stream: &mut Stream) {
		stream
			.append(&self.version)
			.append(&self.previous_header_hash)
			.append(&self.merkle_root_hash)
			.append(&self.time)
			.append(&self.bits)
			.append(&self.nonce);
	}

	fn serialized_size(&self) -> usize {
		80
	}
}

/// Compute the hash of the serialized block header.
pub fn block_header_hash(header: &BlockHeader) -> SHA256D {
	dhash256(&serialize(header))
}
