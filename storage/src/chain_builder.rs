use crate::block_index::BlockIndex;
use bitcrypto::{dhash256, SHA256D};
use primitives::compact::Compact;
use std::sync::Arc;

/// Grows synthetic block index chains for tests. Heights, hashes and prev
/// links are derived automatically; timestamps, version and bits apply to
/// the blocks added after they are set.
pub struct ChainBuilder {
	tip: Option<Arc<BlockIndex>>,
	version: i32,
	bits: Compact,
}

impl ChainBuilder {
	pub fn new(bits: Compact) -> Self {
		ChainBuilder {
			tip: None,
			version: 0x2000_0000,
			bits,
		}
	}

	pub fn set_version(&mut self, version: i32) -> &mut Self {
		self.version = version;
		self
	}

	pub fn set_bits(&mut self, bits: Compact) -> &mut Self {
		self.bits = bits;
		self
	}

	pub fn tip(&self) -> Arc<BlockIndex> {
		self.tip.clone().expect("no blocks added yet")
	}

	pub fn add_block(&mut self, time: u32) -> Arc<BlockIndex> {
		let height = match self.tip {
			Some(ref tip) => tip.height + 1,
			None => 0,
		};
		let hash = self.synthetic_hash(height, time);
		let index = Arc::new(BlockIndex {
			hash,
			prev: self.tip.clone(),
			height,
			version: self.version,
			time,
			bits: self.bits,
		});
		self.tip = Some(index.clone());
		index
	}

	/// Appends `count` blocks, each `spacing` seconds after the previous.
	pub fn generate(&mut self, count: usize, spacing: u32) -> Arc<BlockIndex> {
		for _ in 0..count {
			let time = match self.tip {
				Some(ref tip) => tip.time + spacing,
				None => 0,
			};
			self.add_block(time);
		}
		self.tip()
	}

	fn synthetic_hash(&self, height: u32, time: u32) -> SHA256D {
		let mut preimage = Vec::with_capacity(40);
		if let Some(ref tip) = self.tip {
			preimage.extend_from_slice(&tip.hash[..]);
		}
		preimage.extend_from_slice(&height.to_le_bytes());
		preimage.extend_from_slice(&time.to_le_bytes());
		dhash256(&preimage)
	}
}
