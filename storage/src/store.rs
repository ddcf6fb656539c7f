use crate::block_index::BlockIndex;
use bitcrypto::SHA256D;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Read access to the best chain and the block tree. The chain machinery
/// owns the nodes; the consensus core only reads them while holding the
/// chain lock.
pub trait Store: Send + Sync {
	/// Best block of the currently-best chain.
	fn tip(&self) -> Arc<BlockIndex>;

	/// Resolves a block tree node by block hash.
	fn block_index(&self, hash: &SHA256D) -> Option<Arc<BlockIndex>>;
}

pub type SharedStore = Arc<dyn Store>;

/// Block tree kept entirely in memory. The best chain is the highest
/// inserted node; ties keep the earlier tip.
pub struct MemoryStore {
	inner: RwLock<MemoryStoreInner>,
}

struct MemoryStoreInner {
	by_hash: HashMap<SHA256D, Arc<BlockIndex>>,
	best: Arc<BlockIndex>,
}

impl MemoryStore {
	pub fn new(genesis: BlockIndex) -> Self {
		let genesis = Arc::new(genesis);
		let mut by_hash = HashMap::new();
		by_hash.insert(genesis.hash, genesis.clone());
		MemoryStore {
			inner: RwLock::new(MemoryStoreInner { by_hash, best: genesis }),
		}
	}

	pub fn insert(&self, index: Arc<BlockIndex>) -> Arc<BlockIndex> {
		let mut inner = self.inner.write();
		inner.by_hash.insert(index.hash, index.clone());
		if index.height > inner.best.height {
			inner.best = index.clone();
		}
		index
	}
}

impl Store for MemoryStore {
	fn tip(&self) -> Arc<BlockIndex> {
		self.inner.read().best.clone()
	}

	fn block_index(&self, hash: &SHA256D) -> Option<Arc<BlockIndex>> {
		self.inner.read().by_hash.get(hash).cloned()
	}
}

#[cfg(test)]
mod tests {
	use super::{MemoryStore, Store};
	use crate::block_index::BlockIndex;
	use bitcrypto::dhash256;
	use primitives::compact::Compact;
	use std::sync::Arc;

	fn block_index(height: u32, prev: Option<Arc<BlockIndex>>) -> BlockIndex {
		BlockIndex {
			hash: dhash256(&height.to_le_bytes()),
			prev,
			height,
			version: 1,
			time: height * 600,
			bits: Compact::new(0x207fffff),
		}
	}

	#[test]
	fn test_memory_store_tracks_best_block() {
		let store = MemoryStore::new(block_index(0, None));
		let genesis = store.tip();
		assert_eq!(genesis.height, 0);

		let block1 = store.insert(Arc::new(block_index(1, Some(genesis.clone()))));
		assert_eq!(store.tip().hash, block1.hash);
		assert_eq!(store.block_index(&genesis.hash).unwrap().height, 0);
		assert!(store.block_index(&dhash256(b"unknown")).is_none());
	}
}
