use bitcrypto::SHA256D;
use primitives::compact::Compact;
use std::sync::Arc;

/// Node of the in-memory block tree. Nodes are immutable once linked in;
/// `prev` references chain every node back to genesis. The chain machinery
/// owns the nodes, the consensus core only takes read handles.
#[derive(Debug, Clone)]
pub struct BlockIndex {
	pub hash: SHA256D,
	pub prev: Option<Arc<BlockIndex>>,
	pub height: u32,
	pub version: i32,
	pub time: u32,
	pub bits: Compact,
}

impl BlockIndex {
	/// Ancestor of this node at the given height, following `prev` links.
	pub fn ancestor(&self, height: u32) -> Option<&BlockIndex> {
		if height > self.height {
			return None;
		}
		let mut node = self;
		while node.height > height {
			node = node.prev.as_deref()?;
		}
		Some(node)
	}

	/// Median of the timestamps of the last 11 blocks ending here (BIP113).
	pub fn median_time_past(&self) -> u32 {
		let mut times = Vec::with_capacity(11);
		let mut node = Some(self);
		while let Some(index) = node {
			times.push(index.time);
			if times.len() == 11 {
				break;
			}
			node = index.prev.as_deref();
		}
		times.sort_unstable();
		times[times.len() / 2]
	}
}

#[cfg(test)]
mod tests {
	use super::BlockIndex;
	use bitcrypto::dhash256;
	use primitives::compact::Compact;
	use std::sync::Arc;

	fn chain_of_times(times: &[u32]) -> Arc<BlockIndex> {
		let mut prev: Option<Arc<BlockIndex>> = None;
		for (height, time) in times.iter().enumerate() {
			let hash = dhash256(&(height as u32).to_le_bytes());
			prev = Some(Arc::new(BlockIndex {
				hash,
				prev: prev.take(),
				height: height as u32,
				version: 1,
				time: *time,
				bits: Compact::new(0x207fffff),
			}));
		}
		prev.unwrap()
	}

	#[test]
	fn test_ancestor_walk() {
		let tip = chain_of_times(&[0, 10, 20, 30, 40]);
		assert_eq!(tip.ancestor(4).unwrap().hash, tip.hash);
		assert_eq!(tip.ancestor(0).unwrap().time, 0);
		assert_eq!(tip.ancestor(2).unwrap().time, 20);
		assert!(tip.ancestor(5).is_none());
	}

	#[test]
	fn test_median_time_past_short_chain() {
		let tip = chain_of_times(&[0, 10, 20]);
		// sorted [0, 10, 20], median at index 1
		assert_eq!(tip.median_time_past(), 10);

		let tip = chain_of_times(&[0, 10]);
		// sorted [0, 10], median at index 1
		assert_eq!(tip.median_time_past(), 10);
	}

	#[test]
	fn test_median_time_past_window_is_eleven() {
		let times: Vec<u32> = (0..20).map(|i| i * 100).collect();
		let tip = chain_of_times(&times);
		// only the last 11 timestamps participate: 900..=1900, median 1400
		assert_eq!(tip.median_time_past(), 1400);
	}

	#[test]
	fn test_median_time_past_handles_out_of_order_times() {
		let tip = chain_of_times(&[100, 90, 110]);
		assert_eq!(tip.median_time_past(), 100);
	}
}
