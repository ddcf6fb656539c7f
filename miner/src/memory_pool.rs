use bitcrypto::SHA256D;
use chain::constants::WITNESS_SCALE_FACTOR;
use chain::IndexedTransaction;
use std::cmp;
use std::collections::{BTreeSet, HashMap, HashSet};

/// Transaction stored in the pool together with its in-pool ancestry
/// aggregates, which the pool keeps current as entries come and go.
#[derive(Debug, Clone)]
pub struct Entry {
	pub transaction: IndexedTransaction,
	/// Fee actually carried by the transaction.
	pub fee: i64,
	/// Fee used for ordering; prioritisation may differ from `fee`.
	pub modified_fee: i64,
	/// Virtual size.
	pub size: u64,
	/// Weight in weight units.
	pub weight: u64,
	pub sigops_cost: i64,
	/// In-pool ancestors, closed under ancestry.
	pub ancestors: HashSet<SHA256D>,
	pub size_with_ancestors: u64,
	pub modified_fees_with_ancestors: i64,
	pub sigops_cost_with_ancestors: i64,
}

impl Entry {
	pub fn ancestor_count(&self) -> usize {
		self.ancestors.len()
	}
}

/// Key ranking entries by ancestor fee rate, best first. The fee rate
/// comparison cross-multiplies so no precision is lost; ties resolve to
/// the lower hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AncestorScoreKey {
	pub modified_fees_with_ancestors: i64,
	pub size_with_ancestors: u64,
	pub hash: SHA256D,
}

impl AncestorScoreKey {
	pub fn of(entry: &Entry) -> Self {
		AncestorScoreKey {
			modified_fees_with_ancestors: entry.modified_fees_with_ancestors,
			size_with_ancestors: entry.size_with_ancestors,
			hash: entry.transaction.hash,
		}
	}
}

impl Ord for AncestorScoreKey {
	fn cmp(&self, other: &Self) -> cmp::Ordering {
		let this = self.modified_fees_with_ancestors as i128 * other.size_with_ancestors as i128;
		let that = other.modified_fees_with_ancestors as i128 * self.size_with_ancestors as i128;
		that.cmp(&this).then_with(|| self.hash[..].cmp(&other.hash[..]))
	}
}

impl PartialOrd for AncestorScoreKey {
	fn partial_cmp(&self, other: &Self) -> Option<cmp::Ordering> {
		Some(self.cmp(other))
	}
}

/// Memory pool of verified transactions, indexed by txid and by ancestor
/// score. Admission policy, fee calculation and eviction live with the
/// mempool owner; the pool only maintains the ancestry aggregates the
/// assembler selects by. Parents must be inserted before their children.
#[derive(Default)]
pub struct MemoryPool {
	entries: HashMap<SHA256D, Entry>,
	order: BTreeSet<AncestorScoreKey>,
}

impl MemoryPool {
	pub fn new() -> Self {
		MemoryPool::default()
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn contains(&self, hash: &SHA256D) -> bool {
		self.entries.contains_key(hash)
	}

	pub fn entry(&self, hash: &SHA256D) -> Option<&Entry> {
		self.entries.get(hash)
	}

	/// Inserts an already-verified transaction. The ancestor set is the
	/// closure over the in-pool parents present at insertion time.
	pub fn insert_verified(&mut self, transaction: IndexedTransaction, fee: i64, sigops_cost: i64) {
		let weight = transaction.raw.weight() as u64;
		let size = (weight + WITNESS_SCALE_FACTOR as u64 - 1) / WITNESS_SCALE_FACTOR as u64;

		let mut ancestors = HashSet::new();
		for input in &transaction.raw.inputs {
			if let Some(parent) = self.entries.get(&input.previous_output.hash) {
				ancestors.insert(parent.transaction.hash);
				ancestors.extend(parent.ancestors.iter().cloned());
			}
		}

		let mut size_with_ancestors = size;
		let mut modified_fees_with_ancestors = fee;
		let mut sigops_cost_with_ancestors = sigops_cost;
		for ancestor_hash in &ancestors {
			let ancestor = &self.entries[ancestor_hash];
			size_with_ancestors += ancestor.size;
			modified_fees_with_ancestors += ancestor.modified_fee;
			sigops_cost_with_ancestors += ancestor.sigops_cost;
		}

		let entry = Entry {
			transaction,
			fee,
			modified_fee: fee,
			size,
			weight,
			sigops_cost,
			ancestors,
			size_with_ancestors,
			modified_fees_with_ancestors,
			sigops_cost_with_ancestors,
		};

		self.order.insert(AncestorScoreKey::of(&entry));
		self.entries.insert(entry.transaction.hash, entry);
	}

	/// Bumps the fee used for ordering without touching the transaction,
	/// rippling the change through every descendant package.
	pub fn prioritise(&mut self, hash: &SHA256D, fee_delta: i64) {
		if !self.entries.contains_key(hash) {
			return;
		}

		let mut affected = HashSet::new();
		affected.insert(*hash);
		self.calculate_descendants(hash, &mut affected);

		for affected_hash in affected {
			let (old_key, new_key) = {
				let entry = self.entries.get_mut(&affected_hash).expect("affected hashes come from the pool; qed");
				let old_key = AncestorScoreKey::of(entry);
				if affected_hash == *hash {
					entry.modified_fee += fee_delta;
				}
				entry.modified_fees_with_ancestors += fee_delta;
				(old_key, AncestorScoreKey::of(entry))
			};
			self.order.remove(&old_key);
			self.order.insert(new_key);
		}
	}

	/// Entries in descending ancestor score order.
	pub fn iter_by_ancestor_score(&self) -> impl Iterator<Item = &Entry> {
		self.order.iter().map(move |key| &self.entries[&key.hash])
	}

	/// Adds every in-pool descendant of `hash` to `descendants`.
	pub fn calculate_descendants(&self, hash: &SHA256D, descendants: &mut HashSet<SHA256D>) {
		for (entry_hash, entry) in &self.entries {
			if entry.ancestors.contains(hash) {
				descendants.insert(*entry_hash);
			}
		}
	}
}
