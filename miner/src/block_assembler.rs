use crate::block_template::BlockTemplate;
use crate::fee::FeeRate;
use crate::memory_pool::{AncestorScoreKey, Entry, MemoryPool};
use bitcrypto::{dhash256, SHA256D};
use chain::constants::{MAX_BLOCK_SIGOPS_COST, MAX_BLOCK_WEIGHT, MINIMUM_WITNESS_COMMITMENT, WITNESS_COMMITMENT_MARKER, WITNESS_SCALE_FACTOR};
use chain::script::{Builder, OP_0};
use chain::{legacy_sigop_count, Block, BlockHeader, Transaction, TransactionInput, TransactionOutput};
use network::{BuriedDeployment, ConsensusParams, Network};
use primitives::bytes::Bytes;
use primitives::compact::Compact;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use storage::{BlockIndex, Store};
use verification::{deployment_active_after, next_work_required, BlockValidationState, VersionBitsCache};

/// Weight available to transaction selection by default, leaving room
/// for the coinbase and commitment.
pub const DEFAULT_BLOCK_MAX_WEIGHT: u64 = 3_996_000;
/// Default floor on the package fee rate, in satoshis per kvB.
const DEFAULT_BLOCK_MIN_TX_FEE: i64 = 1000;
/// Block sigops allowance under the fork rules.
const FORK_BLOCK_SIGOPS_COST: i64 = 200_000;
/// Give up selection after this many consecutive package rejections once
/// the block is nearly full.
const MAX_CONSECUTIVE_FAILURES: usize = 1000;
/// Weight reserved up front for the coinbase transaction and commitment.
const COINBASE_RESERVED_WEIGHT: u64 = 4000;
/// Sigops reserved up front for the coinbase transaction.
const COINBASE_RESERVED_SIGOPS: i64 = 400;
/// Last-resort bits if even the pow limit encodes to zero.
const RECOVERY_BITS: u32 = 0x1d00ffff;

/// Assembler knobs, mirroring the node's mining configuration flags.
#[derive(Debug, Clone)]
pub struct Options {
	/// `-blockmaxweight`: weight ceiling for assembled blocks. Clamped to
	/// `[4000, hard cap]`; ignored on regtest, which always uses the
	/// full block weight.
	pub block_max_weight: u64,
	/// `-blockmintxfee`: minimum package fee rate worth including.
	pub block_min_fee_rate: FeeRate,
	/// `-blockversion`: version override, honoured only on networks that
	/// mine blocks on demand.
	pub block_version: Option<i32>,
	/// `-printpriority`: log fee rate and txid of selected transactions.
	pub print_priority: bool,
	/// Run the external validity check over the finished template.
	pub test_block_validity: bool,
}

impl Default for Options {
	fn default() -> Self {
		Options {
			block_max_weight: DEFAULT_BLOCK_MAX_WEIGHT,
			block_min_fee_rate: FeeRate::new(DEFAULT_BLOCK_MIN_TX_FEE),
			block_version: None,
			print_priority: false,
			test_block_validity: true,
		}
	}
}

#[derive(Debug, PartialEq)]
pub enum Error {
	/// The finished template failed the external validity check. The
	/// assembler built it, so this is an internal error, not a rejection.
	TestBlockValidity(String),
}

impl fmt::Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Error::TestBlockValidity(reason) => write!(f, "TestBlockValidity failed: {}", reason),
		}
	}
}

/// External full-validation hook run over finished templates.
pub trait BlockValidator {
	fn test_block_validity(&self, state: &mut BlockValidationState, block: &Block, prev: &BlockIndex) -> bool;
}

/// Scales the block weight cap with mempool pressure, within the
/// consensus hard cap. Regtest always gets the full block weight.
pub fn adaptive_max_block_weight(mempool_tx_count: usize, next_height: u32, consensus: &ConsensusParams) -> u64 {
	if consensus.network == Network::Regtest {
		return MAX_BLOCK_WEIGHT;
	}

	let hard_cap = block_weight_hard_cap(consensus);
	let post_fork = consensus.fork_active(next_height);
	let min_weight = hard_cap.min(if post_fork { 8_000_000 } else { 4_000_000 });
	let max_weight = hard_cap.min(32_000_000);

	if mempool_tx_count <= 1_000 {
		return min_weight;
	}
	if mempool_tx_count >= 100_000 {
		return max_weight;
	}

	let span = max_weight as i64 - min_weight as i64;
	let added = mempool_tx_count as i64 * span / 100_000;
	let result = min_weight as i64 + added;
	result.max(min_weight as i64).min(max_weight as i64) as u64
}

fn block_weight_hard_cap(consensus: &ConsensusParams) -> u64 {
	match consensus.fork {
		Some(ref fork) => MAX_BLOCK_WEIGHT.min(fork.max_block_size),
		None => MAX_BLOCK_WEIGHT,
	}
}

fn clamp_options(mut options: Options, consensus: &ConsensusParams) -> Options {
	if consensus.network == Network::Regtest {
		options.block_max_weight = MAX_BLOCK_WEIGHT;
		return options;
	}
	let hard_cap = block_weight_hard_cap(consensus);
	options.block_max_weight = options.block_max_weight.max(4000).min(hard_cap);
	options
}

/// Raises the header time to one past the previous block's median time
/// past, or the adjusted clock if later. Min-difficulty networks
/// re-derive the bits, since their rule depends on the timestamp.
/// Returns by how much the time moved.
pub fn update_time(header: &mut BlockHeader, consensus: &ConsensusParams, prev: &BlockIndex, adjusted_time: u32) -> i64 {
	let old_time = i64::from(header.time);
	let new_time = i64::from(prev.median_time_past() + 1).max(i64::from(adjusted_time));
	if old_time < new_time {
		header.time = new_time as u32;
	}
	if consensus.allow_min_difficulty_blocks {
		header.bits = next_work_required(prev, header.time, consensus);
	}
	new_time - old_time
}

/// Appends the witness commitment output to the block's coinbase and
/// installs the witness nonce, returning the raw commitment script.
/// Nothing happens (and nothing is returned) before segwit activation or
/// when a commitment is already present.
pub fn generate_coinbase_commitment(block: &mut Block, prev: &BlockIndex, consensus: &ConsensusParams) -> Bytes {
	if !deployment_active_after(Some(prev), consensus, BuriedDeployment::Segwit) {
		return Bytes::new();
	}
	if block.witness_commitment_index().is_some() {
		return Bytes::new();
	}

	let witness_nonce = [0u8; 32];
	let witness_root = block.witness_merkle_root();

	let mut commitment_preimage = [0u8; 64];
	commitment_preimage[0..32].copy_from_slice(&witness_root[..]);
	commitment_preimage[32..64].copy_from_slice(&witness_nonce);
	let commitment = dhash256(&commitment_preimage);

	let mut script = Vec::with_capacity(MINIMUM_WITNESS_COMMITMENT);
	script.extend_from_slice(&WITNESS_COMMITMENT_MARKER);
	script.extend_from_slice(&commitment[..]);
	let script: Bytes = script.into();

	let coinbase = &mut block.transactions[0];
	coinbase.inputs[0].script_witness = vec![witness_nonce.to_vec().into()];
	coinbase.outputs.push(TransactionOutput {
		value: 0,
		script_pubkey: script.clone(),
	});

	script
}

/// Refreshes the witness commitment and merkle root of a block whose
/// transaction set changed after assembly.
pub fn regenerate_commitments(block: &mut Block, store: &dyn Store, consensus: &ConsensusParams) {
	if let Some(index) = block.witness_commitment_index() {
		block.transactions[0].outputs.remove(index);
	}
	if let Some(prev) = store.block_index(&block.block_header.previous_header_hash) {
		generate_coinbase_commitment(block, &prev, consensus);
	}
	block.block_header.merkle_root_hash = block.merkle_root();
}

#[derive(Debug, Clone)]
struct ModifiedEntry {
	size_with_ancestors: u64,
	modified_fees_with_ancestors: i64,
	sigops_cost_with_ancestors: i64,
}

/// Mempool entries whose package score changed because some of their
/// ancestors made it into the block, indexed by the updated score.
#[derive(Default)]
struct ModifiedTxSet {
	entries: HashMap<SHA256D, ModifiedEntry>,
	order: BTreeSet<AncestorScoreKey>,
}

impl ModifiedTxSet {
	fn contains(&self, hash: &SHA256D) -> bool {
		self.entries.contains_key(hash)
	}

	fn best(&self) -> Option<(SHA256D, ModifiedEntry)> {
		self.order.iter().next().map(|key| (key.hash, self.entries[&key.hash].clone()))
	}

	fn remove(&mut self, hash: &SHA256D) {
		if let Some(entry) = self.entries.remove(hash) {
			self.order.remove(&AncestorScoreKey {
				modified_fees_with_ancestors: entry.modified_fees_with_ancestors,
				size_with_ancestors: entry.size_with_ancestors,
				hash: *hash,
			});
		}
	}

	/// Discounts a newly included ancestor from the descendant's package
	/// totals, creating the modified record on first touch.
	fn update_for_parent_inclusion(&mut self, descendant: &Entry, included: &Entry) {
		let hash = descendant.transaction.hash;
		let current = match self.entries.remove(&hash) {
			Some(entry) => {
				self.order.remove(&AncestorScoreKey {
					modified_fees_with_ancestors: entry.modified_fees_with_ancestors,
					size_with_ancestors: entry.size_with_ancestors,
					hash,
				});
				entry
			}
			None => ModifiedEntry {
				size_with_ancestors: descendant.size_with_ancestors,
				modified_fees_with_ancestors: descendant.modified_fees_with_ancestors,
				sigops_cost_with_ancestors: descendant.sigops_cost_with_ancestors,
			},
		};

		let updated = ModifiedEntry {
			size_with_ancestors: current.size_with_ancestors - included.size,
			modified_fees_with_ancestors: current.modified_fees_with_ancestors - included.modified_fee,
			sigops_cost_with_ancestors: current.sigops_cost_with_ancestors - included.sigops_cost,
		};
		self.order.insert(AncestorScoreKey {
			modified_fees_with_ancestors: updated.modified_fees_with_ancestors,
			size_with_ancestors: updated.size_with_ancestors,
			hash,
		});
		self.entries.insert(hash, updated);
	}
}

/// Running totals of the block under construction.
struct SelectionState {
	in_block: HashSet<SHA256D>,
	transactions: Vec<Transaction>,
	tx_fees: Vec<i64>,
	tx_sigops_cost: Vec<i64>,
	block_weight: u64,
	block_sigops: i64,
	fees: i64,
}

impl SelectionState {
	fn new() -> Self {
		SelectionState {
			in_block: HashSet::new(),
			transactions: Vec::new(),
			tx_fees: Vec::new(),
			tx_sigops_cost: Vec::new(),
			block_weight: COINBASE_RESERVED_WEIGHT,
			block_sigops: COINBASE_RESERVED_SIGOPS,
			fees: 0,
		}
	}
}

/// Builds block templates over a tip and a mempool snapshot. Both are
/// observed under the caller's locks; the assembler itself is pure CPU
/// work.
pub struct BlockAssembler<'a> {
	consensus: &'a ConsensusParams,
	versionbits: &'a VersionBitsCache,
	options: Options,
}

impl<'a> BlockAssembler<'a> {
	pub fn new(consensus: &'a ConsensusParams, versionbits: &'a VersionBitsCache, options: Options) -> Self {
		BlockAssembler {
			consensus,
			versionbits,
			options: clamp_options(options, consensus),
		}
	}

	pub fn options(&self) -> &Options {
		&self.options
	}

	/// Assembles a new block paying `script_pubkey`, on top of the
	/// store's current tip. `time` is the adjusted network clock.
	pub fn create_new_block(
		&self,
		store: &dyn Store,
		mempool: Option<&MemoryPool>,
		script_pubkey: &Bytes,
		time: u32,
		validator: Option<&dyn BlockValidator>,
	) -> Result<BlockTemplate, Error> {
		let tip = store.tip();
		let next_height = tip.height + 1;

		let mut version = self.versionbits.compute_block_version(Some(&*tip), self.consensus);
		if self.consensus.mine_blocks_on_demand() {
			if let Some(version_override) = self.options.block_version {
				version = version_override;
			}
		}

		let pool = match mempool {
			Some(pool) if !pool.is_empty() => pool,
			_ => {
				debug!(target: "miner", "empty mempool at height {}, returning coinbase-only template", next_height);
				return Ok(self.coinbase_only_template(&tip, next_height, version, script_pubkey, time));
			}
		};

		let sigops_limit = if self.consensus.fork_active(next_height) {
			FORK_BLOCK_SIGOPS_COST
		} else {
			MAX_BLOCK_SIGOPS_COST
		};
		let lock_time_cutoff = tip.median_time_past();

		let mut state = SelectionState::new();
		let (packages_selected, descendants_updated) =
			self.add_package_txs(&mut state, pool, next_height, lock_time_cutoff, sigops_limit);

		let mut coinbase = Transaction {
			version: 2,
			inputs: vec![TransactionInput::coinbase(
				Builder::default().push_num(i64::from(next_height)).push_opcode(OP_0).into_script(),
			)],
			outputs: vec![TransactionOutput {
				value: state.fees as u64 + self.consensus.block_subsidy(next_height),
				script_pubkey: script_pubkey.clone(),
			}],
			lock_time: 0,
		};
		coinbase.inputs[0].script_witness = vec![vec![0u8; 32].into()];

		let mut transactions = Vec::with_capacity(state.transactions.len() + 1);
		transactions.push(coinbase);
		transactions.extend(state.transactions);

		let mut block = Block::new(
			BlockHeader {
				version,
				previous_header_hash: tip.hash,
				merkle_root_hash: SHA256D::default(),
				time: 0,
				bits: Compact::default(),
				nonce: 0,
			},
			transactions,
		);

		let coinbase_commitment = generate_coinbase_commitment(&mut block, &tip, self.consensus);
		block.block_header.merkle_root_hash = block.merkle_root();

		update_time(&mut block.block_header, self.consensus, &tip, time);
		block.block_header.bits = self.work_required_with_recovery(&tip, block.block_header.time, next_height);
		block.block_header.nonce = 0;

		let mut tx_fees = Vec::with_capacity(state.tx_fees.len() + 1);
		tx_fees.push(-state.fees);
		tx_fees.extend(state.tx_fees);

		let coinbase_sigops = (WITNESS_SCALE_FACTOR * legacy_sigop_count(&block.transactions[0])) as i64;
		let mut tx_sigops_cost = Vec::with_capacity(state.tx_sigops_cost.len() + 1);
		tx_sigops_cost.push(coinbase_sigops);
		tx_sigops_cost.extend(state.tx_sigops_cost);

		info!(
			target: "miner",
			"created new block template: height {}, weight {}, txs {}, fees {}, sigops {}, {} packages, {} descendants updated",
			next_height,
			state.block_weight,
			block.transactions.len() - 1,
			state.fees,
			state.block_sigops,
			packages_selected,
			descendants_updated,
		);

		if self.options.test_block_validity {
			if let Some(validator) = validator {
				let mut validation_state = BlockValidationState::default();
				if !validator.test_block_validity(&mut validation_state, &block, &tip) {
					return Err(Error::TestBlockValidity(validation_state.to_string()));
				}
			}
		}

		Ok(BlockTemplate {
			block,
			tx_fees,
			tx_sigops_cost,
			coinbase_commitment,
		})
	}

	/// Fast path for an absent or empty mempool: a coinbase-only block.
	fn coinbase_only_template(
		&self,
		tip: &BlockIndex,
		next_height: u32,
		version: i32,
		script_pubkey: &Bytes,
		time: u32,
	) -> BlockTemplate {
		let mut coinbase = Transaction {
			version: 2,
			inputs: vec![TransactionInput::coinbase(
				Builder::default().push_num(i64::from(next_height)).push_opcode(OP_0).into_script(),
			)],
			outputs: vec![TransactionOutput {
				value: self.consensus.block_subsidy(next_height),
				script_pubkey: script_pubkey.clone(),
			}],
			lock_time: 0,
		};
		coinbase.inputs[0].script_witness = vec![vec![0u8; 32].into()];

		let mut block = Block::new(
			BlockHeader {
				version,
				previous_header_hash: tip.hash,
				merkle_root_hash: SHA256D::default(),
				time: tip.median_time_past() + 1,
				bits: Compact::default(),
				nonce: 0,
			},
			vec![coinbase],
		);

		update_time(&mut block.block_header, self.consensus, tip, time);
		block.block_header.bits = self.work_required_with_recovery(tip, block.block_header.time, next_height);

		let coinbase_commitment = generate_coinbase_commitment(&mut block, tip, self.consensus);
		block.block_header.merkle_root_hash = block.merkle_root();

		let coinbase_sigops = (WITNESS_SCALE_FACTOR * legacy_sigop_count(&block.transactions[0])) as i64;

		BlockTemplate {
			block,
			tx_fees: vec![0],
			tx_sigops_cost: vec![coinbase_sigops],
			coinbase_commitment,
		}
	}

	fn work_required_with_recovery(&self, prev: &BlockIndex, time: u32, next_height: u32) -> Compact {
		let bits = next_work_required(prev, time, self.consensus);
		if u32::from(bits) != 0 {
			return bits;
		}

		let clamp = Compact::from_u256(self.consensus.pow_limit);
		let recovered = if u32::from(clamp) != 0 { clamp } else { Compact::new(RECOVERY_BITS) };
		warn!(
			target: "miner",
			"template bits were zero at height {}, clamped to {:08x}",
			next_height,
			u32::from(recovered),
		);
		recovered
	}

	fn test_package(&self, state: &SelectionState, package_size: u64, package_sigops: i64, sigops_limit: i64) -> bool {
		if state.block_weight + WITNESS_SCALE_FACTOR as u64 * package_size >= self.options.block_max_weight {
			return false;
		}
		if state.block_sigops + package_sigops >= sigops_limit {
			return false;
		}
		true
	}

	fn add_to_block(&self, state: &mut SelectionState, entry: &Entry) {
		state.transactions.push(entry.transaction.raw.clone());
		state.tx_fees.push(entry.fee);
		state.tx_sigops_cost.push(entry.sigops_cost);
		state.block_weight += entry.weight;
		state.block_sigops += entry.sigops_cost;
		state.fees += entry.fee;
		state.in_block.insert(entry.transaction.hash);

		if self.options.print_priority {
			debug!(
				target: "miner",
				"fee rate {} txid {}",
				FeeRate::from_fee_and_size(entry.modified_fee, entry.size),
				entry.transaction.hash,
			);
		}
	}

	/// Greedy package selection: walk the pool in ancestor-score order,
	/// merging in a parallel stream of entries rescored after their
	/// ancestors entered the block.
	fn add_package_txs(
		&self,
		state: &mut SelectionState,
		pool: &MemoryPool,
		next_height: u32,
		lock_time_cutoff: u32,
		sigops_limit: i64,
	) -> (usize, usize) {
		let mut modified = ModifiedTxSet::default();
		let mut failed: HashSet<SHA256D> = HashSet::new();
		let mut consecutive_failures = 0usize;

		let pool_order: Vec<&Entry> = pool.iter_by_ancestor_score().collect();
		let mut pool_iter = pool_order.into_iter().peekable();

		let mut packages_selected = 0;
		let mut descendants_updated = 0;

		loop {
			// skip pool entries that are already handled or queued in the
			// modified stream, where their score is more current
			while let Some(entry) = pool_iter.peek() {
				let hash = &entry.transaction.hash;
				if state.in_block.contains(hash) || failed.contains(hash) || modified.contains(hash) {
					pool_iter.next();
				} else {
					break;
				}
			}

			let pool_candidate = pool_iter.peek().map(|entry| *entry);
			let modified_candidate = modified.best();

			let (hash, package_size, package_fees, package_sigops, from_modified) = match (pool_candidate, modified_candidate) {
				(None, None) => break,
				(Some(entry), None) => {
					pool_iter.next();
					(
						entry.transaction.hash,
						entry.size_with_ancestors,
						entry.modified_fees_with_ancestors,
						entry.sigops_cost_with_ancestors,
						false,
					)
				}
				(None, Some((hash, modified_entry))) => (
					hash,
					modified_entry.size_with_ancestors,
					modified_entry.modified_fees_with_ancestors,
					modified_entry.sigops_cost_with_ancestors,
					true,
				),
				(Some(entry), Some((hash, modified_entry))) => {
					// ties go to the modified stream
					let modified_score =
						modified_entry.modified_fees_with_ancestors as i128 * entry.size_with_ancestors as i128;
					let pool_score =
						entry.modified_fees_with_ancestors as i128 * modified_entry.size_with_ancestors as i128;
					if modified_score >= pool_score {
						(
							hash,
							modified_entry.size_with_ancestors,
							modified_entry.modified_fees_with_ancestors,
							modified_entry.sigops_cost_with_ancestors,
							true,
						)
					} else {
						pool_iter.next();
						(
							entry.transaction.hash,
							entry.size_with_ancestors,
							entry.modified_fees_with_ancestors,
							entry.sigops_cost_with_ancestors,
							false,
						)
					}
				}
			};

			// everything after this package scores even lower
			if package_fees < self.options.block_min_fee_rate.fee(package_size) {
				break;
			}

			if !self.test_package(state, package_size, package_sigops, sigops_limit) {
				if from_modified {
					modified.remove(&hash);
					failed.insert(hash);
				}
				consecutive_failures += 1;
				if consecutive_failures > MAX_CONSECUTIVE_FAILURES
					&& state.block_weight > self.options.block_max_weight - COINBASE_RESERVED_WEIGHT
				{
					break;
				}
				continue;
			}

			let entry = pool.entry(&hash).expect("candidates come from the pool; qed");
			let mut package: Vec<&Entry> = entry
				.ancestors
				.iter()
				.filter(|ancestor| !state.in_block.contains(*ancestor))
				.map(|ancestor| pool.entry(ancestor).expect("ancestor sets are closed over the pool; qed"))
				.collect();
			package.push(entry);

			// every package member must be final at the new height
			let all_final = package
				.iter()
				.all(|member| member.transaction.raw.is_final_in_block(next_height, lock_time_cutoff));
			if !all_final {
				if from_modified {
					modified.remove(&hash);
					failed.insert(hash);
				}
				continue;
			}

			consecutive_failures = 0;

			// parents first
			package.sort_by(|a, b| {
				a.ancestor_count()
					.cmp(&b.ancestor_count())
					.then_with(|| a.transaction.hash[..].cmp(&b.transaction.hash[..]))
			});

			for member in &package {
				self.add_to_block(state, member);
				modified.remove(&member.transaction.hash);
			}

			packages_selected += 1;
			descendants_updated += update_packages_for_added(pool, &package, &state.in_block, &mut modified);
		}

		(packages_selected, descendants_updated)
	}
}

/// Rescore the not-yet-included descendants of freshly added entries.
/// Returns how many descendant records were touched.
fn update_packages_for_added(
	pool: &MemoryPool,
	added: &[&Entry],
	in_block: &HashSet<SHA256D>,
	modified: &mut ModifiedTxSet,
) -> usize {
	let mut updated = 0;
	for added_entry in added {
		let mut descendants = HashSet::new();
		pool.calculate_descendants(&added_entry.transaction.hash, &mut descendants);
		for descendant in descendants {
			if in_block.contains(&descendant) {
				continue;
			}
			updated += 1;
			let base = pool.entry(&descendant).expect("descendants come from the pool; qed");
			modified.update_for_parent_inclusion(base, added_entry);
		}
	}
	updated
}

#[cfg(test)]
mod tests {
	use super::{adaptive_max_block_weight, regenerate_commitments, update_time, BlockAssembler, BlockValidator, Error, Options};
	use crate::fee::FeeRate;
	use crate::memory_pool::MemoryPool;
	use chain::constants::MAX_BLOCK_WEIGHT;
	use chain::{Block, IndexedTransaction, OutPoint, Transaction, TransactionInput, TransactionOutput};
	use network::{ConsensusParams, Network, COIN};
	use primitives::bytes::Bytes;
	use primitives::compact::Compact;
	use storage::{BlockIndex, ChainBuilder, MemoryStore, Store};
	use verification::{BlockValidationResult, BlockValidationState, VersionBitsCache, VERSIONBITS_TOP_BITS};

	fn store_of(bits: Compact, blocks: usize) -> MemoryStore {
		let mut chain = ChainBuilder::new(bits);
		let genesis = chain.add_block(1_000_000);
		let store = MemoryStore::new((*genesis).clone());
		for i in 1..blocks {
			store.insert(chain.add_block(1_000_000 + i as u32 * 600));
		}
		store
	}

	fn regtest_store(blocks: usize) -> MemoryStore {
		store_of(Compact::new(0x207fffff), blocks)
	}

	fn payout_script() -> Bytes {
		vec![0x51].into()
	}

	fn funding_tx(tag: u8) -> IndexedTransaction {
		Transaction {
			version: 1,
			inputs: vec![TransactionInput::coinbase(vec![tag].into())],
			outputs: vec![
				TransactionOutput {
					value: 1_000_000,
					script_pubkey: vec![0x51].into(),
				},
				TransactionOutput {
					value: 1_000_000,
					script_pubkey: vec![0x52].into(),
				},
			],
			lock_time: 0,
		}
		.into()
	}

	fn spend_output(parent: &IndexedTransaction, index: u32) -> IndexedTransaction {
		Transaction {
			version: 1,
			inputs: vec![TransactionInput {
				previous_output: OutPoint {
					hash: parent.hash,
					index,
				},
				script_sig: vec![0x51].into(),
				sequence: 0xffff_ffff,
				script_witness: Vec::new(),
			}],
			outputs: vec![TransactionOutput {
				value: 500_000,
				script_pubkey: vec![0x51].into(),
			}],
			lock_time: 0,
		}
		.into()
	}

	struct RejectingValidator;

	impl BlockValidator for RejectingValidator {
		fn test_block_validity(&self, state: &mut BlockValidationState, _block: &Block, _prev: &BlockIndex) -> bool {
			state.invalid(BlockValidationResult::Consensus, "bad-cb-amount", "")
		}
	}

	struct AcceptingValidator;

	impl BlockValidator for AcceptingValidator {
		fn test_block_validity(&self, _state: &mut BlockValidationState, _block: &Block, _prev: &BlockIndex) -> bool {
			true
		}
	}

	#[test]
	fn test_empty_mempool_template() {
		let consensus = ConsensusParams::new(Network::Regtest);
		let versionbits = VersionBitsCache::new();
		let store = regtest_store(10);
		let tip = store.tip();

		let assembler = BlockAssembler::new(&consensus, &versionbits, Options::default());
		let template = assembler
			.create_new_block(&store, None, &payout_script(), tip.time + 600, None)
			.unwrap();

		assert_eq!(template.block.transactions.len(), 1);
		let coinbase = &template.block.transactions[0];
		assert!(coinbase.is_coinbase());
		assert_eq!(coinbase.outputs[0].value, consensus.block_subsidy(10));
		assert_eq!(consensus.block_subsidy(10), 50 * COIN);
		// BIP34 height push followed by OP_0
		assert_eq!(&coinbase.inputs[0].script_sig[..], &[0x5a, 0x00]);
		assert_eq!(coinbase.inputs[0].script_witness.len(), 1);
		assert_eq!(coinbase.inputs[0].script_witness[0].len(), 32);

		// regtest buries segwit at genesis, so the commitment is present
		assert_eq!(template.block.witness_commitment_index(), Some(1));
		assert_eq!(template.coinbase_commitment.len(), 38);

		assert_eq!(template.tx_fees, vec![0]);
		assert_eq!(template.tx_sigops_cost.len(), 1);

		let header = &template.block.block_header;
		assert_eq!(header.previous_header_hash, tip.hash);
		assert_eq!(header.nonce, 0);
		// no retargeting on regtest
		assert_eq!(header.bits, tip.bits);
		assert_eq!(header.merkle_root_hash, template.block.merkle_root());
		assert!(header.time > tip.median_time_past());
		assert_eq!(header.version, VERSIONBITS_TOP_BITS);
	}

	#[test]
	fn test_package_selection_includes_parent_before_child() {
		let consensus = ConsensusParams::new(Network::Regtest);
		let versionbits = VersionBitsCache::new();
		let store = regtest_store(10);
		let tip = store.tip();

		let parent = funding_tx(1);
		let child = spend_output(&parent, 0);
		let mut pool = MemoryPool::new();
		pool.insert_verified(parent.clone(), 1000, 0);
		pool.insert_verified(child.clone(), 10, 0);

		let options = Options {
			block_min_fee_rate: FeeRate::new(0),
			..Default::default()
		};
		let assembler = BlockAssembler::new(&consensus, &versionbits, options);
		let template = assembler
			.create_new_block(&store, Some(&pool), &payout_script(), tip.time + 600, None)
			.unwrap();

		assert_eq!(template.block.transactions.len(), 3);
		assert_eq!(template.block.transactions[1].hash(), parent.hash);
		assert_eq!(template.block.transactions[2].hash(), child.hash);
		assert_eq!(template.tx_fees, vec![-1010, 1000, 10]);
		assert_eq!(template.block.transactions[0].total_spends(), consensus.block_subsidy(10) + 1010);
		assert!((template.block.weight() as u64) <= MAX_BLOCK_WEIGHT);
	}

	#[test]
	fn test_min_fee_rate_stops_selection() {
		let consensus = ConsensusParams::new(Network::Regtest);
		let versionbits = VersionBitsCache::new();
		let store = regtest_store(10);
		let tip = store.tip();

		let parent = funding_tx(1);
		let child = spend_output(&parent, 0);
		let mut pool = MemoryPool::new();
		pool.insert_verified(parent.clone(), 1000, 0);
		// once the parent is in the block, the child alone pays 10
		// satoshis for ~60 vbytes, below the default floor
		pool.insert_verified(child.clone(), 10, 0);

		let assembler = BlockAssembler::new(&consensus, &versionbits, Options::default());
		let template = assembler
			.create_new_block(&store, Some(&pool), &payout_script(), tip.time + 600, None)
			.unwrap();

		assert_eq!(template.block.transactions.len(), 2);
		assert_eq!(template.block.transactions[1].hash(), parent.hash);
		assert_eq!(template.tx_fees, vec![-1000, 1000]);
	}

	#[test]
	fn test_high_fee_child_pulls_parent_package() {
		let consensus = ConsensusParams::new(Network::Regtest);
		let versionbits = VersionBitsCache::new();
		let store = regtest_store(10);
		let tip = store.tip();

		let parent = funding_tx(1);
		let child1 = spend_output(&parent, 0);
		let child2 = spend_output(&parent, 1);
		let mut pool = MemoryPool::new();
		pool.insert_verified(parent.clone(), 10, 0);
		pool.insert_verified(child1.clone(), 50_000, 0);
		pool.insert_verified(child2.clone(), 20_000, 0);

		let options = Options {
			block_min_fee_rate: FeeRate::new(0),
			..Default::default()
		};
		let assembler = BlockAssembler::new(&consensus, &versionbits, options);
		let template = assembler
			.create_new_block(&store, Some(&pool), &payout_script(), tip.time + 600, None)
			.unwrap();

		// the best package is child1 + its cheap parent; child2 follows
		// through the modified stream once the parent is accounted for
		assert_eq!(template.block.transactions.len(), 4);
		assert_eq!(template.block.transactions[1].hash(), parent.hash);
		assert_eq!(template.block.transactions[2].hash(), child1.hash);
		assert_eq!(template.block.transactions[3].hash(), child2.hash);
		assert_eq!(template.tx_fees, vec![-70_010, 10, 50_000, 20_000]);
	}

	#[test]
	fn test_weight_limit_leaves_coinbase_only() {
		let consensus = ConsensusParams::new(Network::Testnet);
		let versionbits = VersionBitsCache::new();
		let store = store_of(Compact::new(0x1d00ffff), 10);
		let tip = store.tip();

		let mut pool = MemoryPool::new();
		pool.insert_verified(funding_tx(1), 10_000, 0);

		let options = Options {
			block_max_weight: 4000,
			block_min_fee_rate: FeeRate::new(0),
			..Default::default()
		};
		let assembler = BlockAssembler::new(&consensus, &versionbits, options);
		assert_eq!(assembler.options().block_max_weight, 4000);

		let template = assembler
			.create_new_block(&store, Some(&pool), &payout_script(), tip.time + 100, None)
			.unwrap();
		assert_eq!(template.block.transactions.len(), 1);
		assert_eq!(template.tx_fees, vec![0]);
	}

	fn forked_consensus(fork_height: u32) -> ConsensusParams {
		let mut consensus = ConsensusParams::new(Network::Mainnet);
		{
			let fork = consensus.fork.as_mut().unwrap();
			fork.block_height = fork_height;
			fork.asert_anchor = None;
		}
		consensus
	}

	#[test]
	fn test_sigops_limit_switches_at_fork() {
		let versionbits = VersionBitsCache::new();
		let store = store_of(Compact::new(0x1d00ffff), 10);
		let tip = store.tip();

		let mut pool = MemoryPool::new();
		// claimed sigops above the legacy cap, below the fork cap
		pool.insert_verified(funding_tx(1), 10_000, 100_000);

		let options = Options {
			block_min_fee_rate: FeeRate::new(0),
			..Default::default()
		};

		// next height 10 is pre-fork: rejected by the 80k cost cap
		let pre_fork = forked_consensus(1000);
		let assembler = BlockAssembler::new(&pre_fork, &versionbits, options.clone());
		let template = assembler
			.create_new_block(&store, Some(&pool), &payout_script(), tip.time + 600, None)
			.unwrap();
		assert_eq!(template.block.transactions.len(), 1);

		// next height 10 is post-fork: the 200k cost cap admits it
		let post_fork = forked_consensus(5);
		let assembler = BlockAssembler::new(&post_fork, &versionbits, options);
		let template = assembler
			.create_new_block(&store, Some(&pool), &payout_script(), tip.time + 600, None)
			.unwrap();
		assert_eq!(template.block.transactions.len(), 2);
		assert_eq!(template.tx_sigops_cost[1], 100_000);
	}

	#[test]
	fn test_nonfinal_transaction_excluded() {
		let consensus = ConsensusParams::new(Network::Regtest);
		let versionbits = VersionBitsCache::new();
		let store = regtest_store(10);
		let tip = store.tip();

		let mut nonfinal = funding_tx(1);
		nonfinal.raw.lock_time = 1_000_000;
		nonfinal.raw.inputs[0].sequence = 0;
		let nonfinal = IndexedTransaction::from_raw(nonfinal.raw);

		let mut pool = MemoryPool::new();
		pool.insert_verified(nonfinal, 10_000, 0);

		let options = Options {
			block_min_fee_rate: FeeRate::new(0),
			..Default::default()
		};
		let assembler = BlockAssembler::new(&consensus, &versionbits, options);
		let template = assembler
			.create_new_block(&store, Some(&pool), &payout_script(), tip.time + 600, None)
			.unwrap();
		assert_eq!(template.block.transactions.len(), 1);
	}

	#[test]
	fn test_block_version_override_is_mine_on_demand_only() {
		let versionbits = VersionBitsCache::new();

		// regtest mines on demand, so the override is honoured
		let regtest = ConsensusParams::new(Network::Regtest);
		let store = regtest_store(10);
		let tip = store.tip();
		let options = Options {
			block_version: Some(5),
			..Default::default()
		};
		let assembler = BlockAssembler::new(&regtest, &versionbits, options.clone());
		let template = assembler
			.create_new_block(&store, None, &payout_script(), tip.time + 600, None)
			.unwrap();
		assert_eq!(template.block.block_header.version, 5);

		// testnet ignores the override
		let testnet = ConsensusParams::new(Network::Testnet);
		let store = store_of(Compact::new(0x1d00ffff), 10);
		let tip = store.tip();
		let assembler = BlockAssembler::new(&testnet, &versionbits, options);
		let template = assembler
			.create_new_block(&store, None, &payout_script(), tip.time + 600, None)
			.unwrap();
		assert_eq!(template.block.block_header.version, VERSIONBITS_TOP_BITS);
	}

	#[test]
	fn test_validator_failure_is_an_error() {
		let consensus = ConsensusParams::new(Network::Regtest);
		let versionbits = VersionBitsCache::new();
		let store = regtest_store(10);
		let tip = store.tip();

		let mut pool = MemoryPool::new();
		pool.insert_verified(funding_tx(1), 10_000, 0);

		let assembler = BlockAssembler::new(&consensus, &versionbits, Options::default());
		let result = assembler.create_new_block(&store, Some(&pool), &payout_script(), tip.time + 600, Some(&RejectingValidator));
		assert_eq!(result.err(), Some(Error::TestBlockValidity("bad-cb-amount".to_owned())));

		let result = assembler.create_new_block(&store, Some(&pool), &payout_script(), tip.time + 600, Some(&AcceptingValidator));
		assert!(result.is_ok());
	}

	#[test]
	fn test_adaptive_max_block_weight() {
		// regtest is pinned to the full block weight
		let regtest = ConsensusParams::new(Network::Regtest);
		assert_eq!(adaptive_max_block_weight(0, 10, &regtest), MAX_BLOCK_WEIGHT);
		assert_eq!(adaptive_max_block_weight(1_000_000, 10, &regtest), MAX_BLOCK_WEIGHT);

		// with production parameters the interpolation window collapses
		// onto the consensus hard cap
		let mainnet = ConsensusParams::new(Network::Mainnet);
		for count in &[0usize, 1_000, 50_000, 100_000, 1_000_000] {
			assert_eq!(adaptive_max_block_weight(*count, 10, &mainnet), MAX_BLOCK_WEIGHT);
			assert_eq!(adaptive_max_block_weight(*count, 900_000, &mainnet), MAX_BLOCK_WEIGHT);
		}

		// a tighter fork size cap becomes the hard cap
		let mut small = ConsensusParams::new(Network::Mainnet);
		small.fork.as_mut().unwrap().max_block_size = 2_000_000;
		assert_eq!(adaptive_max_block_weight(50_000, 10, &small), 2_000_000);
	}

	#[test]
	fn test_option_clamping() {
		let versionbits = VersionBitsCache::new();

		let testnet = ConsensusParams::new(Network::Testnet);
		let assembler = BlockAssembler::new(
			&testnet,
			&versionbits,
			Options {
				block_max_weight: 100,
				..Default::default()
			},
		);
		assert_eq!(assembler.options().block_max_weight, 4000);

		let assembler = BlockAssembler::new(
			&testnet,
			&versionbits,
			Options {
				block_max_weight: 50_000_000,
				..Default::default()
			},
		);
		assert_eq!(assembler.options().block_max_weight, MAX_BLOCK_WEIGHT);

		// regtest ignores the option entirely
		let regtest = ConsensusParams::new(Network::Regtest);
		let assembler = BlockAssembler::new(
			&regtest,
			&versionbits,
			Options {
				block_max_weight: 10_000,
				..Default::default()
			},
		);
		assert_eq!(assembler.options().block_max_weight, MAX_BLOCK_WEIGHT);
	}

	#[test]
	fn test_update_time_raises_to_median_time_past() {
		let consensus = ConsensusParams::new(Network::Mainnet);
		let store = store_of(Compact::new(0x1d00ffff), 12);
		let tip = store.tip();

		let mut header = chain::BlockHeader::default();
		let delta = update_time(&mut header, &consensus, &tip, 0);
		assert_eq!(u64::from(header.time), u64::from(tip.median_time_past()) + 1);
		assert_eq!(delta, i64::from(header.time));

		// a header already ahead of the clock is left alone
		let far_future = tip.time + 1_000_000;
		let mut header = chain::BlockHeader::default();
		header.time = far_future;
		update_time(&mut header, &consensus, &tip, 0);
		assert_eq!(header.time, far_future);
	}

	#[test]
	fn test_regenerate_commitments() {
		let consensus = ConsensusParams::new(Network::Regtest);
		let versionbits = VersionBitsCache::new();
		let store = regtest_store(10);
		let tip = store.tip();

		let parent = funding_tx(1);
		let mut pool = MemoryPool::new();
		pool.insert_verified(parent.clone(), 10_000, 0);

		let options = Options {
			block_min_fee_rate: FeeRate::new(0),
			..Default::default()
		};
		let assembler = BlockAssembler::new(&consensus, &versionbits, options);
		let mut template = assembler
			.create_new_block(&store, Some(&pool), &payout_script(), tip.time + 600, None)
			.unwrap();
		let old_commitment = template.block.transactions[0].outputs[template.block.witness_commitment_index().unwrap()]
			.script_pubkey
			.clone();

		// graft another transaction in and refresh the commitments
		template.block.transactions.push(spend_output(&parent, 0).raw);
		regenerate_commitments(&mut template.block, &store, &consensus);

		assert_eq!(template.block.transactions[0].outputs.len(), 2);
		let index = template.block.witness_commitment_index().unwrap();
		assert_ne!(template.block.transactions[0].outputs[index].script_pubkey, old_commitment);
		assert_eq!(template.block.block_header.merkle_root_hash, template.block.merkle_root());
	}
}
