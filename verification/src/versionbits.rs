use bitcrypto::SHA256D;
use network::{ConsensusParams, DeploymentPos, ALWAYS_ACTIVE, MAX_VERSION_BITS_DEPLOYMENTS, NEVER_ACTIVE, NO_TIMEOUT, VERSION_BITS_DEPLOYMENTS};
use parking_lot::Mutex;
use std::collections::HashMap;
use storage::BlockIndex;

/// What bits to set in version for versionbits blocks.
pub const VERSIONBITS_TOP_BITS: i32 = 0x2000_0000;
/// What bitmask determines whether versionbits is in use.
pub const VERSIONBITS_TOP_MASK: i32 = 0xE000_0000_u32 as i32;
/// Total bits available for versionbits.
pub const VERSIONBITS_NUM_BITS: u32 = 29;

/// BIP9 deploys a softfork in multiple stages. State transitions happen
/// at retarget period boundaries if conditions are met; in case of reorg,
/// transitions can go backward. Without a transition, state is inherited
/// between periods. All blocks of a period share the same state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdState {
	/// First state that each softfork starts out as. The genesis block is
	/// by definition in this state for each deployment.
	Defined,
	/// For blocks past the start time.
	Started,
	/// For at least one retarget period after the first period with
	/// Started blocks of which at least threshold have the associated bit
	/// set, until the min activation height is reached.
	LockedIn,
	/// For all blocks after the locked-in retarget period (final state).
	Active,
	/// For all blocks once the first retarget period after the timeout is
	/// hit, if lock-in didn't happen (final state).
	Failed,
}

/// Per-deployment state keyed by the hash of the last block of the
/// previous period. `None` stands in for the parent of genesis, so every
/// key satisfies `(height + 1) % period == 0` or is the null sentinel.
pub type ThresholdConditionCache = HashMap<Option<SHA256D>, ThresholdState>;

/// Display status of an in-progress softfork.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VersionBitsStatistics {
	/// Length of blocks of the signalling period.
	pub period: u32,
	/// Number of blocks with the version bit set required to activate.
	pub threshold: u32,
	/// Number of blocks elapsed since the beginning of the current period.
	pub elapsed: u32,
	/// Number of blocks with the version bit set in the current period.
	pub count: u32,
	/// False if there are not enough blocks left in this period to pass.
	pub possible: bool,
}

/// Everything the threshold machine needs to know about one condition.
pub trait ThresholdConditionChecker {
	fn condition(&self, index: &BlockIndex, consensus: &ConsensusParams) -> bool;
	fn begin_time(&self, consensus: &ConsensusParams) -> i64;
	fn end_time(&self, consensus: &ConsensusParams) -> i64;
	fn min_activation_height(&self, _consensus: &ConsensusParams) -> u32 {
		0
	}
	fn period(&self, consensus: &ConsensusParams) -> u32;
	fn threshold(&self, consensus: &ConsensusParams) -> u32;
}

/// Returns the state for the block built on top of `prev`, filling the
/// cache along the way. Cache entries are only written for period
/// boundary blocks, so recursion depth is one period per uncached window.
pub fn threshold_state<C>(
	checker: &C,
	prev: Option<&BlockIndex>,
	consensus: &ConsensusParams,
	cache: &mut ThresholdConditionCache,
) -> ThresholdState
where
	C: ThresholdConditionChecker,
{
	let period = checker.period(consensus);
	let threshold = checker.threshold(consensus);
	let min_activation_height = checker.min_activation_height(consensus);
	let start_time = checker.begin_time(consensus);
	let timeout = checker.end_time(consensus);

	if start_time == ALWAYS_ACTIVE {
		return ThresholdState::Active;
	}
	if start_time == NEVER_ACTIVE {
		return ThresholdState::Failed;
	}

	// walk back to the last block of the previous period
	let mut node = match prev {
		Some(prev) => {
			let into_period = (prev.height + 1) % period;
			if into_period > prev.height {
				None
			} else {
				prev.ancestor(prev.height - into_period)
			}
		}
		None => None,
	};

	let mut to_compute = Vec::new();
	let mut state = loop {
		let key = node.map(|index| index.hash);
		if let Some(state) = cache.get(&key) {
			break *state;
		}

		match node {
			None => {
				// the genesis block is by definition defined
				cache.insert(key, ThresholdState::Defined);
				break ThresholdState::Defined;
			}
			Some(index) => {
				if i64::from(index.median_time_past()) < start_time {
					// the earliest the deployment could possibly start
					cache.insert(key, ThresholdState::Defined);
					break ThresholdState::Defined;
				}
				to_compute.push(index);
				node = if index.height >= period {
					index.ancestor(index.height - period)
				} else {
					None
				};
			}
		}
	};

	// replay forward from the first known state
	while let Some(index) = to_compute.pop() {
		let mut next_state = state;
		match state {
			ThresholdState::Defined => {
				if i64::from(index.median_time_past()) >= timeout {
					next_state = ThresholdState::Failed;
				} else if i64::from(index.median_time_past()) >= start_time {
					next_state = ThresholdState::Started;
				}
			}
			ThresholdState::Started => {
				// tally the signalling blocks of the period ending here
				let mut count = 0;
				let mut walker = Some(index);
				for _ in 0..period {
					let block = walker.expect("a period boundary block has a full period of ancestors; qed");
					if checker.condition(block, consensus) {
						count += 1;
					}
					walker = block.prev.as_deref();
				}
				if count >= threshold {
					next_state = ThresholdState::LockedIn;
				} else if i64::from(index.median_time_past()) >= timeout {
					next_state = ThresholdState::Failed;
				}
			}
			ThresholdState::LockedIn => {
				if index.height + 1 >= min_activation_height {
					next_state = ThresholdState::Active;
				}
			}
			ThresholdState::Active | ThresholdState::Failed => {}
		}
		cache.insert(Some(index.hash), next_state);
		state = next_state;
	}

	state
}

/// Earliest height at which the current state of the deployment applies.
pub fn threshold_state_since_height<C>(
	checker: &C,
	prev: Option<&BlockIndex>,
	consensus: &ConsensusParams,
	cache: &mut ThresholdConditionCache,
) -> u32
where
	C: ThresholdConditionChecker,
{
	if checker.begin_time(consensus) == ALWAYS_ACTIVE {
		return 0;
	}

	let initial_state = threshold_state(checker, prev, consensus, cache);
	if initial_state == ThresholdState::Defined {
		return 0;
	}

	let period = checker.period(consensus);
	let mut boundary = match prev {
		Some(prev) => {
			let into_period = (prev.height + 1) % period;
			if into_period > prev.height {
				return 0;
			}
			match prev.ancestor(prev.height - into_period) {
				Some(boundary) => boundary,
				None => return 0,
			}
		}
		None => return 0,
	};

	loop {
		let previous_period_parent = if boundary.height >= period {
			boundary.ancestor(boundary.height - period)
		} else {
			None
		};
		match previous_period_parent {
			Some(parent) if threshold_state(checker, Some(parent), consensus, cache) == initial_state => {
				boundary = parent;
			}
			_ => break,
		}
	}

	boundary.height + 1
}

/// Statistics about the signalling period containing `index`.
pub fn statistics(index: Option<&BlockIndex>, consensus: &ConsensusParams, pos: DeploymentPos) -> VersionBitsStatistics {
	let checker = VersionBitsConditionChecker { pos };
	let mut stats = VersionBitsStatistics {
		period: checker.period(consensus),
		threshold: checker.threshold(consensus),
		..Default::default()
	};

	let index = match index {
		Some(index) => index,
		None => return stats,
	};

	stats.elapsed = (index.height + 1) % stats.period;

	let mut count = 0;
	let mut walker = Some(index);
	for _ in 0..stats.elapsed {
		let block = walker.expect("a block has as many ancestors as blocks elapsed in its period; qed");
		if checker.condition(block, consensus) {
			count += 1;
		}
		walker = block.prev.as_deref();
	}

	stats.count = count;
	stats.possible = (stats.period - stats.threshold) >= (stats.elapsed - count);
	stats
}

/// Signalling mask of the deployment: `1 << bit`.
pub fn mask(consensus: &ConsensusParams, pos: DeploymentPos) -> u32 {
	consensus.deployment(pos).mask()
}

struct VersionBitsConditionChecker {
	pos: DeploymentPos,
}

impl ThresholdConditionChecker for VersionBitsConditionChecker {
	fn condition(&self, index: &BlockIndex, consensus: &ConsensusParams) -> bool {
		(index.version & VERSIONBITS_TOP_MASK) == VERSIONBITS_TOP_BITS
			&& (index.version & consensus.deployment(self.pos).mask() as i32) != 0
	}

	fn begin_time(&self, consensus: &ConsensusParams) -> i64 {
		consensus.deployment(self.pos).start_time
	}

	fn end_time(&self, consensus: &ConsensusParams) -> i64 {
		consensus.deployment(self.pos).timeout
	}

	fn min_activation_height(&self, consensus: &ConsensusParams) -> u32 {
		consensus.deployment(self.pos).min_activation_height
	}

	fn period(&self, consensus: &ConsensusParams) -> u32 {
		consensus.miner_confirmation_window
	}

	fn threshold(&self, consensus: &ConsensusParams) -> u32 {
		consensus.rule_change_activation_threshold
	}
}

/// Detects blocks signalling a version bit no known deployment claims,
/// to surface a warning about soft forks this node does not understand.
pub struct WarningBitsConditionChecker {
	bit: u8,
}

impl WarningBitsConditionChecker {
	pub fn new(bit: u8) -> Self {
		WarningBitsConditionChecker { bit }
	}
}

impl ThresholdConditionChecker for WarningBitsConditionChecker {
	fn condition(&self, index: &BlockIndex, _consensus: &ConsensusParams) -> bool {
		(index.version & VERSIONBITS_TOP_MASK) == VERSIONBITS_TOP_BITS && (index.version >> self.bit) & 1 != 0
	}

	fn begin_time(&self, _consensus: &ConsensusParams) -> i64 {
		0
	}

	fn end_time(&self, _consensus: &ConsensusParams) -> i64 {
		NO_TIMEOUT
	}

	fn period(&self, consensus: &ConsensusParams) -> u32 {
		consensus.miner_confirmation_window
	}

	fn threshold(&self, consensus: &ConsensusParams) -> u32 {
		consensus.rule_change_activation_threshold
	}
}

/// Per-period state for each deployment, shared across threads. Readers
/// never observe partial fill: the recursion completes under the lock.
#[derive(Default)]
pub struct VersionBitsCache {
	caches: Mutex<[ThresholdConditionCache; MAX_VERSION_BITS_DEPLOYMENTS]>,
}

impl VersionBitsCache {
	pub fn new() -> Self {
		VersionBitsCache::default()
	}

	pub fn state(&self, prev: Option<&BlockIndex>, consensus: &ConsensusParams, pos: DeploymentPos) -> ThresholdState {
		let checker = VersionBitsConditionChecker { pos };
		let mut caches = self.caches.lock();
		threshold_state(&checker, prev, consensus, &mut caches[pos.index()])
	}

	pub fn state_since_height(&self, prev: Option<&BlockIndex>, consensus: &ConsensusParams, pos: DeploymentPos) -> u32 {
		let checker = VersionBitsConditionChecker { pos };
		let mut caches = self.caches.lock();
		threshold_state_since_height(&checker, prev, consensus, &mut caches[pos.index()])
	}

	/// Block version a miner should use on top of `prev`: the versionbits
	/// marker plus the signalling bit of every started or locked-in
	/// deployment.
	pub fn compute_block_version(&self, prev: Option<&BlockIndex>, consensus: &ConsensusParams) -> i32 {
		let mut version = VERSIONBITS_TOP_BITS;
		for pos in &VERSION_BITS_DEPLOYMENTS {
			let state = self.state(prev, consensus, *pos);
			if state == ThresholdState::Started || state == ThresholdState::LockedIn {
				version |= mask(consensus, *pos) as i32;
			}
		}
		version
	}

	/// Drops all cached states; used when parameters are reconfigured.
	pub fn clear(&self) {
		let mut caches = self.caches.lock();
		for cache in caches.iter_mut() {
			cache.clear();
		}
	}
}
