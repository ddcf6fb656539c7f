use bitcrypto::SHA256D;
use network::{AsertAnchor, ConsensusParams, ForkParams};
use primitives::compact::Compact;
use primitives::U256;
use storage::BlockIndex;

/// Returns the work required for the block following `prev`.
/// `new_block_time` is the timestamp of the block under construction; it
/// only matters on networks that allow min-difficulty blocks.
pub fn next_work_required(prev: &BlockIndex, new_block_time: u32, consensus: &ConsensusParams) -> Compact {
	let fork = match consensus.fork {
		Some(ref fork) => fork,
		None => return legacy_work_required(prev, new_block_time, consensus),
	};

	let next_height = prev.height + 1;
	if next_height <= fork.block_height {
		return legacy_work_required(prev, new_block_time, consensus);
	}

	// the first block mined under the fork rules restarts from the
	// easiest target, giving miners room to converge on the new schedule
	if next_height == fork.block_height + 1 {
		return Compact::from_u256(consensus.pow_limit);
	}

	match fork.asert_anchor {
		Some(ref anchor) => asert_work_required(prev, anchor, fork, consensus)
			.unwrap_or_else(|| legacy_work_required(prev, new_block_time, consensus)),
		None => legacy_work_required(prev, new_block_time, consensus),
	}
}

/// Pre-fork difficulty schedule: retarget every
/// `difficulty_adjustment_interval` blocks, inherit in between.
pub fn legacy_work_required(prev: &BlockIndex, new_block_time: u32, consensus: &ConsensusParams) -> Compact {
	if consensus.no_retargeting {
		return prev.bits;
	}

	let next_height = prev.height + 1;
	let interval = consensus.difficulty_adjustment_interval();
	if next_height % interval != 0 {
		if consensus.allow_min_difficulty_blocks {
			return min_difficulty_work_required(prev, new_block_time, consensus);
		}
		return prev.bits;
	}

	// go back by what we want to be the full retarget window
	let first = match prev.ancestor(next_height - interval) {
		Some(first) => first,
		None => return prev.bits,
	};

	calculate_next_work_required(prev, i64::from(first.time), consensus)
}

fn min_difficulty_work_required(prev: &BlockIndex, new_block_time: u32, consensus: &ConsensusParams) -> Compact {
	let limit_bits = Compact::from_u256(consensus.pow_limit);

	// a min-difficulty block may be mined once the chain stalls for twice
	// the target spacing
	if i64::from(new_block_time) > i64::from(prev.time) + consensus.target_spacing * 2 {
		return limit_bits;
	}

	// otherwise return the last non-min-difficulty bits in the window
	let interval = consensus.difficulty_adjustment_interval();
	let mut node = prev;
	while node.height % interval != 0 && node.bits == limit_bits {
		node = match node.prev.as_deref() {
			Some(prev) => prev,
			None => break,
		};
	}
	node.bits
}

/// Retarget at a window boundary: scale the previous target by the time
/// the window actually took, clamped to a factor of four either way.
pub fn calculate_next_work_required(prev: &BlockIndex, first_block_time: i64, consensus: &ConsensusParams) -> Compact {
	if consensus.no_retargeting {
		return prev.bits;
	}

	let target_timespan = consensus.target_timespan;
	let mut actual_timespan = i64::from(prev.time) - first_block_time;
	actual_timespan = actual_timespan.max(target_timespan / 4).min(target_timespan * 4);

	let prev_target = prev.bits.to_u256().unwrap_or_else(|target| target);
	let (wide, _) = prev_target.overflowing_mul(U256::from(actual_timespan as u64));
	let mut new_target = wide / U256::from(target_timespan as u64);

	if new_target > consensus.pow_limit {
		new_target = consensus.pow_limit;
	}

	Compact::from_u256(new_target)
}

/// Height- and time-anchored exponential retarget used after the fork.
/// Integer approximation of `target_ref * 2^(offset / T)`: shift by the
/// whole exponent, then apply a linear correction for the fractional part.
/// The approximation is consensus; it must not be replaced with the
/// canonical ASERT formula.
fn asert_work_required(
	prev: &BlockIndex,
	anchor: &AsertAnchor,
	fork: &ForkParams,
	consensus: &ConsensusParams,
) -> Option<Compact> {
	let anchor_block = match prev.ancestor(anchor.height) {
		Some(block) if block.hash == anchor.hash => block,
		_ => {
			warn!(
				target: "verification",
				"asert anchor not found or mismatched below height {}, falling back to legacy retarget",
				prev.height,
			);
			return None;
		}
	};

	let target_block_time = if fork.block_interval > 0 {
		fork.block_interval
	} else {
		consensus.target_spacing
	};
	if target_block_time <= 0 {
		return None;
	}

	let (target_ref, is_negative, is_overflow) = anchor.bits.to_u256_with_flags();
	if is_negative || is_overflow || target_ref.is_zero() {
		return None;
	}

	let time_diff = i64::from(prev.time) - i64::from(anchor_block.time);
	let height_diff = i64::from(prev.height) - i64::from(anchor_block.height);
	let offset = time_diff - height_diff * target_block_time;

	let exponent = (offset * 65536) / target_block_time;
	let shift = exponent.div_euclid(65536);
	let frac = exponent.rem_euclid(65536);

	let mut target = if shift >= 0 {
		target_ref << (shift as usize)
	} else {
		target_ref >> ((-shift) as usize)
	};

	let multiplier = 10_000 + (frac * 10_000) / 65_536;
	let (wide, _) = target.overflowing_mul(U256::from(multiplier as u64));
	target = wide / U256::from(10_000u64);

	if target > consensus.pow_limit {
		target = consensus.pow_limit;
	}

	Some(Compact::from_u256(target))
}

/// Whether `new_bits` is an acceptable successor of `old_bits` at the
/// given height. Headers-first sync uses this to reject nonsense
/// difficulty jumps before downloading block bodies.
pub fn permitted_difficulty_transition(consensus: &ConsensusParams, height: u32, old_bits: Compact, new_bits: Compact) -> bool {
	if consensus.allow_min_difficulty_blocks {
		return true;
	}

	// post-fork transitions are whatever the retarget function produced
	if let Some(ref fork) = consensus.fork {
		if height > fork.block_height {
			return true;
		}
	}

	let interval = consensus.difficulty_adjustment_interval();
	if height % interval == 0 {
		let timespan = consensus.target_timespan;
		if timespan <= 0 {
			return false;
		}
		let min_timespan = timespan / 4;
		let max_timespan = timespan * 4;

		let old_target = old_bits.to_u256().unwrap_or_else(|target| target);
		let observed_new_target = new_bits.to_u256().unwrap_or_else(|target| target);

		let (wide, _) = old_target.overflowing_mul(U256::from(max_timespan as u64));
		let mut largest_target = wide / U256::from(timespan as u64);
		if largest_target > consensus.pow_limit {
			largest_target = consensus.pow_limit;
		}
		if observed_new_target > largest_target {
			return false;
		}

		let (wide, _) = old_target.overflowing_mul(U256::from(min_timespan as u64));
		let mut smallest_target = wide / U256::from(timespan as u64);
		if smallest_target > consensus.pow_limit {
			smallest_target = consensus.pow_limit;
		}
		if observed_new_target < smallest_target {
			return false;
		}

		true
	} else {
		old_bits == new_bits
	}
}

/// Simple check that the hash clears the claimed difficulty.
pub fn is_valid_proof_of_work_hash(bits: Compact, hash: &SHA256D) -> bool {
	let target = match bits.to_u256() {
		Ok(target) => target,
		Err(_) => return false,
	};

	U256::from_little_endian(&hash[..]) <= target
}

/// Full proof-of-work check: the claimed difficulty must decode cleanly,
/// stay within the network's limit, and the hash must clear it.
pub fn check_proof_of_work(hash: &SHA256D, bits: Compact, consensus: &ConsensusParams) -> bool {
	let (target, is_negative, is_overflow) = bits.to_u256_with_flags();
	if is_negative || is_overflow || target.is_zero() || target > consensus.pow_limit {
		return false;
	}

	U256::from_little_endian(&hash[..]) <= target
}
