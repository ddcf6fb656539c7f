use crate::versionbits::{ThresholdState, VersionBitsCache};
use network::{BuriedDeployment, ConsensusParams, DeploymentPos};
use storage::BlockIndex;

/// Whether the buried deployment is enforced for the block following `prev`.
pub fn deployment_active_after(prev: Option<&BlockIndex>, consensus: &ConsensusParams, deployment: BuriedDeployment) -> bool {
	let next_height = match prev {
		Some(prev) => prev.height + 1,
		None => 0,
	};
	next_height >= consensus.deployment_height(deployment)
}

/// Whether the buried deployment is enforced at the block itself.
pub fn deployment_active_at(index: &BlockIndex, consensus: &ConsensusParams, deployment: BuriedDeployment) -> bool {
	index.height >= consensus.deployment_height(deployment)
}

/// Whether the versionbits deployment is active for the block following
/// `prev`.
pub fn versionbits_active_after(
	cache: &VersionBitsCache,
	prev: Option<&BlockIndex>,
	consensus: &ConsensusParams,
	pos: DeploymentPos,
) -> bool {
	cache.state(prev, consensus, pos) == ThresholdState::Active
}
