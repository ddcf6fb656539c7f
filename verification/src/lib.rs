#[macro_use]
extern crate log;

mod deployments;
mod validation_state;
mod versionbits;
mod work;

pub use crate::deployments::{deployment_active_after, deployment_active_at, versionbits_active_after};
pub use crate::validation_state::{
	BlockValidationResult, BlockValidationState, TxValidationResult, TxValidationState, ValidationState,
};
pub use crate::versionbits::{
	mask, statistics, threshold_state, threshold_state_since_height, ThresholdConditionCache, ThresholdConditionChecker,
	ThresholdState, VersionBitsCache, VersionBitsStatistics, WarningBitsConditionChecker, VERSIONBITS_NUM_BITS,
	VERSIONBITS_TOP_BITS, VERSIONBITS_TOP_MASK,
};
pub use crate::work::{
	calculate_next_work_required, check_proof_of_work, is_valid_proof_of_work_hash, legacy_work_required,
	next_work_required, permitted_difficulty_transition,
};
