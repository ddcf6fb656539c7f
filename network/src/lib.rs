extern crate bitcrypto;
extern crate primitives;

mod consensus;
mod deployments;
mod network;

pub use primitives::compact;

pub use crate::consensus::{AsertAnchor, ConsensusParams, ForkParams, COIN};
pub use crate::deployments::{
	BuriedDeployment, Deployment, DeploymentPos, ALWAYS_ACTIVE, MAX_VERSION_BITS_DEPLOYMENTS, NEVER_ACTIVE, NO_TIMEOUT,
	VERSION_BITS_DEPLOYMENTS,
};
pub use crate::network::Network;
