/// Start time marking a deployment as active at every height.
pub const ALWAYS_ACTIVE: i64 = -1;
/// Start time marking a deployment as failed at every height.
pub const NEVER_ACTIVE: i64 = -2;
pub const NO_TIMEOUT: i64 = i64::max_value();

/// Versionbits (BIP9-style) deployments, one signalling slot each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentPos {
	TestDummy,
	Taproot,
}

pub const MAX_VERSION_BITS_DEPLOYMENTS: usize = 2;

pub const VERSION_BITS_DEPLOYMENTS: [DeploymentPos; MAX_VERSION_BITS_DEPLOYMENTS] = [DeploymentPos::TestDummy, DeploymentPos::Taproot];

impl DeploymentPos {
	pub fn index(self) -> usize {
		match self {
			DeploymentPos::TestDummy => 0,
			DeploymentPos::Taproot => 1,
		}
	}
}

/// Individual consensus rule change deployed with BIP9 signalling.
#[derive(Debug, Clone, Copy)]
pub struct Deployment {
	pub name: &'static str,
	/// Bit in the block version field used for signalling.
	pub bit: u8,
	pub start_time: i64,
	pub timeout: i64,
	/// Height before which the deployment cannot become active even once
	/// locked in.
	pub min_activation_height: u32,
}

impl Deployment {
	pub fn mask(&self) -> u32 {
		1u32 << self.bit
	}
}

/// Soft forks whose activation height has been hardcoded into the client
/// long after activation (BIP90 style burial).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuriedDeployment {
	/// BIP34, height in coinbase.
	HeightInCoinbase,
	/// BIP65, OP_CHECKLOCKTIMEVERIFY.
	Cltv,
	/// BIP66, strict DER signatures.
	Dersig,
	/// BIP68/112/113, relative lock times.
	Csv,
	/// BIP141/143/147.
	Segwit,
}
