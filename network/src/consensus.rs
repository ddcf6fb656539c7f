use crate::deployments::{Deployment, DeploymentPos, MAX_VERSION_BITS_DEPLOYMENTS};
use crate::network::Network;
use crate::{BuriedDeployment, ALWAYS_ACTIVE, NEVER_ACTIVE, NO_TIMEOUT};
use bitcrypto::{FromStr, SHA256D};
use primitives::bytes::Bytes;
use primitives::compact::Compact;
use primitives::U256;

pub const COIN: u64 = 100_000_000;

/// Subsidy of the first block mined under the hard fork rules.
const FORK_TRANSITION_SUBSIDY: u64 = 2_000_000 * COIN;

/// Parameters of the scheduled hard fork.
#[derive(Debug, Clone)]
pub struct ForkParams {
	/// Last block governed by the legacy rules.
	pub block_height: u32,
	pub block_hash: SHA256D,
	/// Target block interval after the fork; zero inherits the legacy
	/// target spacing.
	pub block_interval: i64,
	/// Post-fork halving cadence, counted from the fork block.
	pub halving_interval: u32,
	/// Post-fork block size cap in weight units.
	pub max_block_size: u64,
	pub max_block_sigops_cost: i64,
	pub asert_anchor: Option<AsertAnchor>,
}

/// Reference block anchoring the post-fork difficulty schedule.
#[derive(Debug, Clone)]
pub struct AsertAnchor {
	pub height: u32,
	pub hash: SHA256D,
	pub bits: Compact,
}

#[derive(Debug, Clone)]
/// Parameters that influence chain consensus.
pub struct ConsensusParams {
	/// Network.
	pub network: Network,
	pub genesis_hash: SHA256D,
	pub subsidy_halving_interval: u32,
	/// Block height at which BIP34 becomes active.
	/// See https://github.com/bitcoin/bips/blob/master/bip-0034.mediawiki
	pub bip34_height: u32,
	/// Block height at which BIP65 becomes active.
	/// See https://github.com/bitcoin/bips/blob/master/bip-0065.mediawiki
	pub bip65_height: u32,
	/// Block height at which BIP66 becomes active.
	/// See https://github.com/bitcoin/bips/blob/master/bip-0066.mediawiki
	pub bip66_height: u32,
	/// Block height at which BIP68, BIP112 and BIP113 become active.
	pub csv_height: u32,
	/// Block height at which BIP141, BIP143 and BIP147 become active.
	pub segwit_height: u32,
	/// Version bits activation
	pub rule_change_activation_threshold: u32,
	/// Number of blocks with the same set of rules
	pub miner_confirmation_window: u32,
	pub deployments: [Deployment; MAX_VERSION_BITS_DEPLOYMENTS],

	/// Proof-of-work limit, as a 256-bit target.
	pub pow_limit: U256,
	pub allow_min_difficulty_blocks: bool,
	pub no_retargeting: bool,
	pub target_spacing: i64,
	pub target_timespan: i64,

	/// Scheduled hard fork; `None` keeps the legacy rules forever.
	pub fork: Option<ForkParams>,

	pub signet_challenge: Option<Bytes>,
}

impl ConsensusParams {
	pub fn new(network: Network) -> Self {
		let params = match network {
			Network::Mainnet => ConsensusParams {
				network,
				genesis_hash: SHA256D::from_str("000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f").unwrap(),
				subsidy_halving_interval: 210_000,
				bip34_height: 227_931, // 000000000000024b89b42a942fe0d9fea3bb44ab7bd1b19115dd6a759c0808b8
				bip65_height: 388_381, // 000000000000000004c2b624ed5d7756c508d90fd0da2c7c679febfa6c4735f0
				bip66_height: 363_725, // 00000000000000000379eaa19dce8c9b722d46ae6a57c2f1a988119488b50931
				csv_height: 419_328,   // 000000000000000004a1b34462cb8aeebd5799177f7a29cf28f2d1961716b5b5
				segwit_height: 481_824, // 0000000000000000001c8018d9cb3b742ef25114f27563e3fc4a1902167f9893
				rule_change_activation_threshold: 1916, // 95%
				miner_confirmation_window: 2016,
				deployments: [
					Deployment {
						name: "testdummy",
						bit: 28,
						start_time: NEVER_ACTIVE,
						timeout: NEVER_ACTIVE,
						min_activation_height: 0,
					},
					Deployment {
						name: "taproot",
						bit: 2,
						start_time: 1_619_222_400, // April 24th, 2021
						timeout: 1_628_640_000,    // August 11th, 2021
						min_activation_height: 709_632,
					},
				],
				pow_limit: U256::from(0xffffu64) << 208,
				allow_min_difficulty_blocks: false,
				no_retargeting: false,
				target_spacing: 600,
				target_timespan: 14 * 24 * 60 * 60, // two weeks
				fork: Some(ForkParams {
					block_height: 850_000,
					block_hash: SHA256D::from_str("00000000000000000002c0cbdf7b9eb9124444e6c56f117e9474b585f41b88b9").unwrap(),
					block_interval: 600,
					halving_interval: 210_000,
					max_block_size: 32_000_000,
					max_block_sigops_cost: 200_000,
					asert_anchor: Some(AsertAnchor {
						height: 850_000,
						hash: SHA256D::from_str("00000000000000000002c0cbdf7b9eb9124444e6c56f117e9474b585f41b88b9").unwrap(),
						bits: Compact::new(0x1703dd01),
					}),
				}),
				signet_challenge: None,
			},
			Network::Testnet => ConsensusParams {
				network,
				genesis_hash: SHA256D::from_str("000000000933ea01ad0ee984209779baaec3ced90fa3f408719526f8d77f4943").unwrap(),
				subsidy_halving_interval: 210_000,
				bip34_height: 21_111,  // 0000000023b3a96d3484e5abb3755c413e7d41500f8e2a5c3f0dd01299cd8ef8
				bip65_height: 581_885, // 00000000007f6655f22f98e72ed80d8b06dc761d5da09df0fa1dc4be4f861eb6
				bip66_height: 330_776, // 000000002104c8c45e99a8853285a3b592602a3ccde2b832481da85e9e4ba182
				csv_height: 770_112,   // 00000000025e930139bac5c6c31a403776da130831ab85be56578f3fa75369bb
				segwit_height: 834_624, // 00000000002b980fcd729daaa248fd9316a5200e9b367f4ff2c42453e84201ca
				rule_change_activation_threshold: 1512, // 75%
				miner_confirmation_window: 2016,
				deployments: [
					Deployment {
						name: "testdummy",
						bit: 28,
						start_time: NEVER_ACTIVE,
						timeout: NEVER_ACTIVE,
						min_activation_height: 0,
					},
					Deployment {
						name: "taproot",
						bit: 2,
						start_time: 1_619_222_400,
						timeout: 1_628_640_000,
						min_activation_height: 0,
					},
				],
				pow_limit: U256::from(0xffffu64) << 208,
				allow_min_difficulty_blocks: true,
				no_retargeting: false,
				target_spacing: 600,
				target_timespan: 14 * 24 * 60 * 60,
				fork: None,
				signet_challenge: None,
			},
			Network::Regtest => ConsensusParams {
				network,
				genesis_hash: SHA256D::from_str("0f9188f13cb7b2c71f2a335e3a4fc328bf5beb436012afca590b1a11466e2206").unwrap(),
				subsidy_halving_interval: 150,
				bip34_height: 100_000_000, // not activated on regtest
				bip65_height: 1351,
				bip66_height: 1251, // used only in rpc tests
				csv_height: 432,
				segwit_height: 0,
				rule_change_activation_threshold: 108, // 75%
				miner_confirmation_window: 144,
				deployments: [
					Deployment {
						name: "testdummy",
						bit: 28,
						start_time: 0,
						timeout: NO_TIMEOUT,
						min_activation_height: 0,
					},
					Deployment {
						name: "taproot",
						bit: 2,
						start_time: ALWAYS_ACTIVE,
						timeout: NO_TIMEOUT,
						min_activation_height: 0,
					},
				],
				pow_limit: U256::max_value() >> 1,
				allow_min_difficulty_blocks: true,
				no_retargeting: true,
				target_spacing: 600,
				target_timespan: 14 * 24 * 60 * 60,
				fork: None,
				signet_challenge: None,
			},
		};

		assert!(params.target_timespan > 0);
		assert!(params.target_spacing > 0);
		assert!(params.miner_confirmation_window > 0);
		assert!(params.rule_change_activation_threshold <= params.miner_confirmation_window);

		params
	}

	pub fn difficulty_adjustment_interval(&self) -> u32 {
		(self.target_timespan / self.target_spacing) as u32
	}

	/// Activation height of a buried deployment.
	pub fn deployment_height(&self, deployment: BuriedDeployment) -> u32 {
		match deployment {
			BuriedDeployment::HeightInCoinbase => self.bip34_height,
			BuriedDeployment::Cltv => self.bip65_height,
			BuriedDeployment::Dersig => self.bip66_height,
			BuriedDeployment::Csv => self.csv_height,
			BuriedDeployment::Segwit => self.segwit_height,
		}
	}

	pub fn deployment(&self, pos: DeploymentPos) -> &Deployment {
		&self.deployments[pos.index()]
	}

	/// Block generation is on demand when difficulty never retargets.
	pub fn mine_blocks_on_demand(&self) -> bool {
		self.no_retargeting
	}

	/// Whether the hard fork rules govern the given height.
	pub fn fork_active(&self, height: u32) -> bool {
		match self.fork {
			Some(ref fork) => height >= fork.block_height,
			None => false,
		}
	}

	/// Miner reward at the given height, fees excluded. The first block
	/// mined under the fork rules carries the transition subsidy.
	pub fn block_subsidy(&self, height: u32) -> u64 {
		if let Some(ref fork) = self.fork {
			if height > fork.block_height {
				if height == fork.block_height + 1 {
					return FORK_TRANSITION_SUBSIDY;
				}
				let halvings = (height - fork.block_height) / fork.halving_interval;
				if halvings >= 64 {
					return 0;
				}
				return (50 * COIN) >> halvings;
			}
		}

		let halvings = height / self.subsidy_halving_interval;
		if halvings >= 64 {
			return 0;
		}
		(50 * COIN) >> halvings
	}
}

impl Default for ConsensusParams {
	fn default() -> Self {
		ConsensusParams::new(Network::default())
	}
}
