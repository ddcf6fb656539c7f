#[macro_use]
extern crate log;

mod block_assembler;
mod block_template;
mod fee;
mod memory_pool;

pub use crate::block_assembler::{
	adaptive_max_block_weight, generate_coinbase_commitment, regenerate_commitments, update_time, BlockAssembler,
	BlockValidator, Error, Options, DEFAULT_BLOCK_MAX_WEIGHT,
};
pub use crate::block_template::BlockTemplate;
pub use crate::fee::FeeRate;
pub use crate::memory_pool::{Entry, MemoryPool};
