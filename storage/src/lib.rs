extern crate parking_lot;

mod block_index;
#[cfg(feature = "test-helpers")]
mod chain_builder;
mod store;

pub use crate::block_index::BlockIndex;
#[cfg(feature = "test-helpers")]
pub use crate::chain_builder::ChainBuilder;
pub use crate::store::{MemoryStore, SharedStore, Store};
