extern crate byteorder;
extern crate rayon;

pub mod constants;
pub mod script;

mod block;
mod block_header;
mod indexed_transaction;
mod merkle_root;
mod ser;
mod transaction;

pub use primitives::{bytes, compact};

pub use crate::block::Block;
pub use crate::block_header::{block_header_hash, BlockHeader};
pub use crate::indexed_transaction::IndexedTransaction;
pub use crate::merkle_root::{merkle_node_hash, merkle_root};
pub use crate::script::{legacy_sigop_count, script_sigop_count, Builder};
pub use crate::ser::{serialize, serialize_with_flags, CompactInteger, Serializable, Stream, SERIALIZE_TRANSACTION_WITNESS};
pub use crate::transaction::{OutPoint, Transaction, TransactionInput, TransactionOutput};
