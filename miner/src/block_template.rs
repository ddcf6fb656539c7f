use chain::Block;
use primitives::bytes::Bytes;

/// A to-be-mined block produced by the assembler, with the
/// per-transaction bookkeeping mining RPCs surface alongside it.
pub struct BlockTemplate {
	pub block: Block,
	/// Fee of each transaction; the coinbase slot carries the negated
	/// total of the rest.
	pub tx_fees: Vec<i64>,
	/// Sigops cost of each transaction.
	pub tx_sigops_cost: Vec<i64>,
	/// Raw script bytes of the generated witness commitment output, empty
	/// when no commitment was generated.
	pub coinbase_commitment: Bytes,
}
