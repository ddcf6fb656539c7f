use crate::block_header::BlockHeader;
use crate::constants::{MINIMUM_WITNESS_COMMITMENT, WITNESS_COMMITMENT_MARKER, WITNESS_SCALE_FACTOR};
use crate::merkle_root::merkle_root;
use crate::ser::{Serializable, Stream, SERIALIZE_TRANSACTION_WITNESS};
use crate::transaction::Transaction;
use bitcrypto::SHA256D;

#[derive(Debug, PartialEq, Clone, Default)]
pub struct Block {
	pub block_header: BlockHeader,
	pub transactions: Vec<Transaction>,
}

impl Block {
	pub fn new(header: BlockHeader, transactions: Vec<Transaction>) -> Self {
		Block {
			block_header: header,
			transactions,
		}
	}

	pub fn hash(&self) -> SHA256D {
		self.block_header.hash()
	}

	/// Returns block's merkle root.
	pub fn merkle_root(&self) -> SHA256D {
		let hashes = self.transactions.iter().map(Transaction::hash).collect::<Vec<SHA256D>>();
		merkle_root(&hashes)
	}

	/// Returns block's witness merkle root. The coinbase slot is the zero
	/// hash; its real witness hash is committed through the witness nonce.
	pub fn witness_merkle_root(&self) -> SHA256D {
		let hashes = match self.transactions.split_first() {
			None => Vec::new(),
			Some((_, rest)) => {
				let mut hashes = vec![SHA256D::default()];
				hashes.extend(rest.iter().map(Transaction::witness_hash));
				hashes
			}
		};
		merkle_root(&hashes)
	}

	pub fn size(&self) -> usize {
		self.serialized_size()
	}

	pub fn size_with_witness(&self) -> usize {
		self.serialized_size_with_flags(SERIALIZE_TRANSACTION_WITNESS)
	}

	/// `stripped_size * 3 + total_size`
	pub fn weight(&self) -> usize {
		self.size() * (WITNESS_SCALE_FACTOR - 1) + self.size_with_witness()
	}

	/// Index of the coinbase output carrying the witness commitment. When
	/// several outputs match the marker, the last one wins.
	pub fn witness_commitment_index(&self) -> Option<usize> {
		let coinbase = self.transactions.first()?;
		let mut commitment_index = None;
		for (index, output) in coinbase.outputs.iter().enumerate() {
			let script = &output.script_pubkey;
			if script.len() >= MINIMUM_WITNESS_COMMITMENT && script[..6] == WITNESS_COMMITMENT_MARKER {
				commitment_index = Some(index);
			}
		}
		commitment_index
	}

	pub fn is_final(&self, height: u32) -> bool {
		self.transactions
			.iter()
			.all(|tx| tx.is_final_in_block(height, self.block_header.time))
	}
}

impl Serializable for Block {
	fn serialize(&self, stream: &mut Stream) {
		stream.append(&self.block_header).append_list(&self.transactions);
	}
}

#[cfg(test)]
mod tests {
	use super::Block;
	use crate::block_header::BlockHeader;
	use crate::constants::MINIMUM_WITNESS_COMMITMENT;
	use crate::transaction::{Transaction, TransactionInput, TransactionOutput};

	fn coinbase_with_outputs(outputs: Vec<TransactionOutput>) -> Transaction {
		Transaction {
			version: 1,
			inputs: vec![TransactionInput::coinbase(vec![0x51].into())],
			outputs,
			lock_time: 0,
		}
	}

	fn commitment_output() -> TransactionOutput {
		let mut script = vec![0x6a, 0x24, 0xaa, 0x21, 0xa9, 0xed];
		script.extend_from_slice(&[0u8; 32]);
		assert_eq!(script.len(), MINIMUM_WITNESS_COMMITMENT);
		TransactionOutput {
			value: 0,
			script_pubkey: script.into(),
		}
	}

	#[test]
	fn test_block_weight() {
		let block = Block::new(
			BlockHeader::default(),
			vec![coinbase_with_outputs(vec![TransactionOutput::default()])],
		);
		assert_eq!(block.weight(), block.size() * 3 + block.size_with_witness());
	}

	#[test]
	fn test_witness_commitment_index_picks_last_match() {
		let mut block = Block::new(
			BlockHeader::default(),
			vec![coinbase_with_outputs(vec![
				commitment_output(),
				TransactionOutput::default(),
				commitment_output(),
			])],
		);
		assert_eq!(block.witness_commitment_index(), Some(2));

		block.transactions[0].outputs.truncate(2);
		assert_eq!(block.witness_commitment_index(), Some(0));
	}

	#[test]
	fn test_witness_commitment_index_requires_minimum_size() {
		let short = TransactionOutput {
			value: 0,
			script_pubkey: vec![0x6a, 0x24, 0xaa, 0x21, 0xa9, 0xed].into(),
		};
		let block = Block::new(BlockHeader::default(), vec![coinbase_with_outputs(vec![short])]);
		assert_eq!(block.witness_commitment_index(), None);
	}

	#[test]
	fn test_witness_commitment_index_without_transactions() {
		let block = Block::new(BlockHeader::default(), Vec::new());
		assert_eq!(block.witness_commitment_index(), None);
	}

	#[test]
	fn test_merkle_root_of_single_coinbase() {
		let coinbase = coinbase_with_outputs(vec![TransactionOutput::default()]);
		let expected = coinbase.hash();
		let block = Block::new(BlockHeader::default(), vec![coinbase]);
		assert_eq!(block.merkle_root(), expected);
	}

	#[test]
	fn test_block_finality_follows_transactions() {
		let mut locked = coinbase_with_outputs(vec![TransactionOutput::default()]);
		locked.lock_time = 100;
		locked.inputs[0].sequence = 0;

		let block = Block::new(BlockHeader::default(), vec![locked]);
		assert!(block.is_final(101));
		assert!(!block.is_final(100));
	}
}
