use crate::constants::{LOCKTIME_THRESHOLD, SEQUENCE_FINAL, WITNESS_SCALE_FACTOR};
use crate::ser::{serialize, serialize_with_flags, Serializable, Stream, SERIALIZE_TRANSACTION_WITNESS};
use bitcrypto::{dhash256, SHA256D};
use primitives::bytes::Bytes;

/// Reference to the output of an earlier transaction.
#[derive(Debug, PartialEq, Eq, Clone, Hash)]
pub struct OutPoint {
	pub hash: SHA256D,
	pub index: u32,
}

impl Default for OutPoint {
	fn default() -> Self {
		OutPoint::null()
	}
}

impl OutPoint {
	pub fn null() -> Self {
		OutPoint {
			hash: SHA256D::default(),
			index: u32::max_value(),
		}
	}

	pub fn is_null(&self) -> bool {
		self.hash == SHA256D::default() && self.index == u32::max_value()
	}
}

#[derive(Debug, PartialEq, Clone, Default)]
pub struct TransactionInput {
	pub previous_output: OutPoint,
	pub script_sig: Bytes,
	pub sequence: u32,
	pub script_witness: Vec<Bytes>,
}

impl TransactionInput {
	pub fn coinbase(script_sig: Bytes) -> Self {
		TransactionInput {
			previous_output: OutPoint::null(),
			script_sig,
			sequence: SEQUENCE_FINAL,
			script_witness: Vec::new(),
		}
	}

	pub fn is_final(&self) -> bool {
		self.sequence == SEQUENCE_FINAL
	}

	pub fn has_witness(&self) -> bool {
		!self.script_witness.is_empty()
	}
}

#[derive(Debug, PartialEq, Clone, Default)]
pub struct TransactionOutput {
	pub value: u64,
	pub script_pubkey: Bytes,
}

#[derive(Debug, PartialEq, Clone, Default)]
pub struct Transaction {
	pub version: i32,
	pub inputs: Vec<TransactionInput>,
	pub outputs: Vec<TransactionOutput>,
	pub lock_time: u32,
}

impl Transaction {
	pub fn hash(&self) -> SHA256D {
		dhash256(&serialize(self))
	}

	pub fn witness_hash(&self) -> SHA256D {
		dhash256(&serialize_with_flags(self, SERIALIZE_TRANSACTION_WITNESS))
	}

	pub fn has_witness(&self) -> bool {
		self.inputs.iter().any(TransactionInput::has_witness)
	}

	pub fn is_coinbase(&self) -> bool {
		self.inputs.len() == 1 && self.inputs[0].previous_output.is_null()
	}

	/// Whether the transaction can be included in a block at the given
	/// height, with time-based locks judged against `block_time` (median
	/// time past of the previous block when BIP113 is in force).
	pub fn is_final_in_block(&self, block_height: u32, block_time: u32) -> bool {
		if self.lock_time == 0 {
			return true;
		}

		let max_lock_time = if self.lock_time < LOCKTIME_THRESHOLD {
			block_height
		} else {
			block_time
		};

		if self.lock_time < max_lock_time {
			return true;
		}

		self.inputs.iter().all(TransactionInput::is_final)
	}

	pub fn total_spends(&self) -> u64 {
		self.outputs.iter().map(|output| output.value).sum()
	}

	/// Serialized size without witness data.
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
}

impl Serializable for OutPoint {
	fn serialize(&self, stream: &mut Stream) {
		stream.append(&self.hash).append(&self.index);
	}

	fn serialized_size(&self) -> usize {
		36
	}
}

impl Serializable for TransactionInput {
	fn serialize(&self, stream: &mut Stream) {
		stream
			.append(&self.previous_output)
			.append(&self.script_sig)
			.append(&self.sequence);
	}

	fn serialized_size(&self) -> usize {
		self.previous_output.serialized_size() + self.script_sig.serialized_size() + 4
	}
}

impl Serializable for TransactionOutput {
	fn serialize(&self, stream: &mut Stream) {
		stream.append(&self.value).append(&self.script_pubkey);
	}

	fn serialized_size(&self) -> usize {
		8 + self.script_pubkey.serialized_size()
	}
}

impl Serializable for Transaction {
	fn serialize(&self, stream: &mut Stream) {
		let include_transaction_witness = stream.include_transaction_witness() && self.has_witness();
		if include_transaction_witness {
			stream
				.append(&self.version)
				// marker + flag
				.append(&0u8)
				.append(&1u8)
				.append_list(&self.inputs)
				.append_list(&self.outputs);
			for input in &self.inputs {
				stream.append_list(&input.script_witness);
			}
			stream.append(&self.lock_time);
		} else {
			stream
				.append(&self.version)
				.append_list(&self.inputs)
				.append_list(&self.outputs)
				.append(&self.lock_time);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::{OutPoint, Transaction, TransactionInput, TransactionOutput};
	use crate::constants::{LOCKTIME_THRESHOLD, SEQUENCE_FINAL};
	use crate::ser::{serialize, serialize_with_flags, SERIALIZE_TRANSACTION_WITNESS};

	fn simple_transaction() -> Transaction {
		Transaction {
			version: 1,
			inputs: vec![TransactionInput::coinbase(vec![0x51].into())],
			outputs: vec![TransactionOutput {
				value: 50,
				script_pubkey: vec![0x51].into(),
			}],
			lock_time: 0,
		}
	}

	#[test]
	fn test_transaction_serialized_shape() {
		let transaction = simple_transaction();
		let bytes = serialize(&transaction);
		// version + vin count + outpoint + script + sequence + vout count + value + script + lock_time
		assert_eq!(bytes.len(), 4 + 1 + 36 + 2 + 4 + 1 + 8 + 2 + 4);
		assert_eq!(transaction.size(), bytes.len());
	}

	#[test]
	fn test_witness_serialization_adds_marker_and_stacks() {
		let mut transaction = simple_transaction();
		transaction.inputs[0].script_witness = vec![vec![0u8; 32].into()];

		let stripped = serialize(&transaction);
		let full = serialize_with_flags(&transaction, SERIALIZE_TRANSACTION_WITNESS);

		// marker, flag, stack item count, stack item length prefix and body
		assert_eq!(full.len(), stripped.len() + 2 + 1 + 1 + 32);
		assert_eq!(full[4], 0x00);
		assert_eq!(full[5], 0x01);

		// weight counts the stripped portion four times
		assert_eq!(transaction.weight(), stripped.len() * 3 + full.len());
	}

	#[test]
	fn test_txid_ignores_witness() {
		let mut transaction = simple_transaction();
		let txid = transaction.hash();
		transaction.inputs[0].script_witness = vec![vec![0xab].into()];
		assert_eq!(transaction.hash(), txid);
		assert_ne!(transaction.witness_hash(), txid);
	}

	#[test]
	fn test_is_coinbase() {
		assert!(simple_transaction().is_coinbase());

		let mut spend = simple_transaction();
		spend.inputs[0].previous_output = OutPoint {
			hash: simple_transaction().hash(),
			index: 0,
		};
		assert!(!spend.is_coinbase());
	}

	#[test]
	fn test_is_final_in_block() {
		let mut transaction = simple_transaction();
		assert!(transaction.is_final_in_block(0, 0));

		// height lock
		transaction.lock_time = 100;
		transaction.inputs[0].sequence = 0;
		assert!(transaction.is_final_in_block(101, 0));
		assert!(!transaction.is_final_in_block(100, 0));

		// sequence-final override
		transaction.inputs[0].sequence = SEQUENCE_FINAL;
		assert!(transaction.is_final_in_block(100, 0));

		// time lock
		transaction.lock_time = LOCKTIME_THRESHOLD + 500;
		transaction.inputs[0].sequence = 0;
		assert!(transaction.is_final_in_block(0, LOCKTIME_THRESHOLD + 501));
		assert!(!transaction.is_final_in_block(0, LOCKTIME_THRESHOLD + 500));
	}
}
