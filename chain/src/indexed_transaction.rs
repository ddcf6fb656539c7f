use crate::transaction::Transaction;
use bitcrypto::SHA256D;
use std::{cmp, fmt};

#[derive(Clone)]
pub struct IndexedTransaction {
	pub hash: SHA256D,
	pub raw: Transaction,
}

impl fmt::Debug for IndexedTransaction {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.debug_struct("IndexedTransaction")
			.field("hash", &self.hash)
			.field("raw", &self.raw)
			.finish()
	}
}

impl IndexedTransaction {
	pub fn new(hash: SHA256D, transaction: Transaction) -> Self {
		IndexedTransaction { hash, raw: transaction }
	}

	/// Explicit conversion of the raw Transaction into IndexedTransaction.
	///
	/// Hashes the transaction contents.
	pub fn from_raw(transaction: Transaction) -> Self {
		let hash = transaction.hash();
		IndexedTransaction::new(hash, transaction)
	}
}

impl From<Transaction> for IndexedTransaction {
	fn from(transaction: Transaction) -> Self {
		IndexedTransaction::from_raw(transaction)
	}
}

impl cmp::PartialEq for IndexedTransaction {
	fn eq(&self, other: &Self) -> bool {
		self.hash == other.hash
	}
}
