use bitcrypto::{dhash256, SHA256D};
use rayon::prelude::{IntoParallelRefIterator, ParallelIterator};

#[inline]
fn concat(a: &SHA256D, b: &SHA256D) -> [u8; 64] {
	let mut result = [0; 64];
	result[0..32].copy_from_slice(&a[..]);
	result[32..64].copy_from_slice(&b[..]);
	result
}

/// Calculate merkle tree node hash
pub fn merkle_node_hash(left: &SHA256D, right: &SHA256D) -> SHA256D {
	dhash256(&concat(left, right))
}

/// Calculates the root of the merkle tree
/// https://en.bitcoin.it/wiki/Protocol_documentation#Merkle_Trees
pub fn merkle_root(hashes: &[SHA256D]) -> SHA256D {
	if hashes.is_empty() {
		return SHA256D::default();
	}

	let mut row = hashes.to_vec();
	while row.len() > 1 {
		// duplicate the last element if len is not even
		if row.len() % 2 == 1 {
			let last = row[row.len() - 1];
			row.push(last);
		}

		let pairs: Vec<_> = row.chunks(2).map(|pair| (pair[0], pair[1])).collect();
		// only compute in parallel if there is enough work to benefit from it
		row = if pairs.len() > 250 {
			pairs.par_iter().map(|(left, right)| merkle_node_hash(left, right)).collect()
		} else {
			pairs.iter().map(|(left, right)| merkle_node_hash(left, right)).collect()
		};
	}
	row[0]
}
