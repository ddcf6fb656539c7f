use network::COIN;
use std::fmt;

/// Fee rate in satoshis per 1000 virtual bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct FeeRate {
	satoshis_per_kilobyte: i64,
}

impl FeeRate {
	pub fn new(satoshis_per_kilobyte: i64) -> Self {
		FeeRate { satoshis_per_kilobyte }
	}

	/// Rate implied by paying `fee` for `size` virtual bytes.
	pub fn from_fee_and_size(fee: i64, size: u64) -> Self {
		if size == 0 {
			return FeeRate::default();
		}
		FeeRate {
			satoshis_per_kilobyte: fee * 1000 / size as i64,
		}
	}

	/// Fee owed by `size` virtual bytes at this rate. A positive rate
	/// never rounds down to a zero fee.
	pub fn fee(&self, size: u64) -> i64 {
		let mut fee = self.satoshis_per_kilobyte * size as i64 / 1000;
		if fee == 0 && size != 0 {
			if self.satoshis_per_kilobyte > 0 {
				fee = 1;
			}
			if self.satoshis_per_kilobyte < 0 {
				fee = -1;
			}
		}
		fee
	}
}

impl fmt::Display for FeeRate {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(
			f,
			"{}.{:08} BTCBT/kvB",
			self.satoshis_per_kilobyte / COIN as i64,
			self.satoshis_per_kilobyte % COIN as i64
		)
	}
}
