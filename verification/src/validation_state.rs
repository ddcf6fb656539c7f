use std::fmt;

/// Why a transaction was invalid. Granular enough for the network layer
/// to decide whether the provider should be banned or ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxValidationResult {
	/// Initial value. The transaction has not yet been rejected.
	ResultUnset,
	/// Invalid by consensus rules.
	Consensus,
	/// Invalid by a change to consensus rules more recent than segwit.
	RecentConsensusChange,
	/// Inputs failed policy rules.
	InputsNotStandard,
	/// Otherwise didn't meet our local policy rules.
	NotStandard,
	/// Transaction was missing some of its inputs.
	MissingInputs,
	/// Spends a coinbase too early, or violates locktime/sequence locks.
	PrematureSpend,
	/// Witness may have been malleated, which includes non-standard
	/// witnesses.
	WitnessMutated,
	/// Transaction is missing a witness.
	WitnessStripped,
	/// Already in the mempool or conflicts with a transaction in the chain.
	Conflict,
	/// Violated the mempool's fee/size/descendant/RBF limits.
	MempoolPolicy,
	/// This node does not have a mempool, so it can't validate.
	NoMempool,
}

impl Default for TxValidationResult {
	fn default() -> Self {
		TxValidationResult::ResultUnset
	}
}

/// Why a block was invalid. These are much more granular than reject
/// codes, which may be more useful for other use-cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockValidationResult {
	Valid,
	/// Invalid by consensus rules, excluding any below reasons.
	Header,
	/// The block's data didn't match the data committed to by the PoW.
	Mutated,
	/// We don't know the previous block.
	MissingPrev,
	InvalidHeader,
	/// A block this one builds on is invalid.
	InvalidPrev,
	Consensus,
	/// Block contains a non-final transaction.
	Nonfinal,
	/// Block timestamp was too far in the future.
	TimeFuture,
	/// The block failed a checkpoint.
	Checkpoint,
	/// Invalid by consensus rules in its transactions.
	Transactions,
	ValidationFailed,
	Serialization,
	Weight,
	ResultUnset,
	/// The header's claimed work is below the anti-DoS floor.
	HeaderLowWork,
	CachedInvalid,
	RecentConsensusChange,
}

impl Default for BlockValidationResult {
	fn default() -> Self {
		BlockValidationResult::Valid
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
	/// Everything ok.
	Valid,
	/// Network rule violation.
	Invalid,
	/// Run-time error.
	Error,
}

/// Captures the outcome of validating a block or transaction, with a
/// reason the rejection can be reported and scored under. The mutating
/// methods return `false` so call sites can chain an early exit:
/// `return state.invalid(...)`.
#[derive(Debug, Clone)]
pub struct ValidationState<R> {
	mode: Mode,
	result: R,
	reject_reason: String,
	debug_message: String,
}

impl<R: Default> Default for ValidationState<R> {
	fn default() -> Self {
		ValidationState {
			mode: Mode::Valid,
			result: R::default(),
			reject_reason: String::new(),
			debug_message: String::new(),
		}
	}
}

impl<R: Copy> ValidationState<R> {
	/// Records a rule violation. A state already carrying a run-time
	/// error keeps the error mode.
	pub fn invalid(&mut self, result: R, reject_reason: &str, debug_message: &str) -> bool {
		self.result = result;
		self.reject_reason = reject_reason.to_owned();
		self.debug_message = debug_message.to_owned();
		if self.mode != Mode::Error {
			self.mode = Mode::Invalid;
		}
		false
	}

	/// Records an internal error. Sticky: the state never downgrades back
	/// to a plain rejection.
	pub fn error(&mut self, reject_reason: &str) -> bool {
		if self.mode == Mode::Valid {
			self.reject_reason = reject_reason.to_owned();
		}
		self.mode = Mode::Error;
		false
	}

	pub fn is_valid(&self) -> bool {
		self.mode == Mode::Valid
	}

	pub fn is_invalid(&self) -> bool {
		self.mode == Mode::Invalid
	}

	pub fn is_error(&self) -> bool {
		self.mode == Mode::Error
	}

	pub fn result(&self) -> R {
		self.result
	}

	pub fn reject_reason(&self) -> &str {
		&self.reject_reason
	}

	pub fn debug_message(&self) -> &str {
		&self.debug_message
	}
}

impl<R: Copy> fmt::Display for ValidationState<R> {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		if self.is_valid() {
			return f.write_str("Valid");
		}

		if !self.debug_message.is_empty() {
			write!(f, "{}, {}", self.reject_reason, self.debug_message)
		} else {
			f.write_str(&self.reject_reason)
		}
	}
}

pub type TxValidationState = ValidationState<TxValidationResult>;
pub type BlockValidationState = ValidationState<BlockValidationResult>;
