/// Maximum allowed size for a serialized block, in bytes. Only used for
/// buffer sizing; post-fork block limits are enforced contextually.
pub const MAX_BLOCK_SERIALIZED_SIZE: usize = 32_000_000;

/// Maximum allowed block weight (BIP141), used where the block height is
/// unknown. Post-fork limits are applied by the assembler with the height
/// in hand.
pub const MAX_BLOCK_WEIGHT: u64 = 4_000_000;

/// Maximum allowed number of signature check operations in a block.
pub const MAX_BLOCK_SIGOPS_COST: i64 = 80_000;

/// Number of blocks before a coinbase output can be spent.
pub const COINBASE_MATURITY: u32 = 100;

pub const WITNESS_SCALE_FACTOR: usize = 4;

// 60 and 10 are the lower bounds for the size of a valid and of a
// serializable transaction respectively
pub const MIN_TRANSACTION_WEIGHT: usize = WITNESS_SCALE_FACTOR * 60;
pub const MIN_SERIALIZABLE_TRANSACTION_WEIGHT: usize = WITNESS_SCALE_FACTOR * 10;

/// Interpret sequence numbers as relative lock-time constraints.
pub const LOCKTIME_VERIFY_SEQUENCE: u32 = 1;

/// Below this lock_time value, the lock is a block number; at or above it,
/// a unix timestamp.
pub const LOCKTIME_THRESHOLD: u32 = 500_000_000;

/// Setting all input sequences to this value disables lock_time.
pub const SEQUENCE_FINAL: u32 = 0xffff_ffff;

/// Minimum size of a witness commitment structure (BIP141).
pub const MINIMUM_WITNESS_COMMITMENT: usize = 38;

/// `OP_RETURN PUSH36 0xaa21a9ed` prefix of the witness commitment output.
pub const WITNESS_COMMITMENT_MARKER: [u8; 6] = [0x6a, 0x24, 0xaa, 0x21, 0xa9, 0xed];
