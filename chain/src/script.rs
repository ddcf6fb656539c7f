//! The minimal script surface the consensus core touches: building the
//! BIP34 coinbase scriptSig and counting legacy signature operations.
//! Script interpretation lives with the script engine collaborator.

use crate::transaction::Transaction;
use primitives::bytes::Bytes;

pub const OP_0: u8 = 0x00;
pub const OP_PUSHDATA1: u8 = 0x4c;
pub const OP_PUSHDATA2: u8 = 0x4d;
pub const OP_PUSHDATA4: u8 = 0x4e;
pub const OP_1NEGATE: u8 = 0x4f;
pub const OP_1: u8 = 0x51;
pub const OP_16: u8 = 0x60;
pub const OP_RETURN: u8 = 0x6a;
pub const OP_CHECKSIG: u8 = 0xac;
pub const OP_CHECKSIGVERIFY: u8 = 0xad;
pub const OP_CHECKMULTISIG: u8 = 0xae;
pub const OP_CHECKMULTISIGVERIFY: u8 = 0xaf;

/// Script builder
#[derive(Default)]
pub struct Builder {
	data: Vec<u8>,
}

impl Builder {
	pub fn push_opcode(mut self, opcode: u8) -> Self {
		self.data.push(opcode);
		self
	}

	/// Pushes a number the way block heights are pushed into coinbase
	/// scripts: small values become their dedicated opcodes, everything
	/// else a minimally encoded data push.
	pub fn push_num(mut self, value: i64) -> Self {
		if value == -1 || (1..=16).contains(&value) {
			let opcode = if value == -1 { OP_1NEGATE } else { OP_1 + value as u8 - 1 };
			self.data.push(opcode);
			self
		} else if value == 0 {
			self.data.push(OP_0);
			self
		} else {
			let serialized = script_num_serialize(value);
			self.push_data(&serialized)
		}
	}

	pub fn push_data(mut self, data: &[u8]) -> Self {
		match data.len() {
			len if len < OP_PUSHDATA1 as usize => {
				self.data.push(len as u8);
			}
			len if len <= 0xff => {
				self.data.push(OP_PUSHDATA1);
				self.data.push(len as u8);
			}
			len if len <= 0xffff => {
				self.data.push(OP_PUSHDATA2);
				self.data.extend_from_slice(&(len as u16).to_le_bytes());
			}
			len => {
				self.data.push(OP_PUSHDATA4);
				self.data.extend_from_slice(&(len as u32).to_le_bytes());
			}
		}
		self.data.extend_from_slice(data);
		self
	}

	pub fn into_script(self) -> Bytes {
		self.data.into()
	}
}

fn script_num_serialize(value: i64) -> Vec<u8> {
	if value == 0 {
		return Vec::new();
	}

	let negative = value < 0;
	let mut absolute = value.unsigned_abs();
	let mut result = Vec::new();
	while absolute > 0 {
		result.push((absolute & 0xff) as u8);
		absolute >>= 8;
	}

	// the most significant bit carries the sign
	if result[result.len() - 1] & 0x80 != 0 {
		result.push(if negative { 0x80 } else { 0x00 });
	} else if negative {
		let last = result.len() - 1;
		result[last] |= 0x80;
	}

	result
}

/// Number of signature operations in the script, counted the legacy way:
/// CHECKMULTISIG variants are worth a flat 20.
pub fn script_sigop_count(script: &[u8]) -> usize {
	let mut count = 0;
	let mut pc = 0;
	while pc < script.len() {
		let opcode = script[pc];
		pc += 1;
		match opcode {
			x if x > 0 && x < OP_PUSHDATA1 => pc += x as usize,
			OP_PUSHDATA1 => {
				if pc >= script.len() {
					break;
				}
				pc += 1 + script[pc] as usize;
			}
			OP_PUSHDATA2 => {
				if pc + 2 > script.len() {
					break;
				}
				let len = u16::from_le_bytes([script[pc], script[pc + 1]]) as usize;
				pc += 2 + len;
			}
			OP_PUSHDATA4 => {
				if pc + 4 > script.len() {
					break;
				}
				let len = u32::from_le_bytes([script[pc], script[pc + 1], script[pc + 2], script[pc + 3]]) as usize;
				pc += 4 + len;
			}
			OP_CHECKSIG | OP_CHECKSIGVERIFY => count += 1,
			OP_CHECKMULTISIG | OP_CHECKMULTISIGVERIFY => count += 20,
			_ => (),
		}
	}
	count
}

/// Legacy sigop count of the whole transaction (scriptSigs + scriptPubKeys).
pub fn legacy_sigop_count(transaction: &Transaction) -> usize {
	let input_sigops: usize = transaction.inputs.iter().map(|input| script_sigop_count(&input.script_sig)).sum();
	let output_sigops: usize = transaction
		.outputs
		.iter()
		.map(|output| script_sigop_count(&output.script_pubkey))
		.sum();
	input_sigops + output_sigops
}
