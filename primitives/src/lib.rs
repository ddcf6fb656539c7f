#[macro_use]
extern crate uint;
extern crate rustc_hex as hex;

pub mod bytes;
pub mod compact;

construct_uint! {
	pub struct U256(4);
}
