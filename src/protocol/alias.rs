//! L1 to L2 address aliasing
//!
//! A contract on L1 that sends a message to L2 shows up on L2 under its alias:
//! the original address shifted by a fixed offset modulo 2^160. Nobody on L2 can
//! produce a call from an aliased address without going through the bridge, so
//! the alias authenticates "this call came from that L1 contract".

use alloy_primitives::{address, Address, U160};

/// Offset added to an L1 address to obtain its L2 alias
pub const L1_TO_L2_ALIAS_OFFSET: Address = address!("1111000000000000000000000000000000001111");

#[inline]
fn to_u160(address: Address) -> U160 {
    U160::from_be_bytes(address.0 .0)
}

#[inline]
fn from_u160(value: U160) -> Address {
    Address::from(value.to_be_bytes::<20>())
}

/// Maps an L1 contract address to the address it appears as on L2.
///
/// # Example
///
/// ```rust
/// use rollup_bridge::{apply_l1_to_l2_alias, undo_l1_to_l2_alias};
/// use alloy_primitives::address;
///
/// let l1 = address!("0000000000000000000000000000000000000001");
/// let l2 = apply_l1_to_l2_alias(l1);
/// assert_eq!(l2, address!("1111000000000000000000000000000000001112"));
/// assert_eq!(undo_l1_to_l2_alias(l2), l1);
/// ```
pub fn apply_l1_to_l2_alias(l1_address: Address) -> Address {
    from_u160(to_u160(l1_address).wrapping_add(to_u160(L1_TO_L2_ALIAS_OFFSET)))
}

/// Inverse of [`apply_l1_to_l2_alias`].
pub fn undo_l1_to_l2_alias(l2_address: Address) -> Address {
    from_u160(to_u160(l2_address).wrapping_sub(to_u160(L1_TO_L2_ALIAS_OFFSET)))
}
