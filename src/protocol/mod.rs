//! Bridge protocol types and definitions
//!
//! This module contains the pure, side-effect free parts of the bridge: layer
//! identifiers, address aliasing, the canonical message encoding and the
//! message lifecycle states.

mod alias;
mod layer;
mod message;
mod status;

pub use alias::{apply_l1_to_l2_alias, undo_l1_to_l2_alias, L1_TO_L2_ALIAS_OFFSET};
pub use layer::{InvalidLayer, Layer};
pub use message::{CrossDomainMessage, MessageHash};
pub use status::{MessageStatus, RelayOutcome, RelayStatus};
