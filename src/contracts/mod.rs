//! Bridge contract ABI bindings
//!
//! This module contains `sol!`-generated types for the messenger, message queue
//! and WETH gateway interfaces. Events emitted by the in-process ledger are
//! encoded with these bindings, so logs are byte-compatible with the deployed
//! contracts.

pub mod gateway;
pub mod messenger;
