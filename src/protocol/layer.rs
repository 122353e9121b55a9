//! Layer identifiers for the two sides of the bridge
//!
//! The bridge connects exactly two domains: the base layer (L1) and the rollup
//! layer (L2). This module provides a strongly-typed enum so that addresses,
//! relay authentication and event directions can never be mixed up.

use std::fmt;

use alloy_chains::NamedChain;
use serde::{Deserialize, Serialize};

/// Identifier for one side of the bridge
///
/// # Example
///
/// ```rust
/// use rollup_bridge::Layer;
///
/// assert_eq!(Layer::L1.counterpart(), Layer::L2);
/// let raw: u8 = Layer::L2.into();
/// assert_eq!(raw, 2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Layer {
    /// Base layer, where deposits originate and withdrawals finalize
    L1 = 1,
    /// Rollup layer, where deposits finalize and withdrawals originate
    L2 = 2,
}

impl Layer {
    /// Returns the numeric layer value
    #[inline]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Attempts to create a Layer from a u8 value
    ///
    /// # Example
    ///
    /// ```rust
    /// use rollup_bridge::Layer;
    ///
    /// assert_eq!(Layer::from_u8(1), Some(Layer::L1));
    /// assert_eq!(Layer::from_u8(3), None);
    /// ```
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::L1),
            2 => Some(Self::L2),
            _ => None,
        }
    }

    /// Returns the other side of the bridge
    #[inline]
    pub const fn counterpart(self) -> Self {
        match self {
            Self::L1 => Self::L2,
            Self::L2 => Self::L1,
        }
    }

    /// Returns the layer name as a string
    #[inline]
    pub const fn name(self) -> &'static str {
        match self {
            Self::L1 => "L1",
            Self::L2 => "L2",
        }
    }

    /// Returns the chain this layer runs on
    ///
    /// # Example
    ///
    /// ```rust
    /// use rollup_bridge::Layer;
    /// use alloy_chains::NamedChain;
    ///
    /// assert_eq!(Layer::L2.named_chain(false), NamedChain::Scroll);
    /// assert_eq!(Layer::L1.named_chain(true), NamedChain::Sepolia);
    /// ```
    pub const fn named_chain(self, testnet: bool) -> NamedChain {
        match (self, testnet) {
            (Self::L1, false) => NamedChain::Mainnet,
            (Self::L1, true) => NamedChain::Sepolia,
            (Self::L2, false) => NamedChain::Scroll,
            (Self::L2, true) => NamedChain::ScrollSepolia,
        }
    }

    /// Returns true if inbound messages on this layer must carry a batch proof
    ///
    /// L2 trusts its aliased L1 messenger; L1 only trusts messages that were
    /// included in a finalized batch.
    #[inline]
    pub const fn requires_proof(self) -> bool {
        matches!(self, Self::L1)
    }
}

impl From<Layer> for u8 {
    #[inline]
    fn from(layer: Layer) -> Self {
        layer.as_u8()
    }
}

impl TryFrom<u8> for Layer {
    type Error = InvalidLayer;

    #[inline]
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_u8(value).ok_or(InvalidLayer(value))
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when attempting to convert an invalid u8 to a Layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidLayer(pub u8);

impl fmt::Display for InvalidLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid layer: {}", self.0)
    }
}

impl std::error::Error for InvalidLayer {}
