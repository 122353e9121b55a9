//! OpenTelemetry span helpers for bridge operations
//!
//! Span names are static and every attribute is a structured field, so spans
//! can be filtered and aggregated without parsing messages. Top-level
//! operations carry `error.*` and `otel.status_code` fields that
//! [`record_error`] fills in when the operation fails.
//!
//! # Usage
//!
//! These helpers are used internally by [`Domain`](crate::Domain) and
//! [`Relayer`](crate::Relayer) but are public for callers who want the same
//! names around their own code.
//!
//! # Example
//!
//! ```rust
//! use rollup_bridge::{spans, Layer};
//! use alloy_primitives::{B256, U256};
//!
//! let span = spans::relay_message(Layer::L2, &B256::ZERO, U256::ZERO);
//! let _guard = span.enter();
//! // relay logic here
//! ```

use alloy_primitives::{Address, B256, U256};
use tracing::Span;

use crate::protocol::Layer;

/// Create span for sending a cross-domain message.
///
/// Parent: deposit or withdraw span, or none for direct sends
/// Children: None
#[inline]
pub fn send_message(
    layer: Layer,
    sender: Address,
    target: Address,
    value: U256,
    gas_limit: u64,
) -> Span {
    tracing::info_span!(
        "rollup_bridge.send_message",
        layer = %layer,
        sender = %sender,
        target = %target,
        value = %value,
        gas_limit = gas_limit,
        error.type = tracing::field::Empty,
        error.message = tracing::field::Empty,
        error.source = tracing::field::Empty,
        otel.status_code = "OK",
    )
}

/// Create span for relaying a message on its destination layer.
///
/// Parent: rollup_bridge.relayer_submit or none
/// Children: None
#[inline]
pub fn relay_message(layer: Layer, message_hash: &B256, nonce: U256) -> Span {
    tracing::info_span!(
        "rollup_bridge.relay_message",
        layer = %layer,
        message_hash = %message_hash,
        nonce = %nonce,
        error.type = tracing::field::Empty,
        error.message = tracing::field::Empty,
        error.source = tracing::field::Empty,
        otel.status_code = "OK",
    )
}

/// Create span for an operator replay of a failed message.
#[inline]
pub fn replay_message(layer: Layer, message_hash: &B256) -> Span {
    tracing::info_span!(
        "rollup_bridge.replay_message",
        layer = %layer,
        message_hash = %message_hash,
        error.type = tracing::field::Empty,
        error.message = tracing::field::Empty,
        error.source = tracing::field::Empty,
        otel.status_code = "OK",
    )
}

/// Create span for a WETH deposit initiated on L1.
///
/// Parent: None
/// Children: None (the messenger logs inside this span)
#[inline]
pub fn deposit(from: Address, token: Address, amount: U256, gas_limit: u64) -> Span {
    tracing::info_span!(
        "rollup_bridge.deposit",
        from = %from,
        token = %token,
        amount = %amount,
        gas_limit = gas_limit,
        error.type = tracing::field::Empty,
        error.message = tracing::field::Empty,
        error.context = tracing::field::Empty,
        otel.status_code = "OK",
    )
}

/// Create span for a WETH withdrawal initiated on L2.
#[inline]
pub fn withdraw(from: Address, token: Address, amount: U256, gas_limit: u64) -> Span {
    tracing::info_span!(
        "rollup_bridge.withdraw",
        from = %from,
        token = %token,
        amount = %amount,
        gas_limit = gas_limit,
        error.type = tracing::field::Empty,
        error.message = tracing::field::Empty,
        error.context = tracing::field::Empty,
        otel.status_code = "OK",
    )
}

/// Create span for a gateway finalizing a transfer, whether called directly
/// or by a relayed message.
///
/// Parent: rollup_bridge.relay_message or none
/// Children: None
#[inline]
pub fn finalize(layer: Layer, from: Address, to: Address, amount: U256) -> Span {
    tracing::info_span!(
        "rollup_bridge.finalize",
        layer = %layer,
        from = %from,
        to = %to,
        amount = %amount,
        error.type = tracing::field::Empty,
        error.message = tracing::field::Empty,
        error.source = tracing::field::Empty,
        otel.status_code = "OK",
    )
}

/// Create span for recording a finalized batch on L1.
#[inline]
pub fn finalize_batch(batch_index: u64, message_count: usize) -> Span {
    tracing::debug_span!(
        "rollup_bridge.finalize_batch",
        batch_index = batch_index,
        message_count = message_count,
        error.type = tracing::field::Empty,
        error.message = tracing::field::Empty,
        otel.status_code = "OK",
    )
}

/// Create span for one relayer pass over a source layer's logs.
///
/// Parent: None
/// Children: None
#[inline]
pub fn relayer_poll(source: Layer, cursor: usize) -> Span {
    tracing::debug_span!(
        "rollup_bridge.relayer_poll",
        source = %source,
        cursor = cursor,
    )
}

/// Create span for the relayer submitting one message.
///
/// Parent: None
/// Children: rollup_bridge.relay_message
#[inline]
pub fn relayer_submit(source: Layer, message_hash: &B256) -> Span {
    tracing::info_span!(
        "rollup_bridge.relayer_submit",
        source = %source,
        destination = %source.counterpart(),
        message_hash = %message_hash,
        error.type = tracing::field::Empty,
        error.message = tracing::field::Empty,
        error.context = tracing::field::Empty,
        otel.status_code = "OK",
    )
}

/// Record error attributes on the current span.
///
/// Follows OpenTelemetry semantic conventions for error tracking:
/// - error.type: The error type/variant
/// - error.message: Human-readable error message
/// - error.source: The underlying cause, when there is one
///
/// # Example
///
/// ```rust
/// use rollup_bridge::{spans, BridgeError};
///
/// let span = tracing::info_span!("rollup_bridge.operation");
/// let _guard = span.enter();
///
/// let result: Result<(), BridgeError> = Err(BridgeError::ZeroAmount);
/// if let Err(ref e) = result {
///     spans::record_error(e);
/// }
/// ```
pub fn record_error<E: std::error::Error>(error: &E) {
    let current_span = tracing::Span::current();
    let message = error.to_string();
    current_span.record(
        "error.type",
        message.split(':').next().unwrap_or("Unknown"),
    );
    current_span.record("error.message", message.as_str());
    current_span.record("otel.status_code", "ERROR");

    if let Some(source) = error.source() {
        current_span.record("error.source", source.to_string());
    }
}

/// Record error attributes with custom context on the current span.
///
/// Used where the failure is not a [`BridgeError`](crate::BridgeError) of
/// its own, such as a relay whose inner call reverted.
///
/// # Example
///
/// ```rust
/// use rollup_bridge::spans;
///
/// let span = tracing::info_span!("rollup_bridge.operation");
/// let _guard = span.enter();
///
/// spans::record_error_with_context(
///     "RelayFailed",
///     "inner call reverted",
///     Some("message can be replayed by the owner"),
/// );
/// ```
pub fn record_error_with_context(
    error_type: &str,
    error_message: &str,
    additional_context: Option<&str>,
) {
    let current_span = tracing::Span::current();
    current_span.record("error.type", error_type);
    current_span.record("error.message", error_message);
    current_span.record("otel.status_code", "ERROR");

    if let Some(context) = additional_context {
        current_span.record("error.context", context);
    }
}
