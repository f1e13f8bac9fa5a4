//! # Network Module
//!
//! Everything between the pipeline and the ledger node.
//!
//! ## Layout
//!
//! ```text
//! client.rs    — LedgerClient trait and the request/response shapes it speaks
//! rpc.rs       — JSON-RPC 2.0 envelopes and Ethereum method names
//! http.rs      — reqwest transport (the production LedgerClient)
//! quantity.rs  — serde helpers for hex/decimal quantities
//! ```
//!
//! ## Design Decisions
//!
//! - The pipeline depends on the [`LedgerClient`] trait, never on a
//!   transport. One binding is chosen when the pipeline is constructed; there
//!   is no runtime sniffing of which client library produced a response.
//! - Each trait method is one JSON-RPC call. Composite behaviour (polling for
//!   a receipt, widening a log query) lives in the pipeline where its
//!   timeouts and fallbacks are visible.
//! - Quantities are accepted in hex, decimal string, or JSON number form
//!   because dev chains are not consistent about it. Writes are always hex.

pub mod client;
pub mod http;
pub mod quantity;
pub mod rpc;

#[cfg(test)]
pub(crate) mod mock;

pub use client::{BlockHeader, CallRequest, LedgerClient, LogFilter, RpcClientError};
pub use http::HttpLedgerClient;
pub use rpc::{RpcError, RpcMethod, RpcRequest, RpcResponse};
